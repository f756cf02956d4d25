//! Map column implementation
//!
//! **ClickHouse Documentation:** <https://clickhouse.com/docs/en/sql-reference/data-types/map>
//!
//! `Map(K, V)` has the wire form of `Array(Tuple(K, V))`; reading and writing
//! go through the array codec and the result is wrapped.

use super::{
    array::{
        self,
        ArrayColumn,
    },
    downcast_column,
    impl_column_any,
    ColumnRef,
    TableColumn,
};
use crate::{
    io::column_stream::{
        ColumnReader,
        ColumnSkipper,
        ColumnWriter,
        Progress,
    },
    settings::CodecSettings,
    types::Type,
    Error,
    Result,
    Value,
};
use std::sync::Arc;

/// Column for Map(K, V) over its key/value entries array
pub struct MapColumn {
    type_: Type,
    entries: Arc<ArrayColumn>,
}

impl MapColumn {
    pub fn new(type_: Type, entries: Arc<ArrayColumn>) -> Self {
        Self { type_, entries }
    }

    /// The underlying `Array(Tuple(K, V))` column
    pub fn entries(&self) -> Arc<ArrayColumn> {
        Arc::clone(&self.entries)
    }
}

impl TableColumn for MapColumn {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn row_count(&self) -> usize {
        self.entries.row_count()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        let (start, end) = self.entries.range(index)?;
        let pairs = self.entries.nested();
        (start..end)
            .map(|i| match pairs.get_value(i)? {
                Value::Tuple(mut kv) if kv.len() == 2 => {
                    let value = kv.pop().unwrap_or(Value::Null);
                    let key = kv.pop().unwrap_or(Value::Null);
                    Ok((key, value))
                }
                other => Err(Error::Internal(format!(
                    "Map entry is {} instead of a pair",
                    other.kind_name()
                ))),
            })
            .collect::<Result<Vec<_>>>()
            .map(Value::Map)
    }

    impl_column_any!();
}

fn entries_type(type_: &Type) -> Result<Type> {
    match type_ {
        Type::Map { key_type, value_type } => Ok(Type::array(Type::tuple(vec![
            key_type.as_ref().clone(),
            value_type.as_ref().clone(),
        ]))),
        _ => Err(Error::Internal(format!("{} is not a Map", type_))),
    }
}

/// Reader for Map(K, V), delegating to the entries array reader
pub struct MapReader {
    type_: Type,
    entries: Box<dyn ColumnReader>,
}

impl ColumnReader for MapReader {
    fn read_prefix(&mut self, buffer: &[u8]) -> Result<Progress> {
        self.entries.read_prefix(buffer)
    }

    fn read_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        self.entries.read_next(buffer)
    }

    fn end_read(self: Box<Self>) -> Result<ColumnRef> {
        let this = *self;
        let column = this.entries.end_read()?;
        let entries = downcast_column::<ArrayColumn>(&column).ok_or_else(|| {
            Error::Internal("Map entries did not decode as an array".to_string())
        })?;
        Ok(Arc::new(MapColumn::new(this.type_, entries)))
    }
}

pub(crate) fn create_reader(
    type_: &Type,
    rows: usize,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnReader>> {
    let entries = array::create_reader(&entries_type(type_)?, rows, settings)?;
    Ok(Box::new(MapReader { type_: type_.clone(), entries }))
}

pub(crate) fn create_skipper(
    type_: &Type,
    rows: usize,
) -> Result<Box<dyn ColumnSkipper>> {
    array::create_skipper(&entries_type(type_)?, rows)
}

pub(crate) fn create_writer(
    type_: &Type,
    rows: Vec<Value>,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnWriter>> {
    let entries = rows
        .into_iter()
        .map(|row| match row {
            Value::Map(pairs) => Ok(Value::Array(
                pairs
                    .into_iter()
                    .map(|(k, v)| Value::Tuple(vec![k, v]))
                    .collect(),
            )),
            other => Err(Error::type_mismatch(type_.name(), other.kind_name())),
        })
        .collect::<Result<Vec<_>>>()?;
    array::create_writer(&entries_type(type_)?, entries, settings)
}
