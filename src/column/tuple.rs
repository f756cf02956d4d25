//! Tuple column implementation
//!
//! **ClickHouse Documentation:** <https://clickhouse.com/docs/en/sql-reference/data-types/tuple>
//!
//! Elements are independent sibling streams, each holding every row:
//!
//! ```text
//! [prefix of element 0] ... [prefix of element N-1]
//! [rows of element 0] ... [rows of element N-1]
//! ```
//!
//! A row counts as complete once the last element stream has produced it.

use super::{
    downcast_column,
    impl_column_any,
    projection::{
        try_reinterpret,
        Projection,
        TypedColumn,
        TypedColumnRef,
    },
    ColumnRef,
    TableColumn,
};
use crate::{
    io::column_stream::{
        create_reader as create_element_reader,
        create_skipper as create_element_skipper,
        create_writer as create_element_writer,
        drive_nested_reader,
        drive_nested_skipper,
        drive_nested_writer,
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

/// Column for tuple types (fixed number of heterogeneous columns)
pub struct TupleColumn {
    type_: Type,
    rows: usize,
    elements: Vec<ColumnRef>,
}

impl TupleColumn {
    pub fn new(type_: Type, rows: usize, elements: Vec<ColumnRef>) -> Self {
        Self { type_, rows, elements }
    }

    /// Number of elements per row
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn element(&self, index: usize) -> Option<&ColumnRef> {
        self.elements.get(index)
    }

    /// Element column of a named tuple
    pub fn element_by_name(&self, name: &str) -> Option<&ColumnRef> {
        let Type::Tuple { names: Some(names), .. } = &self.type_ else {
            return None;
        };
        let index = names.iter().position(|n| n == name)?;
        self.elements.get(index)
    }

    /// Exactly `arity` columns for a Rust tuple of that arity; an eighth slot
    /// takes every remaining element as a nested tuple
    fn projected_elements(&self, arity: usize) -> Option<Vec<ColumnRef>> {
        let len = self.elements.len();
        if arity < MAX_FLAT_ARITY || len == arity {
            return (len == arity).then(|| self.elements.clone());
        }
        if len < arity {
            return None;
        }
        let split = arity - 1;
        let tail = &self.elements[split..];
        let tail_type = Type::tuple(
            tail.iter().map(|c| c.column_type().clone()).collect(),
        );
        let mut columns = self.elements[..split].to_vec();
        columns.push(Arc::new(TupleColumn::new(
            tail_type,
            self.rows,
            tail.to_vec(),
        )));
        Some(columns)
    }
}

impl TableColumn for TupleColumn {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn row_count(&self) -> usize {
        self.rows
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        if index >= self.rows {
            return Err(Error::out_of_bounds(index, self.rows));
        }
        self.elements
            .iter()
            .map(|c| c.get_value(index))
            .collect::<Result<Vec<_>>>()
            .map(Value::Tuple)
    }

    impl_column_any!();
}

fn item_types(type_: &Type) -> Result<&[Type]> {
    match type_ {
        Type::Tuple { item_types, .. } => Ok(item_types.as_slice()),
        _ => Err(Error::Internal(format!("{} is not a Tuple", type_))),
    }
}

/// Incremental reader for Tuple; elements are read strictly in order
pub struct TupleReader {
    type_: Type,
    rows: usize,
    readers: Vec<Box<dyn ColumnReader>>,
    prefix_index: usize,
    current: usize,
    current_done: usize,
}

impl ColumnReader for TupleReader {
    fn read_prefix(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = 0;
        while let Some(reader) = self.readers.get_mut(self.prefix_index) {
            let progress = reader.read_prefix(&buffer[consumed..])?;
            consumed += progress.bytes;
            if progress.elements == 0 {
                return Ok(Progress::new(consumed, 0));
            }
            self.prefix_index += 1;
        }
        Ok(Progress::prefix_done(consumed))
    }

    fn read_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = 0;
        let last = self.readers.len().saturating_sub(1);
        let mut completed = 0;
        while let Some(reader) = self.readers.get_mut(self.current) {
            let before = self.current_done;
            consumed += drive_nested_reader(
                reader.as_mut(),
                self.rows,
                &mut self.current_done,
                &buffer[consumed..],
            )?;
            if self.current == last {
                completed = self.current_done - before;
            }
            if self.current_done < self.rows || self.current == last {
                break;
            }
            self.current += 1;
            self.current_done = 0;
        }
        Ok(Progress::new(consumed, completed))
    }

    fn end_read(self: Box<Self>) -> Result<ColumnRef> {
        let this = *self;
        let elements = this
            .readers
            .into_iter()
            .map(|reader| reader.end_read())
            .collect::<Result<Vec<_>>>()?;
        if let Some(short) = elements.iter().find(|c| c.row_count() != this.rows)
        {
            return Err(Error::Protocol(format!(
                "Tuple element has {} rows, expected {}",
                short.row_count(),
                this.rows
            )));
        }
        Ok(Arc::new(TupleColumn::new(this.type_, this.rows, elements)))
    }
}

/// Skip reader for Tuple
pub struct TupleSkipper {
    rows: usize,
    skippers: Vec<Box<dyn ColumnSkipper>>,
    prefix_index: usize,
    current: usize,
    current_done: usize,
}

impl ColumnSkipper for TupleSkipper {
    fn skip_prefix(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = 0;
        while let Some(skipper) = self.skippers.get_mut(self.prefix_index) {
            let progress = skipper.skip_prefix(&buffer[consumed..])?;
            consumed += progress.bytes;
            if progress.elements == 0 {
                return Ok(Progress::new(consumed, 0));
            }
            self.prefix_index += 1;
        }
        Ok(Progress::prefix_done(consumed))
    }

    fn skip_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = 0;
        let last = self.skippers.len().saturating_sub(1);
        let mut completed = 0;
        while let Some(skipper) = self.skippers.get_mut(self.current) {
            let before = self.current_done;
            consumed += drive_nested_skipper(
                skipper.as_mut(),
                self.rows,
                &mut self.current_done,
                &buffer[consumed..],
            )?;
            if self.current == last {
                completed = self.current_done - before;
            }
            if self.current_done < self.rows || self.current == last {
                break;
            }
            self.current += 1;
            self.current_done = 0;
        }
        Ok(Progress::new(consumed, completed))
    }
}

/// Writer for Tuple
pub struct TupleWriter {
    rows: usize,
    writers: Vec<Box<dyn ColumnWriter>>,
    prefix_index: usize,
    current: usize,
    current_done: usize,
}

impl ColumnWriter for TupleWriter {
    fn write_prefix(&mut self, output: &mut [u8]) -> Result<Progress> {
        let mut written = 0;
        while let Some(writer) = self.writers.get_mut(self.prefix_index) {
            let progress = writer.write_prefix(&mut output[written..])?;
            written += progress.bytes;
            if progress.elements == 0 {
                return Ok(Progress::new(written, 0));
            }
            self.prefix_index += 1;
        }
        Ok(Progress::prefix_done(written))
    }

    fn write_next(&mut self, output: &mut [u8]) -> Result<Progress> {
        let mut written = 0;
        let last = self.writers.len().saturating_sub(1);
        let mut completed = 0;
        while let Some(writer) = self.writers.get_mut(self.current) {
            let before = self.current_done;
            written += drive_nested_writer(
                writer.as_mut(),
                self.rows,
                &mut self.current_done,
                &mut output[written..],
            )?;
            if self.current == last {
                completed = self.current_done - before;
            }
            if self.current_done < self.rows || self.current == last {
                break;
            }
            self.current += 1;
            self.current_done = 0;
        }
        Ok(Progress::new(written, completed))
    }
}

pub(crate) fn create_reader(
    type_: &Type,
    rows: usize,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnReader>> {
    let readers = item_types(type_)?
        .iter()
        .map(|t| create_element_reader(t, rows, settings))
        .collect::<Result<Vec<_>>>()?;
    Ok(Box::new(TupleReader {
        type_: type_.clone(),
        rows,
        readers,
        prefix_index: 0,
        current: 0,
        current_done: 0,
    }))
}

pub(crate) fn create_skipper(
    type_: &Type,
    rows: usize,
) -> Result<Box<dyn ColumnSkipper>> {
    let skippers = item_types(type_)?
        .iter()
        .map(|t| create_element_skipper(t, rows))
        .collect::<Result<Vec<_>>>()?;
    Ok(Box::new(TupleSkipper {
        rows,
        skippers,
        prefix_index: 0,
        current: 0,
        current_done: 0,
    }))
}

pub(crate) fn create_writer(
    type_: &Type,
    rows: Vec<Value>,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnWriter>> {
    let item_types = item_types(type_)?;
    let row_count = rows.len();
    let mut columns: Vec<Vec<Value>> =
        item_types.iter().map(|_| Vec::with_capacity(row_count)).collect();
    for row in rows {
        match row {
            Value::Tuple(items) if items.len() == item_types.len() => {
                for (column, item) in columns.iter_mut().zip(items) {
                    column.push(item);
                }
            }
            other => {
                return Err(Error::type_mismatch(type_.name(), other.kind_name()))
            }
        }
    }
    let writers = item_types
        .iter()
        .zip(columns)
        .map(|(t, values)| create_element_writer(t, values, settings))
        .collect::<Result<Vec<_>>>()?;
    Ok(Box::new(TupleWriter {
        rows: row_count,
        writers,
        prefix_index: 0,
        current: 0,
        current_done: 0,
    }))
}

/// Largest Rust tuple arity projected element by element
const MAX_FLAT_ARITY: usize = 8;

/// Rust tuple rows over one typed view per element
struct TupleView<C> {
    rows: usize,
    columns: C,
}

macro_rules! impl_tuple_projection {
    ($arity:literal; $($name:ident : $index:tt),+) => {
        impl<$($name: Projection),+> TypedColumn<($($name,)+)>
            for TupleView<($(TypedColumnRef<$name>,)+)>
        {
            fn row_count(&self) -> usize {
                self.rows
            }

            fn is_null(&self, _index: usize) -> bool {
                false
            }

            fn get(&self, index: usize) -> Result<($($name,)+)> {
                Ok(($(self.columns.$index.get(index)?,)+))
            }
        }

        impl<$($name: Projection),+> Projection for ($($name,)+) {
            fn project(column: &ColumnRef) -> Option<TypedColumnRef<Self>> {
                let tuple = downcast_column::<TupleColumn>(column)?;
                let elements = tuple.projected_elements($arity)?;
                let columns = ($(try_reinterpret::<$name>(&elements[$index])?,)+);
                Some(Arc::new(TupleView { rows: tuple.rows, columns }))
            }
        }
    };
}

impl_tuple_projection!(1; A: 0);
impl_tuple_projection!(2; A: 0, B: 1);
impl_tuple_projection!(3; A: 0, B: 1, C: 2);
impl_tuple_projection!(4; A: 0, B: 1, C: 2, D: 3);
impl_tuple_projection!(5; A: 0, B: 1, C: 2, D: 3, E: 4);
impl_tuple_projection!(6; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
impl_tuple_projection!(7; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
impl_tuple_projection!(8; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);
