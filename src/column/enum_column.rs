//! Enum8 and Enum16 columns
//!
//! Rows are stored as the item's Int8/Int16 value; the item names live in the
//! column type. Reading yields the item name, writing accepts either the name
//! or the numeric value.

use super::{
    downcast_column,
    impl_column_any,
    numeric::{
        FixedReader,
        FixedWriter,
    },
    projection::{
        MappedColumn,
        TypedColumn,
        TypedColumnRef,
    },
    ColumnRef,
    TableColumn,
};
use crate::{
    io::column_stream::{
        ColumnReader,
        ColumnWriter,
    },
    types::Type,
    value::FromValue,
    Error,
    Result,
    Value,
};
use std::sync::Arc;

pub struct EnumColumn {
    type_: Type,
    values: Vec<i16>,
}

impl EnumColumn {
    pub fn new(type_: Type, values: Vec<i16>) -> Self {
        Self { type_, values }
    }

    /// Numeric item values
    pub fn values(&self) -> &[i16] {
        &self.values
    }

    /// Storage width in bytes
    fn width(&self) -> usize {
        match self.type_ {
            Type::Enum8 { .. } => 1,
            _ => 2,
        }
    }

    fn raw(&self, index: usize) -> Result<i16> {
        self.values
            .get(index)
            .copied()
            .ok_or_else(|| Error::out_of_bounds(index, self.values.len()))
    }

    fn name_of(&self, value: i16) -> Result<&str> {
        self.type_.get_enum_name(value).ok_or_else(|| {
            Error::Protocol(format!(
                "Value {} is not an item of {}",
                value,
                self.type_.name()
            ))
        })
    }
}

impl TableColumn for EnumColumn {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn row_count(&self) -> usize {
        self.values.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        let name = self.name_of(self.raw(index)?)?;
        Ok(Value::String(name.to_string()))
    }

    impl_column_any!();
}

impl TypedColumn<i16> for EnumColumn {
    fn row_count(&self) -> usize {
        self.values.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get(&self, index: usize) -> Result<i16> {
        self.raw(index)
    }
}

impl TypedColumn<String> for EnumColumn {
    fn row_count(&self) -> usize {
        self.values.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get(&self, index: usize) -> Result<String> {
        self.name_of(self.raw(index)?).map(str::to_string)
    }
}

/// Numeric view of an enum column, when `T` is at least as wide as its
/// storage
pub(crate) fn project_raw<T>(column: &ColumnRef) -> Option<TypedColumnRef<T>>
where
    T: TryFrom<i16> + 'static,
{
    let column = downcast_column::<EnumColumn>(column)?;
    if std::mem::size_of::<T>() < column.width() {
        return None;
    }
    Some(MappedColumn::<i16, T>::new(column, |value| {
        T::try_from(value).map_err(|_| {
            Error::Internal(format!("Enum value {} does not fit", value))
        })
    }))
}

/// Names view of an enum column
pub(crate) fn project_names(
    column: &ColumnRef,
) -> Option<TypedColumnRef<String>> {
    downcast_column::<EnumColumn>(column).map(|c| c as TypedColumnRef<String>)
}

fn item_value(type_: &Type, value: Value) -> Result<i16> {
    match value {
        Value::String(name) => type_.get_enum_value(&name).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "'{}' is not an item of {}",
                name,
                type_.name()
            ))
        }),
        other => {
            let number = i16::from_value(other)?;
            if type_.has_enum_value(number) {
                Ok(number)
            } else {
                Err(Error::InvalidArgument(format!(
                    "{} is not an item of {}",
                    number,
                    type_.name()
                )))
            }
        }
    }
}

pub(crate) fn create_reader(
    type_: &Type,
    rows: usize,
) -> Result<Box<dyn ColumnReader>> {
    let type_ = type_.clone();
    match type_ {
        Type::Enum8 { .. } => {
            Ok(Box::new(FixedReader::<i8>::new(rows, move |data| {
                let values = data.into_iter().map(i16::from).collect();
                Arc::new(EnumColumn::new(type_, values)) as ColumnRef
            })))
        }
        Type::Enum16 { .. } => {
            Ok(Box::new(FixedReader::<i16>::new(rows, move |values| {
                Arc::new(EnumColumn::new(type_, values)) as ColumnRef
            })))
        }
        _ => Err(Error::Internal(format!("{} is not an enum type", type_))),
    }
}

pub(crate) fn create_writer(
    type_: &Type,
    rows: Vec<Value>,
) -> Result<Box<dyn ColumnWriter>> {
    let values = rows
        .into_iter()
        .map(|value| item_value(type_, value))
        .collect::<Result<Vec<i16>>>()?;
    match type_ {
        // Enum8 items are validated to fit i8 when the type is resolved
        Type::Enum8 { .. } => Ok(Box::new(FixedWriter::new(
            values.into_iter().map(|v| v as i8).collect(),
        ))),
        _ => Ok(Box::new(FixedWriter::new(values))),
    }
}
