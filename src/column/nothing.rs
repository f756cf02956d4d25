//! Nothing column: every row is null
//!
//! On the wire each row still occupies one placeholder byte.

use super::{
    impl_column_any,
    numeric::incomplete_column,
    ColumnRef,
    TableColumn,
};
use crate::{
    io::column_stream::{
        ColumnReader,
        ColumnWriter,
        Progress,
    },
    types::Type,
    Error,
    Result,
    Value,
};
use std::sync::Arc;

const PLACEHOLDER: u8 = b'0';

pub struct NothingColumn {
    type_: Type,
    rows: usize,
}

impl NothingColumn {
    pub fn new(rows: usize) -> Self {
        Self { type_: Type::nothing(), rows }
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

impl TableColumn for NothingColumn {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn row_count(&self) -> usize {
        self.rows
    }

    fn is_null(&self, index: usize) -> bool {
        index < self.rows
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        if index >= self.rows {
            return Err(Error::out_of_bounds(index, self.rows));
        }
        Ok(Value::Null)
    }

    impl_column_any!();
}

pub struct NothingReader {
    rows: usize,
    read: usize,
}

impl NothingReader {
    pub fn new(rows: usize) -> Self {
        Self { rows, read: 0 }
    }
}

impl ColumnReader for NothingReader {
    fn read_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let count = buffer.len().min(self.rows - self.read);
        self.read += count;
        Ok(Progress::new(count, count))
    }

    fn end_read(self: Box<Self>) -> Result<ColumnRef> {
        if self.read != self.rows {
            return Err(incomplete_column(self.read, self.rows));
        }
        Ok(Arc::new(NothingColumn::new(self.rows)))
    }
}

struct NothingWriter {
    rows: usize,
    written: usize,
}

impl ColumnWriter for NothingWriter {
    fn write_next(&mut self, output: &mut [u8]) -> Result<Progress> {
        let count = output.len().min(self.rows - self.written);
        output[..count].fill(PLACEHOLDER);
        self.written += count;
        Ok(Progress::new(count, count))
    }
}

pub(crate) fn create_writer(rows: Vec<Value>) -> Result<Box<dyn ColumnWriter>> {
    if let Some(value) = rows.iter().find(|v| !v.is_null()) {
        return Err(Error::type_mismatch("Nothing", value.kind_name()));
    }
    Ok(Box::new(NothingWriter { rows: rows.len(), written: 0 }))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::io::column_stream::write_column;

    #[test]
    fn test_nothing_roundtrip() {
        let bytes =
            write_column(create_writer(vec![Value::Null; 3]).unwrap(), 3, 2)
                .unwrap();
        assert_eq!(&bytes[..], b"000");

        let mut reader = Box::new(NothingReader::new(3));
        assert_eq!(reader.read_next(&bytes[..2]).unwrap(), Progress::new(2, 2));
        assert_eq!(reader.read_next(&bytes[2..]).unwrap(), Progress::new(1, 1));
        let column = reader.end_read().unwrap();
        assert!(column.is_null(2));
        assert!(!column.is_null(3));
        assert_eq!(column.get_value(0).unwrap(), Value::Null);
    }

    #[test]
    fn test_nothing_rejects_values() {
        assert!(matches!(
            create_writer(vec![Value::Int8(1)]),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
