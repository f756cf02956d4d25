//! Array column implementation
//!
//! **ClickHouse Documentation:** <https://clickhouse.com/docs/en/sql-reference/data-types/array>
//!
//! ## Wire Format
//!
//! ```text
//! [nested prefix]                  // once per block
//! [offsets: UInt64 * num_arrays]   // Cumulative element counts
//! [nested_column_data]             // All elements concatenated
//! ```
//!
//! Example: `[[1,2], [3], [4,5,6]]`
//! - Offsets: `[2, 3, 6]`
//! - Nested data: `[1, 2, 3, 4, 5, 6]`
//!
//! The nested reader can only be sized once the last offset is known, so the
//! nested prefix is consumed by a [`PrefixProbe`] and replayed into it.

use super::{
    downcast_column,
    impl_column_any,
    map::MapColumn,
    numeric::incomplete_column,
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
    io::{
        buffer_utils::{
            try_read_u64_le,
            try_write_u64_le,
        },
        column_stream::{
            create_reader as create_nested_reader,
            create_skipper as create_nested_skipper,
            create_writer as create_nested_writer,
            drive_nested_reader,
            drive_nested_skipper,
            drive_nested_writer,
            reserved_capacity,
            ColumnReader,
            ColumnSkipper,
            ColumnWriter,
            PrefixProbe,
            Progress,
        },
    },
    settings::CodecSettings,
    types::Type,
    Error,
    Result,
    Value,
};
use std::sync::Arc;
use tracing::debug;

/// Column for arrays of variable length
///
/// Stores a nested column with all array elements concatenated,
/// and an offsets array that marks where each array ends.
pub struct ArrayColumn {
    type_: Type,
    offsets: Arc<[u64]>,
    nested: ColumnRef,
}

impl ArrayColumn {
    pub fn new(type_: Type, offsets: Arc<[u64]>, nested: ColumnRef) -> Self {
        Self { type_, offsets, nested }
    }

    pub fn nested(&self) -> &ColumnRef {
        &self.nested
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Start and end of the row's elements in the nested column
    pub fn range(&self, index: usize) -> Result<(usize, usize)> {
        array_range(&self.offsets, index)
    }
}

fn array_range(offsets: &[u64], index: usize) -> Result<(usize, usize)> {
    let end = *offsets
        .get(index)
        .ok_or_else(|| Error::out_of_bounds(index, offsets.len()))?;
    let start = if index == 0 { 0 } else { offsets[index - 1] };
    Ok((start as usize, end as usize))
}

impl TableColumn for ArrayColumn {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn row_count(&self) -> usize {
        self.offsets.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        let (start, end) = self.range(index)?;
        (start..end)
            .map(|i| self.nested.get_value(i))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }

    impl_column_any!();
}

/// Offsets stream shared by the reader and the skipper
struct OffsetsState {
    rows: usize,
    offsets: Vec<u64>,
}

impl OffsetsState {
    fn new(rows: usize) -> Self {
        Self { rows, offsets: Vec::with_capacity(reserved_capacity(rows)) }
    }

    fn is_complete(&self) -> bool {
        self.offsets.len() == self.rows
    }

    fn total(&self) -> u64 {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Read whole offsets, checking they never decrease
    fn read(&mut self, buffer: &[u8]) -> Result<usize> {
        let mut consumed = 0;
        while !self.is_complete() {
            let Some(offset) = try_read_u64_le(&buffer[consumed..]) else {
                break;
            };
            let previous = self.total();
            if offset < previous {
                return Err(Error::Protocol(format!(
                    "Array offset {} at row {} is below previous offset {}",
                    offset,
                    self.offsets.len(),
                    previous
                )));
            }
            self.offsets.push(offset);
            consumed += 8;
        }
        if consumed > 0 && self.is_complete() {
            debug!(rows = self.rows, elements = self.total(), "array offsets read");
        }
        Ok(consumed)
    }

    fn total_elements(&self) -> Result<usize> {
        usize::try_from(self.total()).map_err(|_| {
            Error::Protocol(format!("Array element count {} too large", self.total()))
        })
    }

    /// Rows whose elements all lie within the first `elements` elements
    fn rows_within(&self, elements: usize) -> usize {
        self.offsets.partition_point(|&offset| offset <= elements as u64)
    }
}

/// Incremental reader for Array(T)
pub struct ArrayReader {
    type_: Type,
    item_type: Type,
    settings: CodecSettings,
    probe: PrefixProbe,
    offsets: OffsetsState,
    nested: Option<Box<dyn ColumnReader>>,
    nested_total: usize,
    nested_done: usize,
    rows_done: usize,
}

impl ArrayReader {
    fn start_nested(&mut self) -> Result<()> {
        let total = self.offsets.total_elements()?;
        let mut reader =
            create_nested_reader(&self.item_type, total, &self.settings)?;
        self.probe.replay_reader(reader.as_mut())?;
        self.nested = Some(reader);
        self.nested_total = total;
        Ok(())
    }
}

impl ColumnReader for ArrayReader {
    fn read_prefix(&mut self, buffer: &[u8]) -> Result<Progress> {
        self.probe.feed(buffer)
    }

    fn read_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = self.offsets.read(buffer)?;
        if !self.offsets.is_complete() {
            return Ok(Progress::new(consumed, 0));
        }
        if self.nested.is_none() {
            self.start_nested()?;
        }
        if let Some(nested) = self.nested.as_mut() {
            consumed += drive_nested_reader(
                nested.as_mut(),
                self.nested_total,
                &mut self.nested_done,
                &buffer[consumed..],
            )?;
        }
        let rows = self.offsets.rows_within(self.nested_done);
        let completed = rows - self.rows_done;
        self.rows_done = rows;
        Ok(Progress::new(consumed, completed))
    }

    fn end_read(self: Box<Self>) -> Result<ColumnRef> {
        let mut this = *self;
        if this.rows_done != this.offsets.rows {
            return Err(incomplete_column(this.rows_done, this.offsets.rows));
        }
        if this.nested.is_none() {
            this.start_nested()?;
        }
        let nested = match this.nested {
            Some(reader) => reader.end_read()?,
            None => return Err(Error::Internal("Array nested reader missing".into())),
        };
        Ok(Arc::new(ArrayColumn::new(
            this.type_,
            Arc::from(this.offsets.offsets),
            nested,
        )))
    }
}

/// Skip reader for Array(T)
pub struct ArraySkipper {
    item_type: Type,
    probe: PrefixProbe,
    offsets: OffsetsState,
    nested: Option<Box<dyn ColumnSkipper>>,
    nested_total: usize,
    nested_done: usize,
    rows_done: usize,
}

impl ColumnSkipper for ArraySkipper {
    fn skip_prefix(&mut self, buffer: &[u8]) -> Result<Progress> {
        self.probe.feed(buffer)
    }

    fn skip_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = self.offsets.read(buffer)?;
        if !self.offsets.is_complete() {
            return Ok(Progress::new(consumed, 0));
        }
        if self.nested.is_none() {
            let total = self.offsets.total_elements()?;
            let mut skipper = create_nested_skipper(&self.item_type, total)?;
            self.probe.replay_skipper(skipper.as_mut())?;
            self.nested = Some(skipper);
            self.nested_total = total;
        }
        if let Some(nested) = self.nested.as_mut() {
            consumed += drive_nested_skipper(
                nested.as_mut(),
                self.nested_total,
                &mut self.nested_done,
                &buffer[consumed..],
            )?;
        }
        let rows = self.offsets.rows_within(self.nested_done);
        let completed = rows - self.rows_done;
        self.rows_done = rows;
        Ok(Progress::new(consumed, completed))
    }
}

/// Writer for Array(T); offsets first, then the flattened elements
pub struct ArrayWriter {
    offsets: Vec<u64>,
    offsets_written: usize,
    nested: Box<dyn ColumnWriter>,
    nested_total: usize,
    nested_done: usize,
    rows_done: usize,
}

impl ColumnWriter for ArrayWriter {
    fn write_prefix(&mut self, output: &mut [u8]) -> Result<Progress> {
        self.nested.write_prefix(output)
    }

    fn write_next(&mut self, output: &mut [u8]) -> Result<Progress> {
        let mut written = 0;
        while self.offsets_written < self.offsets.len() {
            if !try_write_u64_le(
                &mut output[written..],
                self.offsets[self.offsets_written],
            ) {
                return Ok(Progress::new(written, 0));
            }
            written += 8;
            self.offsets_written += 1;
        }
        written += drive_nested_writer(
            self.nested.as_mut(),
            self.nested_total,
            &mut self.nested_done,
            &mut output[written..],
        )?;
        let rows = self
            .offsets
            .partition_point(|&offset| offset <= self.nested_done as u64);
        let completed = rows - self.rows_done;
        self.rows_done = rows;
        Ok(Progress::new(written, completed))
    }
}

fn item_type(type_: &Type) -> Result<&Type> {
    match type_ {
        Type::Array { item_type } => Ok(item_type.as_ref()),
        _ => Err(Error::Internal(format!("{} is not an Array", type_))),
    }
}

pub(crate) fn create_reader(
    type_: &Type,
    rows: usize,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnReader>> {
    let item_type = item_type(type_)?.clone();
    Ok(Box::new(ArrayReader {
        type_: type_.clone(),
        probe: PrefixProbe::new(&item_type)?,
        item_type,
        settings: settings.clone(),
        offsets: OffsetsState::new(rows),
        nested: None,
        nested_total: 0,
        nested_done: 0,
        rows_done: 0,
    }))
}

pub(crate) fn create_skipper(
    type_: &Type,
    rows: usize,
) -> Result<Box<dyn ColumnSkipper>> {
    let item_type = item_type(type_)?.clone();
    Ok(Box::new(ArraySkipper {
        probe: PrefixProbe::new(&item_type)?,
        item_type,
        offsets: OffsetsState::new(rows),
        nested: None,
        nested_total: 0,
        nested_done: 0,
        rows_done: 0,
    }))
}

pub(crate) fn create_writer(
    type_: &Type,
    rows: Vec<Value>,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnWriter>> {
    let item_type = item_type(type_)?;
    let mut offsets = Vec::with_capacity(rows.len());
    let mut items = Vec::new();
    for row in rows {
        match row {
            Value::Array(values) => items.extend(values),
            other => {
                return Err(Error::type_mismatch(type_.name(), other.kind_name()))
            }
        }
        offsets.push(items.len() as u64);
    }
    let nested_total = items.len();
    let nested = create_nested_writer(item_type, items, settings)?;
    Ok(Box::new(ArrayWriter {
        offsets,
        offsets_written: 0,
        nested,
        nested_total,
        nested_done: 0,
        rows_done: 0,
    }))
}

/// `Vec<T>` rows over an array's nested view
struct ArrayView<T> {
    offsets: Arc<[u64]>,
    items: TypedColumnRef<T>,
}

impl<T> TypedColumn<Vec<T>> for ArrayView<T> {
    fn row_count(&self) -> usize {
        self.offsets.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get(&self, index: usize) -> Result<Vec<T>> {
        let (start, end) = array_range(&self.offsets, index)?;
        (start..end).map(|i| self.items.get(i)).collect()
    }
}

impl<T: Projection> Projection for Vec<T> {
    fn project(column: &ColumnRef) -> Option<TypedColumnRef<Self>> {
        let array = match downcast_column::<ArrayColumn>(column) {
            Some(array) => array,
            None => downcast_column::<MapColumn>(column)?.entries(),
        };
        let items = try_reinterpret::<T>(&array.nested)?;
        Some(Arc::new(ArrayView { offsets: Arc::clone(&array.offsets), items }))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{
        column::ColumnRefExt,
        io::column_stream::{
            read_column,
            skip_column,
            write_column,
        },
    };

    fn int_arrays(rows: &[&[i32]]) -> Vec<Value> {
        rows.iter()
            .map(|r| Value::Array(r.iter().map(|&v| Value::Int32(v)).collect()))
            .collect()
    }

    #[test]
    fn test_wire_layout() {
        let type_ = Type::array(Type::int32());
        let settings = CodecSettings::default();
        let writer =
            create_writer(&type_, int_arrays(&[&[1, 2], &[], &[3]]), &settings)
                .unwrap();
        let bytes = write_column(writer, 3, 64).unwrap();
        let mut expected = Vec::new();
        for offset in [2u64, 2, 3] {
            expected.extend_from_slice(&offset.to_le_bytes());
        }
        for value in [1i32, 2, 3] {
            expected.extend_from_slice(&value.to_le_bytes());
        }
        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn test_roundtrip_in_small_chunks() {
        let type_ = Type::array(Type::array(Type::string()));
        let settings = CodecSettings::default();
        let rows = vec![
            Value::Array(vec![
                Value::Array(vec![Value::from("a"), Value::from("bc")]),
                Value::Array(vec![]),
            ]),
            Value::Array(vec![]),
            Value::Array(vec![Value::Array(vec![Value::from("d")])]),
        ];
        let writer = create_writer(&type_, rows.clone(), &settings).unwrap();
        let bytes = write_column(writer, 3, 3).unwrap();

        let reader = create_reader(&type_, 3, &settings).unwrap();
        let column = read_column(reader, 3, &bytes, 1).unwrap().column;
        assert_eq!(column.values().unwrap(), rows);

        let skipper = create_skipper(&type_, 3).unwrap();
        assert_eq!(skip_column(skipper, 3, &bytes, 5).unwrap(), bytes.len());
    }

    #[test]
    fn test_all_empty_arrays() {
        let type_ = Type::array(Type::uint8());
        let settings = CodecSettings::default();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        let reader = create_reader(&type_, 2, &settings).unwrap();
        let outcome = read_column(reader, 2, &bytes, 16).unwrap();
        assert_eq!(outcome.bytes, 16);
        assert_eq!(outcome.column.get_value(1).unwrap(), Value::Array(vec![]));
    }

    #[test]
    fn test_decreasing_offsets_rejected() {
        let type_ = Type::array(Type::uint8());
        let settings = CodecSettings::default();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&3u64.to_le_bytes());
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&[1, 2, 3]);
        let mut reader = create_reader(&type_, 2, &settings).unwrap();
        assert_eq!(reader.read_prefix(&[]).unwrap(), Progress::prefix_done(0));
        assert!(matches!(reader.read_next(&bytes), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_vec_projection() {
        let type_ = Type::array(Type::int16());
        let settings = CodecSettings::default();
        let rows = vec![
            Value::Array(vec![Value::Int16(1), Value::Int16(-2)]),
            Value::Array(vec![]),
        ];
        let writer = create_writer(&type_, rows, &settings).unwrap();
        let bytes = write_column(writer, 2, 64).unwrap();
        let reader = create_reader(&type_, 2, &settings).unwrap();
        let column = read_column(reader, 2, &bytes, 64).unwrap().column;

        let view = column.try_reinterpret::<Vec<i64>>().unwrap();
        assert_eq!(view.get(0).unwrap(), vec![1i64, -2]);
        assert!(view.get(1).unwrap().is_empty());
        assert!(column.try_reinterpret::<Vec<String>>().is_none());
    }

    #[test]
    fn test_writer_rejects_non_array() {
        let type_ = Type::array(Type::int32());
        let result =
            create_writer(&type_, vec![Value::Int32(1)], &CodecSettings::default());
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
    }
}
