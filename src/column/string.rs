//! String and FixedString columns
//!
//! **String wire format:** each row is a varint byte length followed by that
//! many raw bytes.
//!
//! **FixedString(N) wire format:** each row is exactly N bytes, padded with
//! NUL bytes.
//!
//! String readers copy row bytes into segments of at least
//! [`CodecSettings::string_segment_size`] bytes; a segment is never
//! reallocated once rows point into it, and a finalized column hands rows
//! out as [`Bytes`] slices of those segments.

use super::{
    downcast_column,
    enum_column,
    impl_column_any,
    numeric::incomplete_column,
    projection::{
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
            put_varint,
            try_read_varint,
            varint_len,
        },
        column_stream::{
            reserved_capacity,
            ColumnReader,
            ColumnSkipper,
            ColumnWriter,
            Progress,
        },
    },
    settings::CodecSettings,
    types::Type,
    Error,
    Result,
    Value,
};
use bytes::{
    Bytes,
    BytesMut,
};
use std::sync::Arc;

/// Location of one row inside the segments
#[derive(Debug, Clone, Copy)]
struct Slot {
    segment: usize,
    start: usize,
    end: usize,
}

/// Column for variable-length strings
pub struct StringColumn {
    type_: Type,
    segments: Vec<Bytes>,
    slots: Vec<Slot>,
    strict_utf8: bool,
}

impl StringColumn {
    /// Raw bytes of a row, sharing the column's storage
    pub fn get_bytes(&self, index: usize) -> Result<Bytes> {
        let slot = self
            .slots
            .get(index)
            .ok_or_else(|| Error::out_of_bounds(index, self.slots.len()))?;
        Ok(self.segments[slot.segment].slice(slot.start..slot.end))
    }

    pub fn get_string(&self, index: usize) -> Result<String> {
        let bytes = self.get_bytes(index)?;
        if self.strict_utf8 {
            Ok(std::str::from_utf8(&bytes)?.to_string())
        } else {
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }

    /// Number of storage segments
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

impl TableColumn for StringColumn {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn row_count(&self) -> usize {
        self.slots.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        self.get_string(index).map(Value::String)
    }

    impl_column_any!();
}

impl TypedColumn<String> for StringColumn {
    fn row_count(&self) -> usize {
        self.slots.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get(&self, index: usize) -> Result<String> {
        self.get_string(index)
    }
}

impl TypedColumn<Bytes> for StringColumn {
    fn row_count(&self) -> usize {
        self.slots.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get(&self, index: usize) -> Result<Bytes> {
        self.get_bytes(index)
    }
}

/// Incremental reader for String columns
pub struct StringReader {
    type_: Type,
    rows: usize,
    segment_size: usize,
    strict_utf8: bool,
    segments: Vec<Bytes>,
    current: BytesMut,
    slots: Vec<Slot>,
}

impl StringReader {
    pub fn new(type_: Type, rows: usize, settings: &CodecSettings) -> Self {
        Self {
            type_,
            rows,
            segment_size: settings.string_segment_size.max(1),
            strict_utf8: settings.strict_utf8,
            segments: Vec::new(),
            current: BytesMut::new(),
            slots: Vec::with_capacity(reserved_capacity(rows)),
        }
    }

    fn append(&mut self, value: &[u8]) {
        if self.current.capacity() - self.current.len() < value.len() {
            let full = std::mem::replace(
                &mut self.current,
                BytesMut::with_capacity(self.segment_size.max(value.len())),
            );
            if !full.is_empty() || !self.slots.is_empty() {
                self.segments.push(full.freeze());
            }
        }
        let start = self.current.len();
        self.current.extend_from_slice(value);
        self.slots.push(Slot {
            segment: self.segments.len(),
            start,
            end: start + value.len(),
        });
    }
}

impl ColumnReader for StringReader {
    fn read_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = 0;
        let mut count = 0;
        while self.slots.len() < self.rows {
            let Some((len, header)) = try_read_varint(&buffer[consumed..])?
            else {
                break;
            };
            let start = consumed + header;
            let Some(end) = usize::try_from(len)
                .ok()
                .and_then(|len| start.checked_add(len))
                .filter(|end| *end <= buffer.len())
            else {
                break;
            };
            self.append(&buffer[start..end]);
            consumed = end;
            count += 1;
        }
        Ok(Progress::new(consumed, count))
    }

    fn end_read(self: Box<Self>) -> Result<ColumnRef> {
        let mut this = *self;
        if this.slots.len() != this.rows {
            return Err(incomplete_column(this.slots.len(), this.rows));
        }
        let last = std::mem::take(&mut this.current);
        if !this.slots.is_empty() {
            this.segments.push(last.freeze());
        }
        Ok(Arc::new(StringColumn {
            type_: this.type_,
            segments: this.segments,
            slots: this.slots,
            strict_utf8: this.strict_utf8,
        }))
    }
}

/// Skip reader for String columns
pub struct StringSkipper {
    rows: usize,
    skipped: usize,
}

impl StringSkipper {
    pub fn new(rows: usize) -> Self {
        Self { rows, skipped: 0 }
    }
}

impl ColumnSkipper for StringSkipper {
    fn skip_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = 0;
        let mut count = 0;
        while self.skipped < self.rows {
            let Some((len, header)) = try_read_varint(&buffer[consumed..])?
            else {
                break;
            };
            let available = (buffer.len() - consumed - header) as u64;
            if len > available {
                break;
            }
            consumed += header + len as usize;
            self.skipped += 1;
            count += 1;
        }
        Ok(Progress::new(consumed, count))
    }
}

/// Writer for String columns; a row is written only when its length and all
/// of its bytes fit
pub struct StringWriter {
    values: Vec<Bytes>,
    position: usize,
}

impl StringWriter {
    pub fn new(values: Vec<Bytes>) -> Self {
        Self { values, position: 0 }
    }
}

impl ColumnWriter for StringWriter {
    fn write_next(&mut self, output: &mut [u8]) -> Result<Progress> {
        let mut written = 0;
        let mut count = 0;
        while let Some(value) = self.values.get(self.position) {
            let len = value.len() as u64;
            let total = varint_len(len) + value.len();
            if output.len() - written < total {
                break;
            }
            let header = put_varint(&mut output[written..], len)
                .ok_or_else(|| Error::Internal("varint did not fit".into()))?;
            written += header;
            output[written..written + value.len()].copy_from_slice(value);
            written += value.len();
            self.position += 1;
            count += 1;
        }
        Ok(Progress::new(written, count))
    }
}

fn value_bytes(type_name: &str, value: Value) -> Result<Bytes> {
    match value {
        Value::String(s) => Ok(Bytes::from(s)),
        Value::Bytes(b) => Ok(b),
        other => Err(Error::type_mismatch(type_name, other.kind_name())),
    }
}

pub(crate) fn create_writer(rows: Vec<Value>) -> Result<Box<dyn ColumnWriter>> {
    let values = rows
        .into_iter()
        .map(|value| value_bytes("String", value))
        .collect::<Result<Vec<_>>>()?;
    Ok(Box::new(StringWriter::new(values)))
}

/// Column for FixedString(N); rows are contiguous N-byte slots
pub struct FixedStringColumn {
    type_: Type,
    size: usize,
    data: Bytes,
}

impl FixedStringColumn {
    pub fn new(type_: Type, size: usize, data: Bytes) -> Self {
        Self { type_, size, data }
    }

    pub fn fixed_size(&self) -> usize {
        self.size
    }

    /// Row bytes including NUL padding
    pub fn get_bytes(&self, index: usize) -> Result<Bytes> {
        let rows = TableColumn::row_count(self);
        if index >= rows {
            return Err(Error::out_of_bounds(index, rows));
        }
        let start = index * self.size;
        Ok(self.data.slice(start..start + self.size))
    }
}

impl TableColumn for FixedStringColumn {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn row_count(&self) -> usize {
        self.data.len() / self.size.max(1)
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        self.get_bytes(index).map(Value::Bytes)
    }

    impl_column_any!();
}

impl TypedColumn<Bytes> for FixedStringColumn {
    fn row_count(&self) -> usize {
        TableColumn::row_count(self)
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get(&self, index: usize) -> Result<Bytes> {
        self.get_bytes(index)
    }
}

impl TypedColumn<String> for FixedStringColumn {
    fn row_count(&self) -> usize {
        TableColumn::row_count(self)
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    /// Text without the trailing NUL padding
    fn get(&self, index: usize) -> Result<String> {
        let bytes = self.get_bytes(index)?;
        let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

/// Reader for FixedString(N)
pub struct FixedStringReader {
    type_: Type,
    rows: usize,
    size: usize,
    data: BytesMut,
}

impl ColumnReader for FixedStringReader {
    fn read_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let read = self.data.len() / self.size;
        let count = (buffer.len() / self.size).min(self.rows - read);
        let bytes = count * self.size;
        self.data.extend_from_slice(&buffer[..bytes]);
        Ok(Progress::new(bytes, count))
    }

    fn end_read(self: Box<Self>) -> Result<ColumnRef> {
        let this = *self;
        let read = this.data.len() / this.size;
        if read != this.rows {
            return Err(incomplete_column(read, this.rows));
        }
        Ok(Arc::new(FixedStringColumn::new(
            this.type_,
            this.size,
            this.data.freeze(),
        )))
    }
}

/// Writer for FixedString(N); values shorter than N are NUL padded
pub struct FixedStringWriter {
    size: usize,
    values: Vec<Bytes>,
    position: usize,
}

impl ColumnWriter for FixedStringWriter {
    fn write_next(&mut self, output: &mut [u8]) -> Result<Progress> {
        let count =
            (output.len() / self.size).min(self.values.len() - self.position);
        for (slot, value) in output
            .chunks_exact_mut(self.size)
            .zip(&self.values[self.position..self.position + count])
        {
            slot[..value.len()].copy_from_slice(value);
            slot[value.len()..].fill(0);
        }
        self.position += count;
        Ok(Progress::new(count * self.size, count))
    }
}

fn fixed_size(type_: &Type) -> Result<usize> {
    match type_ {
        Type::FixedString { size } if *size > 0 => Ok(*size),
        _ => Err(Error::Internal(format!("{} is not a FixedString", type_))),
    }
}

pub(crate) fn create_fixed_string_reader(
    type_: &Type,
    rows: usize,
) -> Result<Box<dyn ColumnReader>> {
    let size = fixed_size(type_)?;
    Ok(Box::new(FixedStringReader {
        type_: type_.clone(),
        rows,
        size,
        data: BytesMut::with_capacity(
            reserved_capacity(rows).saturating_mul(size),
        ),
    }))
}

pub(crate) fn create_fixed_string_writer(
    type_: &Type,
    rows: Vec<Value>,
) -> Result<Box<dyn ColumnWriter>> {
    let size = fixed_size(type_)?;
    let type_name = type_.name();
    let values = rows
        .into_iter()
        .map(|value| {
            let bytes = value_bytes(&type_name, value)?;
            if bytes.len() > size {
                return Err(Error::InvalidArgument(format!(
                    "{} bytes do not fit {}",
                    bytes.len(),
                    type_name
                )));
            }
            Ok(bytes)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Box::new(FixedStringWriter { size, values, position: 0 }))
}

impl Projection for String {
    fn project(column: &ColumnRef) -> Option<TypedColumnRef<Self>> {
        if let Some(c) = downcast_column::<StringColumn>(column) {
            return Some(c as TypedColumnRef<String>);
        }
        if let Some(c) = downcast_column::<FixedStringColumn>(column) {
            return Some(c as TypedColumnRef<String>);
        }
        enum_column::project_names(column)
    }
}

impl Projection for Bytes {
    fn project(column: &ColumnRef) -> Option<TypedColumnRef<Self>> {
        if let Some(c) = downcast_column::<StringColumn>(column) {
            return Some(c as TypedColumnRef<Bytes>);
        }
        downcast_column::<FixedStringColumn>(column)
            .map(|c| c as TypedColumnRef<Bytes>)
    }
}
