//! Nullable column implementation
//!
//! **ClickHouse Documentation:** <https://clickhouse.com/docs/en/sql-reference/data-types/nullable>
//!
//! ## Wire Format
//!
//! ```text
//! [nested prefix]
//! [null flags: UInt8 * rows]   // 1 = NULL
//! [nested data: rows]          // NULL rows hold a default value
//! ```

use super::{
    impl_column_any,
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
    io::column_stream::{
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
        Progress,
    },
    settings::CodecSettings,
    types::Type,
    Error,
    Result,
    Value,
};
use std::sync::Arc;

/// Null flags packed one bit per row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NullMask {
    words: Vec<u64>,
    len: usize,
}

impl NullMask {
    pub fn with_capacity(rows: usize) -> Self {
        Self { words: Vec::with_capacity(rows.div_ceil(64)), len: 0 }
    }

    pub fn push(&mut self, is_null: bool) {
        let bit = self.len % 64;
        if bit == 0 {
            self.words.push(0);
        }
        if is_null {
            if let Some(word) = self.words.last_mut() {
                *word |= 1 << bit;
            }
        }
        self.len += 1;
    }

    /// Rows past the end are not null
    pub fn get(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.words[index / 64] & (1 << (index % 64)) != 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn count_nulls(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

/// Column for Nullable(T): a null mask over a nested column of every row
pub struct NullableColumn {
    type_: Type,
    nulls: Arc<NullMask>,
    nested: ColumnRef,
}

impl NullableColumn {
    pub fn new(type_: Type, nulls: NullMask, nested: ColumnRef) -> Self {
        Self { type_, nulls: Arc::new(nulls), nested }
    }

    pub fn nested(&self) -> &ColumnRef {
        &self.nested
    }

    pub fn nulls(&self) -> &NullMask {
        &self.nulls
    }

    /// Apply the projection to the nested column and mask null rows
    pub fn reinterpret<T: Projection>(&self) -> Option<TypedColumnRef<T>> {
        let inner = try_reinterpret::<T>(&self.nested)?;
        Some(Arc::new(NullMasked { nulls: Arc::clone(&self.nulls), inner }))
    }
}

impl TableColumn for NullableColumn {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn row_count(&self) -> usize {
        self.nulls.len()
    }

    /// Set when the flag is set or the nested value is itself null
    fn is_null(&self, index: usize) -> bool {
        self.nulls.get(index) || self.nested.is_null(index)
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        if index >= self.nulls.len() {
            return Err(Error::out_of_bounds(index, self.nulls.len()));
        }
        if self.is_null(index) {
            return Ok(Value::Null);
        }
        self.nested.get_value(index)
    }

    impl_column_any!();
}

/// Null rows yield `T::null()`, or the stored default when `T` has no null
struct NullMasked<T> {
    nulls: Arc<NullMask>,
    inner: TypedColumnRef<T>,
}

impl<T: Projection> TypedColumn<T> for NullMasked<T> {
    fn row_count(&self) -> usize {
        self.nulls.len()
    }

    fn is_null(&self, index: usize) -> bool {
        self.nulls.get(index) || self.inner.is_null(index)
    }

    fn get(&self, index: usize) -> Result<T> {
        if self.nulls.get(index) {
            if let Some(null) = T::null() {
                return Ok(null);
            }
        }
        self.inner.get(index)
    }
}

/// Reads null flags, accumulating the ones not yet seen
fn read_flags(nulls: &mut NullMask, rows: usize, buffer: &[u8]) -> usize {
    let count = buffer.len().min(rows - nulls.len());
    for &flag in &buffer[..count] {
        nulls.push(flag != 0);
    }
    count
}

/// Incremental reader for Nullable(T)
pub struct NullableReader {
    type_: Type,
    rows: usize,
    nulls: NullMask,
    nested: Box<dyn ColumnReader>,
    nested_done: usize,
}

impl ColumnReader for NullableReader {
    fn read_prefix(&mut self, buffer: &[u8]) -> Result<Progress> {
        self.nested.read_prefix(buffer)
    }

    fn read_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = read_flags(&mut self.nulls, self.rows, buffer);
        if self.nulls.len() < self.rows {
            return Ok(Progress::new(consumed, 0));
        }
        let before = self.nested_done;
        consumed += drive_nested_reader(
            self.nested.as_mut(),
            self.rows,
            &mut self.nested_done,
            &buffer[consumed..],
        )?;
        Ok(Progress::new(consumed, self.nested_done - before))
    }

    fn end_read(self: Box<Self>) -> Result<ColumnRef> {
        let this = *self;
        if this.nested_done != this.rows {
            return Err(incomplete_column(this.nested_done, this.rows));
        }
        let nested = this.nested.end_read()?;
        Ok(Arc::new(NullableColumn::new(this.type_, this.nulls, nested)))
    }
}

/// Skip reader for Nullable(T)
pub struct NullableSkipper {
    rows: usize,
    flags_skipped: usize,
    nested: Box<dyn ColumnSkipper>,
    nested_done: usize,
}

impl ColumnSkipper for NullableSkipper {
    fn skip_prefix(&mut self, buffer: &[u8]) -> Result<Progress> {
        self.nested.skip_prefix(buffer)
    }

    fn skip_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = buffer.len().min(self.rows - self.flags_skipped);
        self.flags_skipped += consumed;
        if self.flags_skipped < self.rows {
            return Ok(Progress::new(consumed, 0));
        }
        let before = self.nested_done;
        consumed += drive_nested_skipper(
            self.nested.as_mut(),
            self.rows,
            &mut self.nested_done,
            &buffer[consumed..],
        )?;
        Ok(Progress::new(consumed, self.nested_done - before))
    }
}

/// Writer for Nullable(T); null rows are written as the nested default
pub struct NullableWriter {
    flags: Vec<u8>,
    flags_written: usize,
    nested: Box<dyn ColumnWriter>,
    nested_done: usize,
}

impl ColumnWriter for NullableWriter {
    fn write_prefix(&mut self, output: &mut [u8]) -> Result<Progress> {
        self.nested.write_prefix(output)
    }

    fn write_next(&mut self, output: &mut [u8]) -> Result<Progress> {
        let count = output.len().min(self.flags.len() - self.flags_written);
        output[..count].copy_from_slice(
            &self.flags[self.flags_written..self.flags_written + count],
        );
        self.flags_written += count;
        let mut written = count;
        if self.flags_written < self.flags.len() {
            return Ok(Progress::new(written, 0));
        }
        let before = self.nested_done;
        written += drive_nested_writer(
            self.nested.as_mut(),
            self.flags.len(),
            &mut self.nested_done,
            &mut output[written..],
        )?;
        Ok(Progress::new(written, self.nested_done - before))
    }
}

fn nested_type(type_: &Type) -> Result<&Type> {
    match type_ {
        Type::Nullable { nested_type } => {
            if matches!(**nested_type, Type::Nullable { .. }) {
                return Err(Error::TypeNotSupported(type_.name()));
            }
            Ok(nested_type.as_ref())
        }
        _ => Err(Error::Internal(format!("{} is not Nullable", type_))),
    }
}

pub(crate) fn create_reader(
    type_: &Type,
    rows: usize,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnReader>> {
    let nested = create_nested_reader(nested_type(type_)?, rows, settings)?;
    Ok(Box::new(NullableReader {
        type_: type_.clone(),
        rows,
        nulls: NullMask::with_capacity(reserved_capacity(rows)),
        nested,
        nested_done: 0,
    }))
}

pub(crate) fn create_skipper(
    type_: &Type,
    rows: usize,
) -> Result<Box<dyn ColumnSkipper>> {
    let nested = create_nested_skipper(nested_type(type_)?, rows)?;
    Ok(Box::new(NullableSkipper { rows, flags_skipped: 0, nested, nested_done: 0 }))
}

pub(crate) fn create_writer(
    type_: &Type,
    rows: Vec<Value>,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnWriter>> {
    let nested_type = nested_type(type_)?;
    let default = nested_type.default_value(settings);
    let mut flags = Vec::with_capacity(rows.len());
    let values = rows
        .into_iter()
        .map(|value| {
            flags.push(u8::from(value.is_null()));
            if value.is_null() {
                default.clone()
            } else {
                value
            }
        })
        .collect();
    let nested = create_nested_writer(nested_type, values, settings)?;
    Ok(Box::new(NullableWriter { flags, flags_written: 0, nested, nested_done: 0 }))
}
