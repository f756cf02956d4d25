use super::{
    impl_column_any,
    projection::TypedColumn,
    ColumnRef,
    TableColumn,
};
use crate::{
    io::column_stream::{
        reserved_capacity,
        ColumnReader,
        ColumnSkipper,
        ColumnWriter,
        Progress,
    },
    types::Type,
    value::FromValue,
    Error,
    Result,
    Value,
};
use bytes::{
    Buf,
    BufMut,
};
use std::{
    fmt::Debug,
    net::{
        Ipv4Addr,
        Ipv6Addr,
    },
};
use uuid::Uuid;

/// Trait for values stored as a fixed number of little-endian bytes
///
/// Callers guarantee `SIZE` bytes are available on both sides.
pub trait FixedSize: Copy + Send + Sync + 'static {
    const SIZE: usize;

    fn read_from(buffer: &mut &[u8]) -> Self;
    fn write_to(&self, buffer: &mut &mut [u8]);
}

// Implement FixedSize for primitive types
macro_rules! impl_fixed_size {
    ($type:ty, $get:ident, $put:ident) => {
        impl FixedSize for $type {
            const SIZE: usize = std::mem::size_of::<$type>();

            fn read_from(buffer: &mut &[u8]) -> Self {
                buffer.$get()
            }

            fn write_to(&self, buffer: &mut &mut [u8]) {
                buffer.$put(*self);
            }
        }
    };
}

impl_fixed_size!(u8, get_u8, put_u8);
impl_fixed_size!(u16, get_u16_le, put_u16_le);
impl_fixed_size!(u32, get_u32_le, put_u32_le);
impl_fixed_size!(u64, get_u64_le, put_u64_le);
impl_fixed_size!(u128, get_u128_le, put_u128_le);
impl_fixed_size!(i8, get_i8, put_i8);
impl_fixed_size!(i16, get_i16_le, put_i16_le);
impl_fixed_size!(i32, get_i32_le, put_i32_le);
impl_fixed_size!(i64, get_i64_le, put_i64_le);
impl_fixed_size!(i128, get_i128_le, put_i128_le);
impl_fixed_size!(f32, get_f32_le, put_f32_le);
impl_fixed_size!(f64, get_f64_le, put_f64_le);

impl FixedSize for bool {
    const SIZE: usize = 1;

    fn read_from(buffer: &mut &[u8]) -> Self {
        buffer.get_u8() != 0
    }

    fn write_to(&self, buffer: &mut &mut [u8]) {
        buffer.put_u8(u8::from(*self));
    }
}

// UUID is two little-endian u64 halves, high half first
impl FixedSize for Uuid {
    const SIZE: usize = 16;

    fn read_from(buffer: &mut &[u8]) -> Self {
        let high = buffer.get_u64_le();
        let low = buffer.get_u64_le();
        Uuid::from_u64_pair(high, low)
    }

    fn write_to(&self, buffer: &mut &mut [u8]) {
        let (high, low) = self.as_u64_pair();
        buffer.put_u64_le(high);
        buffer.put_u64_le(low);
    }
}

impl FixedSize for Ipv4Addr {
    const SIZE: usize = 4;

    fn read_from(buffer: &mut &[u8]) -> Self {
        Ipv4Addr::from(buffer.get_u32_le())
    }

    fn write_to(&self, buffer: &mut &mut [u8]) {
        buffer.put_u32_le(u32::from(*self));
    }
}

// IPv6 is stored in network byte order
impl FixedSize for Ipv6Addr {
    const SIZE: usize = 16;

    fn read_from(buffer: &mut &[u8]) -> Self {
        let mut octets = [0u8; 16];
        buffer.copy_to_slice(&mut octets);
        Ipv6Addr::from(octets)
    }

    fn write_to(&self, buffer: &mut &mut [u8]) {
        buffer.put_slice(&self.octets());
    }
}

/// Storage element of a plain fixed-width column
pub trait Primitive:
    FixedSize + FromValue + Into<Value> + Debug + PartialEq
{
}

impl<T> Primitive for T where
    T: FixedSize + FromValue + Into<Value> + Debug + PartialEq
{
}

/// Decode as many whole elements as `buffer` holds, up to `limit` in `dst`
///
/// Returns the number of elements appended; a trailing partial element is
/// left untouched.
pub(crate) fn read_elements<T: FixedSize>(
    dst: &mut Vec<T>,
    limit: usize,
    buffer: &[u8],
) -> usize {
    let remaining = limit.saturating_sub(dst.len());
    let count = (buffer.len() / T::SIZE).min(remaining);
    let mut cursor = &buffer[..count * T::SIZE];
    dst.extend((0..count).map(|_| T::read_from(&mut cursor)));
    count
}

/// Encode as many elements of `src` as fit into `output`
pub(crate) fn write_elements<T: FixedSize>(
    src: &[T],
    output: &mut [u8],
) -> usize {
    let count = (output.len() / T::SIZE).min(src.len());
    let mut cursor = &mut output[..count * T::SIZE];
    for value in &src[..count] {
        value.write_to(&mut cursor);
    }
    count
}

pub(crate) fn incomplete_column(read: usize, rows: usize) -> Error {
    Error::Protocol(format!(
        "Column finalized after {} of {} rows",
        read, rows
    ))
}

/// Generic column for fixed-width primitives
pub struct VectorColumn<T: Primitive> {
    type_: Type,
    data: Vec<T>,
}

impl<T: Primitive> VectorColumn<T> {
    pub fn new(type_: Type, data: Vec<T>) -> Self {
        Self { type_, data }
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.data.get(index).copied()
    }
}

impl<T: Primitive> TableColumn for VectorColumn<T> {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn row_count(&self) -> usize {
        self.data.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        self.get(index)
            .map(Into::into)
            .ok_or_else(|| Error::out_of_bounds(index, self.data.len()))
    }

    impl_column_any!();
}

impl<T: Primitive> TypedColumn<T> for VectorColumn<T> {
    fn row_count(&self) -> usize {
        self.data.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get(&self, index: usize) -> Result<T> {
        VectorColumn::get(self, index)
            .ok_or_else(|| Error::out_of_bounds(index, self.data.len()))
    }
}

type Finisher<T> = Box<dyn FnOnce(Vec<T>) -> ColumnRef + Send>;

/// Reader for any fixed-width element; `finish` wraps the decoded storage
/// into the column type that gives it meaning
pub struct FixedReader<T: FixedSize> {
    rows: usize,
    data: Vec<T>,
    finish: Finisher<T>,
}

impl<T: FixedSize> FixedReader<T> {
    pub fn new(
        rows: usize,
        finish: impl FnOnce(Vec<T>) -> ColumnRef + Send + 'static,
    ) -> Self {
        Self {
            rows,
            data: Vec::with_capacity(reserved_capacity(rows)),
            finish: Box::new(finish),
        }
    }
}

impl<T: FixedSize> ColumnReader for FixedReader<T> {
    fn read_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let count = read_elements(&mut self.data, self.rows, buffer);
        Ok(Progress::new(count * T::SIZE, count))
    }

    fn end_read(self: Box<Self>) -> Result<ColumnRef> {
        let this = *self;
        if this.data.len() != this.rows {
            return Err(incomplete_column(this.data.len(), this.rows));
        }
        Ok((this.finish)(this.data))
    }
}

/// Skip reader for any fixed-width element
pub struct FixedSkipper {
    rows: usize,
    skipped: usize,
    size: usize,
}

impl FixedSkipper {
    pub fn new(rows: usize, size: usize) -> Self {
        Self { rows, skipped: 0, size: size.max(1) }
    }
}

impl ColumnSkipper for FixedSkipper {
    fn skip_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let count = (buffer.len() / self.size).min(self.rows - self.skipped);
        self.skipped += count;
        Ok(Progress::new(count * self.size, count))
    }
}

/// Writer for any fixed-width element
pub struct FixedWriter<T: FixedSize> {
    data: Vec<T>,
    position: usize,
}

impl<T: FixedSize> FixedWriter<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data, position: 0 }
    }
}

impl<T: FixedSize> ColumnWriter for FixedWriter<T> {
    fn write_next(&mut self, output: &mut [u8]) -> Result<Progress> {
        let count = write_elements(&self.data[self.position..], output);
        self.position += count;
        Ok(Progress::new(count * T::SIZE, count))
    }
}
