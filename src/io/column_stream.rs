//! Incremental column reader/writer contracts and their factories
//!
//! A transport hands a reader whatever bytes it has buffered. The reader
//! consumes only whole elements (or whole framing integers) and reports a
//! [`Progress`]; the caller keeps the unconsumed remainder, appends newly
//! arrived bytes and calls again. Writers work the same way over output
//! space.
//!
//! ## Call sequence
//!
//! ```text
//! read_prefix(..)   until Progress.elements == 1   (once per block)
//! read_next(..)     until sum(Progress.elements) == row_count
//! end_read()        -> ColumnRef
//! ```
//!
//! The helpers [`read_column`], [`write_column`] and [`skip_column`] run that
//! loop over an in-memory buffer in fixed-size chunks.

use crate::{
    column::{
        array,
        date,
        decimal,
        enum_column,
        lowcardinality,
        map,
        nothing,
        nullable,
        numeric::{
            FixedReader,
            FixedSkipper,
            FixedWriter,
            Primitive,
            VectorColumn,
        },
        sparse,
        string,
        tuple,
        variant,
        ColumnRef,
    },
    dispatch::{
        StorageKind,
        StorageVisitor,
    },
    settings::CodecSettings,
    types::{
        Type,
        TypeCode,
    },
    value::FromValue,
    Error,
    Result,
    Value,
};
use bytes::BytesMut;
use std::{
    ops::{
        Add,
        AddAssign,
    },
    sync::Arc,
};

/// Bytes consumed (or written) and elements completed by one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub bytes: usize,
    pub elements: usize,
}

impl Progress {
    pub fn new(bytes: usize, elements: usize) -> Self {
        Self { bytes, elements }
    }

    /// Progress of a prefix call that finished the prefix
    pub fn prefix_done(bytes: usize) -> Self {
        Self { bytes, elements: 1 }
    }

    /// No bytes consumed, nothing completed
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.bytes == 0 && self.elements == 0
    }
}

impl Add for Progress {
    type Output = Progress;

    fn add(self, rhs: Progress) -> Progress {
        Progress::new(self.bytes + rhs.bytes, self.elements + rhs.elements)
    }
}

impl AddAssign for Progress {
    fn add_assign(&mut self, rhs: Progress) {
        *self = *self + rhs;
    }
}

/// Most elements a reader reserves storage for before any arrive
///
/// Nested row counts (Array offsets, LowCardinality dictionary sizes) are
/// read off the wire; storage beyond this grows as elements are decoded.
const MAX_RESERVED_ELEMENTS: usize = 1 << 16;

/// Initial capacity for storage that will eventually hold `count` elements
pub(crate) fn reserved_capacity(count: usize) -> usize {
    count.min(MAX_RESERVED_ELEMENTS)
}

/// Incremental decoder for one column of a known row count
pub trait ColumnReader: Send {
    /// Consume the one-time column header
    ///
    /// Reports `elements == 1` once the header is complete. Types without a
    /// header complete immediately.
    fn read_prefix(&mut self, _buffer: &[u8]) -> Result<Progress> {
        Ok(Progress::prefix_done(0))
    }

    /// Consume as many rows as `buffer` holds completely
    fn read_next(&mut self, buffer: &[u8]) -> Result<Progress>;

    /// Finalize into an immutable column
    fn end_read(self: Box<Self>) -> Result<ColumnRef>;
}

/// Incremental reader that advances over a column without keeping values
pub trait ColumnSkipper: Send {
    fn skip_prefix(&mut self, _buffer: &[u8]) -> Result<Progress> {
        Ok(Progress::prefix_done(0))
    }

    fn skip_next(&mut self, buffer: &[u8]) -> Result<Progress>;
}

/// Incremental encoder for one column
pub trait ColumnWriter: Send {
    /// Write the one-time column header; reports `elements == 1` when done
    fn write_prefix(&mut self, _output: &mut [u8]) -> Result<Progress> {
        Ok(Progress::prefix_done(0))
    }

    /// Write as many whole rows as fit into `output`
    fn write_next(&mut self, output: &mut [u8]) -> Result<Progress>;
}

/// How a column's values are laid out on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SerializationKind {
    #[default]
    Default,
    /// Run lengths of default rows followed by the non-default values only
    Sparse,
}

struct ReaderFactory<'a> {
    type_: &'a Type,
    rows: usize,
}

impl StorageVisitor for ReaderFactory<'_> {
    type Output = Box<dyn ColumnReader>;

    fn visit<T: Primitive>(self) -> Self::Output {
        let type_ = self.type_.clone();
        Box::new(FixedReader::<T>::new(self.rows, move |data| {
            Arc::new(VectorColumn::new(type_, data)) as ColumnRef
        }))
    }
}

struct WriterFactory {
    rows: Vec<Value>,
}

impl StorageVisitor for WriterFactory {
    type Output = Result<Box<dyn ColumnWriter>>;

    fn visit<T: Primitive>(self) -> Self::Output {
        let data = self
            .rows
            .into_iter()
            .map(T::from_value)
            .collect::<Result<Vec<T>>>()?;
        Ok(Box::new(FixedWriter::new(data)))
    }
}

struct ElementSize;

impl StorageVisitor for ElementSize {
    type Output = usize;

    fn visit<T: Primitive>(self) -> usize {
        T::SIZE
    }
}

fn not_fully_specified(type_: &Type) -> Error {
    Error::TypeNotFullySpecified(type_.name())
}

/// Build a reader for `rows` rows of `type_`
pub fn create_reader(
    type_: &Type,
    rows: usize,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnReader>> {
    match type_ {
        Type::Unspecified(_) => Err(not_fully_specified(type_)),
        Type::Simple(TypeCode::Nothing) => {
            Ok(Box::new(nothing::NothingReader::new(rows)))
        }
        Type::Simple(TypeCode::String) => Ok(Box::new(
            string::StringReader::new(type_.clone(), rows, settings),
        )),
        Type::Simple(TypeCode::Date) | Type::Simple(TypeCode::Date32) => {
            date::create_date_reader(type_, rows)
        }
        Type::Simple(code) => StorageKind::of(*code)
            .map(|kind| kind.dispatch(ReaderFactory { type_, rows }))
            .ok_or_else(|| Error::TypeNotSupported(type_.name())),
        Type::FixedString { .. } => {
            string::create_fixed_string_reader(type_, rows)
        }
        Type::DateTime { .. } | Type::DateTime64 { .. } => {
            date::create_datetime_reader(type_, rows, settings)
        }
        Type::Decimal { .. } => decimal::create_reader(type_, rows),
        Type::Enum8 { .. } | Type::Enum16 { .. } => {
            enum_column::create_reader(type_, rows)
        }
        Type::Array { .. } => array::create_reader(type_, rows, settings),
        Type::Nullable { .. } => nullable::create_reader(type_, rows, settings),
        Type::Tuple { .. } => tuple::create_reader(type_, rows, settings),
        Type::LowCardinality { .. } => {
            lowcardinality::create_reader(type_, rows, settings)
        }
        Type::Map { .. } => map::create_reader(type_, rows, settings),
        Type::Variant { .. } => variant::create_reader(type_, rows, settings),
    }
}

/// Build a skip reader for `rows` rows of `type_`
pub fn create_skipper(
    type_: &Type,
    rows: usize,
) -> Result<Box<dyn ColumnSkipper>> {
    match type_ {
        Type::Unspecified(_) => Err(not_fully_specified(type_)),
        Type::Simple(TypeCode::Nothing) => {
            Ok(Box::new(FixedSkipper::new(rows, 1)))
        }
        Type::Simple(TypeCode::String) => {
            Ok(Box::new(string::StringSkipper::new(rows)))
        }
        Type::Simple(code) => {
            let size = match StorageKind::of(*code) {
                Some(kind) => kind.dispatch(ElementSize),
                None => type_
                    .storage_size_bytes()
                    .ok_or_else(|| Error::TypeNotSupported(type_.name()))?,
            };
            Ok(Box::new(FixedSkipper::new(rows, size)))
        }
        Type::Array { .. } => array::create_skipper(type_, rows),
        Type::Nullable { .. } => nullable::create_skipper(type_, rows),
        Type::Tuple { .. } => tuple::create_skipper(type_, rows),
        Type::LowCardinality { .. } => {
            lowcardinality::create_skipper(type_, rows)
        }
        Type::Map { .. } => map::create_skipper(type_, rows),
        Type::Variant { .. } => variant::create_skipper(type_, rows),
        Type::FixedString { .. }
        | Type::DateTime { .. }
        | Type::DateTime64 { .. }
        | Type::Decimal { .. }
        | Type::Enum8 { .. }
        | Type::Enum16 { .. } => {
            let size = type_
                .storage_size_bytes()
                .ok_or_else(|| Error::TypeNotSupported(type_.name()))?;
            Ok(Box::new(FixedSkipper::new(rows, size)))
        }
    }
}

/// Build a writer serializing `rows` as `type_`
pub fn create_writer(
    type_: &Type,
    rows: Vec<Value>,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnWriter>> {
    match type_ {
        Type::Unspecified(_) => Err(not_fully_specified(type_)),
        Type::Simple(TypeCode::Nothing) => nothing::create_writer(rows),
        Type::Simple(TypeCode::String) => string::create_writer(rows),
        Type::Simple(TypeCode::Date) | Type::Simple(TypeCode::Date32) => {
            date::create_date_writer(type_, rows)
        }
        Type::Simple(code) => match StorageKind::of(*code) {
            Some(kind) => kind.dispatch(WriterFactory { rows }),
            None => Err(Error::TypeNotSupported(type_.name())),
        },
        Type::FixedString { .. } => {
            string::create_fixed_string_writer(type_, rows)
        }
        Type::DateTime { .. } | Type::DateTime64 { .. } => {
            date::create_datetime_writer(type_, rows, settings)
        }
        Type::Decimal { .. } => decimal::create_writer(type_, rows),
        Type::Enum8 { .. } | Type::Enum16 { .. } => {
            enum_column::create_writer(type_, rows)
        }
        Type::Array { .. } => array::create_writer(type_, rows, settings),
        Type::Nullable { .. } => nullable::create_writer(type_, rows, settings),
        Type::Tuple { .. } => tuple::create_writer(type_, rows, settings),
        Type::LowCardinality { .. } => {
            lowcardinality::create_writer(type_, rows, settings)
        }
        Type::Map { .. } => map::create_writer(type_, rows, settings),
        Type::Variant { .. } => variant::create_writer(type_, rows, settings),
    }
}

/// [`create_reader`] for an explicit serialization kind
pub fn create_reader_for(
    type_: &Type,
    rows: usize,
    kind: SerializationKind,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnReader>> {
    match kind {
        SerializationKind::Default => create_reader(type_, rows, settings),
        SerializationKind::Sparse => {
            sparse::create_reader(type_, rows, settings)
        }
    }
}

/// [`create_skipper`] for an explicit serialization kind
pub fn create_skipper_for(
    type_: &Type,
    rows: usize,
    kind: SerializationKind,
) -> Result<Box<dyn ColumnSkipper>> {
    match kind {
        SerializationKind::Default => create_skipper(type_, rows),
        SerializationKind::Sparse => sparse::create_skipper(type_, rows),
    }
}

/// [`create_writer`] for an explicit serialization kind
pub fn create_writer_for(
    type_: &Type,
    rows: Vec<Value>,
    kind: SerializationKind,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnWriter>> {
    match kind {
        SerializationKind::Default => create_writer(type_, rows, settings),
        SerializationKind::Sparse => {
            sparse::create_writer(type_, rows, settings)
        }
    }
}

/// Holds the bytes of a nested prefix read before the nested row count is
/// known
///
/// Array offsets, Variant discriminants and Sparse run lengths come after
/// the nested prefix on the wire, but the nested reader can only be built
/// once they are known. A zero-row skipper consumes the prefix meanwhile and
/// the consumed bytes are replayed into the real reader or skipper later.
pub(crate) struct PrefixProbe {
    probe: Box<dyn ColumnSkipper>,
    replay: Vec<u8>,
    done: bool,
}

impl PrefixProbe {
    pub(crate) fn new(type_: &Type) -> Result<Self> {
        Ok(Self {
            probe: create_skipper(type_, 0)?,
            replay: Vec::new(),
            done: false,
        })
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }

    /// Consume prefix bytes; same progress contract as `read_prefix`
    pub(crate) fn feed(&mut self, buffer: &[u8]) -> Result<Progress> {
        if self.done {
            return Ok(Progress::prefix_done(0));
        }
        let progress = self.probe.skip_prefix(buffer)?;
        self.replay.extend_from_slice(&buffer[..progress.bytes]);
        if progress.elements > 0 {
            self.done = true;
        }
        Ok(progress)
    }

    pub(crate) fn replay_reader(
        &self,
        reader: &mut dyn ColumnReader,
    ) -> Result<()> {
        let progress = reader.read_prefix(&self.replay)?;
        self.check_replayed(progress)
    }

    pub(crate) fn replay_skipper(
        &self,
        skipper: &mut dyn ColumnSkipper,
    ) -> Result<()> {
        let progress = skipper.skip_prefix(&self.replay)?;
        self.check_replayed(progress)
    }

    fn check_replayed(&self, progress: Progress) -> Result<()> {
        if !self.done
            || progress.elements == 0
            || progress.bytes != self.replay.len()
        {
            return Err(Error::Internal(format!(
                "Nested prefix replay consumed {} of {} bytes",
                progress.bytes,
                self.replay.len()
            )));
        }
        Ok(())
    }
}

/// Feed `buffer` to a nested reader until it completes `rows` elements or
/// stops making progress; `done` tracks elements completed so far
pub(crate) fn drive_nested_reader(
    reader: &mut dyn ColumnReader,
    rows: usize,
    done: &mut usize,
    buffer: &[u8],
) -> Result<usize> {
    let mut consumed = 0;
    while *done < rows {
        let progress = reader.read_next(&buffer[consumed..])?;
        if progress.is_none() {
            break;
        }
        consumed += progress.bytes;
        *done += progress.elements;
    }
    if *done > rows {
        return Err(Error::Internal(format!(
            "Nested reader produced {} elements, expected {}",
            done, rows
        )));
    }
    Ok(consumed)
}

/// [`drive_nested_reader`] for skippers
pub(crate) fn drive_nested_skipper(
    skipper: &mut dyn ColumnSkipper,
    rows: usize,
    done: &mut usize,
    buffer: &[u8],
) -> Result<usize> {
    let mut consumed = 0;
    while *done < rows {
        let progress = skipper.skip_next(&buffer[consumed..])?;
        if progress.is_none() {
            break;
        }
        consumed += progress.bytes;
        *done += progress.elements;
    }
    if *done > rows {
        return Err(Error::Internal(format!(
            "Nested skipper passed {} elements, expected {}",
            done, rows
        )));
    }
    Ok(consumed)
}

/// [`drive_nested_reader`] for writers
pub(crate) fn drive_nested_writer(
    writer: &mut dyn ColumnWriter,
    rows: usize,
    done: &mut usize,
    output: &mut [u8],
) -> Result<usize> {
    let mut written = 0;
    while *done < rows {
        let progress = writer.write_next(&mut output[written..])?;
        if progress.is_none() {
            break;
        }
        written += progress.bytes;
        *done += progress.elements;
    }
    if *done > rows {
        return Err(Error::Internal(format!(
            "Nested writer completed {} elements, expected {}",
            done, rows
        )));
    }
    Ok(written)
}

/// Outcome of driving a reader over a buffer
pub struct ReadOutcome {
    pub column: ColumnRef,
    /// Bytes of the input that belonged to the column
    pub bytes: usize,
}

/// Drive `reader` over `data`, revealing `chunk_size` more bytes whenever it
/// stops making progress
pub fn read_column(
    reader: Box<dyn ColumnReader>,
    rows: usize,
    data: &[u8],
    chunk_size: usize,
) -> Result<ReadOutcome> {
    let chunk_size = chunk_size.max(1);
    drive_reader(reader, rows, data, &mut |delivered| delivered + chunk_size)
}

/// Drive `reader` over `data` split at the given byte offsets
pub fn read_column_split(
    reader: Box<dyn ColumnReader>,
    rows: usize,
    data: &[u8],
    boundaries: &[usize],
) -> Result<ReadOutcome> {
    let mut boundaries = boundaries.to_vec();
    boundaries.sort_unstable();
    drive_reader(reader, rows, data, &mut |delivered| {
        boundaries
            .iter()
            .copied()
            .find(|&b| b > delivered)
            .unwrap_or(usize::MAX)
    })
}

fn drive_reader(
    mut reader: Box<dyn ColumnReader>,
    rows: usize,
    data: &[u8],
    next_delivery: &mut dyn FnMut(usize) -> usize,
) -> Result<ReadOutcome> {
    let mut delivered = 0;
    let mut consumed = 0;
    let mut produced = 0;
    let mut prefix_done = false;

    loop {
        if prefix_done && produced == rows {
            break;
        }

        let available = &data[consumed..delivered];
        let progress = if prefix_done {
            reader.read_next(available)?
        } else {
            reader.read_prefix(available)?
        };

        if progress.bytes > available.len() {
            return Err(Error::Internal(format!(
                "Reader consumed {} bytes of {} available",
                progress.bytes,
                available.len()
            )));
        }
        consumed += progress.bytes;

        if !prefix_done {
            if progress.elements > 0 {
                prefix_done = true;
                continue;
            }
        } else {
            produced += progress.elements;
            if produced > rows {
                return Err(Error::Internal(format!(
                    "Reader produced {} rows, expected {}",
                    produced, rows
                )));
            }
        }

        if progress.is_none() {
            if delivered == data.len() {
                return Err(Error::Protocol(format!(
                    "Unexpected end of column data after {} of {} rows",
                    produced, rows
                )));
            }
            delivered = next_delivery(delivered).min(data.len());
        }
    }

    Ok(ReadOutcome { column: reader.end_read()?, bytes: consumed })
}

/// Drive `skipper` over `data` in `chunk_size` steps; returns bytes skipped
pub fn skip_column(
    mut skipper: Box<dyn ColumnSkipper>,
    rows: usize,
    data: &[u8],
    chunk_size: usize,
) -> Result<usize> {
    let chunk_size = chunk_size.max(1);
    let mut delivered = 0;
    let mut consumed = 0;
    let mut skipped = 0;
    let mut prefix_done = false;

    loop {
        if prefix_done && skipped == rows {
            break;
        }

        let available = &data[consumed..delivered];
        let progress = if prefix_done {
            skipper.skip_next(available)?
        } else {
            skipper.skip_prefix(available)?
        };
        consumed += progress.bytes;

        if !prefix_done {
            if progress.elements > 0 {
                prefix_done = true;
                continue;
            }
        } else {
            skipped += progress.elements;
            if skipped > rows {
                return Err(Error::Internal(format!(
                    "Skipper passed {} rows, expected {}",
                    skipped, rows
                )));
            }
        }

        if progress.is_none() {
            if delivered == data.len() {
                return Err(Error::Protocol(format!(
                    "Unexpected end of column data after skipping {} of {} \
                     rows",
                    skipped, rows
                )));
            }
            delivered = (delivered + chunk_size).min(data.len());
        }
    }

    Ok(consumed)
}

const MAX_OUTPUT_SPACE: usize = 1 << 31;

/// Drive `writer` into output windows of `chunk_size` bytes
///
/// A window is doubled whenever the writer cannot place a single row in it.
pub fn write_column(
    mut writer: Box<dyn ColumnWriter>,
    rows: usize,
    chunk_size: usize,
) -> Result<BytesMut> {
    let mut output = BytesMut::new();
    let mut window = vec![0u8; chunk_size.max(1)];
    let mut written = 0;
    let mut prefix_done = false;

    loop {
        if prefix_done && written == rows {
            break;
        }

        let progress = if prefix_done {
            writer.write_next(&mut window)?
        } else {
            writer.write_prefix(&mut window)?
        };

        if progress.bytes > window.len() {
            return Err(Error::Internal(format!(
                "Writer reported {} bytes for a {} byte window",
                progress.bytes,
                window.len()
            )));
        }
        output.extend_from_slice(&window[..progress.bytes]);

        if !prefix_done {
            if progress.elements > 0 {
                prefix_done = true;
                continue;
            }
        } else {
            written += progress.elements;
            if written > rows {
                return Err(Error::Internal(format!(
                    "Writer completed {} rows, expected {}",
                    written, rows
                )));
            }
        }

        if progress.is_none() {
            if window.len() >= MAX_OUTPUT_SPACE {
                return Err(Error::Internal(
                    "Writer made no progress with maximum output space"
                        .to_string(),
                ));
            }
            let grown = window.len() * 2;
            window.resize(grown, 0);
        }
    }

    Ok(output)
}

/// Serialize `values` as `type_` and read them back into a column
pub(crate) fn materialize(
    type_: &Type,
    values: Vec<Value>,
    settings: &CodecSettings,
) -> Result<ColumnRef> {
    let rows = values.len();
    let writer = create_writer(type_, values, settings)?;
    let bytes = write_column(writer, rows, 4096)?;
    let reader = create_reader(type_, rows, settings)?;
    let outcome = read_column(reader, rows, &bytes, bytes.len())?;
    Ok(outcome.column)
}
