//! LowCardinality column implementation
//!
//! **ClickHouse Documentation:** <https://clickhouse.com/docs/en/sql-reference/data-types/lowcardinality>
//!
//! ## Wire Format
//!
//! ```text
//! prefix: [version: UInt64 = 1]
//! body:   [serialization type: UInt64]   // key width code | flags
//!         [dictionary size: UInt64]
//!         [dictionary values]            // base type, never Nullable
//!         [row count: UInt64]
//!         [keys: UInt8/16/32/64 * rows]
//! ```
//!
//! Dictionary index 0 holds the base type's default. For
//! `LowCardinality(Nullable(T))` key 0 means NULL. Each written batch carries
//! its own complete dictionary; shared server-side dictionaries are not used.

use super::{
    impl_column_any,
    numeric::{
        incomplete_column,
        read_elements,
        write_elements,
    },
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
            create_reader as create_dictionary_reader,
            create_skipper as create_dictionary_skipper,
            create_writer as create_dictionary_writer,
            drive_nested_reader,
            drive_nested_skipper,
            drive_nested_writer,
            reserved_capacity,
            ColumnReader,
            ColumnSkipper,
            ColumnWriter,
            Progress,
        },
    },
    settings::CodecSettings,
    types::Type,
    value::ValueKey,
    Error,
    Result,
    Value,
};
use std::{
    collections::HashMap,
    sync::Arc,
};
use tracing::debug;

/// Key serialization version with per-block additional keys
const SHARED_DICTIONARIES_WITH_ADDITIONAL_KEYS: u64 = 1;

const KEY_WIDTH_MASK: u64 = 0xFF;
const NEED_GLOBAL_DICTIONARY: u64 = 1 << 8;
const HAS_ADDITIONAL_KEYS: u64 = 1 << 9;

/// Dictionary keys at the width chosen for the block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keys {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
}

impl Keys {
    fn for_code(code: u64, rows: usize) -> Result<Self> {
        let capacity = reserved_capacity(rows);
        Ok(match code {
            0 => Keys::U8(Vec::with_capacity(capacity)),
            1 => Keys::U16(Vec::with_capacity(capacity)),
            2 => Keys::U32(Vec::with_capacity(capacity)),
            3 => Keys::U64(Vec::with_capacity(capacity)),
            other => {
                return Err(Error::Protocol(format!(
                    "Invalid LowCardinality key width code {}",
                    other
                )))
            }
        })
    }

    /// Narrowest keys able to index `dictionary_size` entries
    fn for_dictionary(dictionary_size: usize, keys: &[usize]) -> Self {
        if dictionary_size <= 1 << 8 {
            Keys::U8(keys.iter().map(|&k| k as u8).collect())
        } else if dictionary_size <= 1 << 16 {
            Keys::U16(keys.iter().map(|&k| k as u16).collect())
        } else if dictionary_size as u64 <= 1 << 32 {
            Keys::U32(keys.iter().map(|&k| k as u32).collect())
        } else {
            Keys::U64(keys.iter().map(|&k| k as u64).collect())
        }
    }

    fn code(&self) -> u64 {
        match self {
            Keys::U8(_) => 0,
            Keys::U16(_) => 1,
            Keys::U32(_) => 2,
            Keys::U64(_) => 3,
        }
    }

    /// Key width in bytes
    pub fn width(&self) -> usize {
        1 << self.code()
    }

    pub fn len(&self) -> usize {
        match self {
            Keys::U8(k) => k.len(),
            Keys::U16(k) => k.len(),
            Keys::U32(k) => k.len(),
            Keys::U64(k) => k.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<u64> {
        match self {
            Keys::U8(k) => k.get(index).map(|&v| v as u64),
            Keys::U16(k) => k.get(index).map(|&v| v as u64),
            Keys::U32(k) => k.get(index).map(|&v| v as u64),
            Keys::U64(k) => k.get(index).copied(),
        }
    }

    fn read(&mut self, limit: usize, buffer: &[u8]) -> usize {
        match self {
            Keys::U8(k) => read_elements(k, limit, buffer),
            Keys::U16(k) => read_elements(k, limit, buffer),
            Keys::U32(k) => read_elements(k, limit, buffer),
            Keys::U64(k) => read_elements(k, limit, buffer),
        }
    }

    fn write(&self, from: usize, output: &mut [u8]) -> usize {
        match self {
            Keys::U8(k) => write_elements(&k[from..], output),
            Keys::U16(k) => write_elements(&k[from..], output),
            Keys::U32(k) => write_elements(&k[from..], output),
            Keys::U64(k) => write_elements(&k[from..], output),
        }
    }
}

/// Column for LowCardinality(T): per-row keys into a dictionary column
pub struct LowCardinalityColumn {
    type_: Type,
    dictionary: ColumnRef,
    keys: Arc<Keys>,
    nullable: bool,
}

impl LowCardinalityColumn {
    pub fn new(type_: Type, dictionary: ColumnRef, keys: Keys) -> Self {
        let nullable = matches!(
            &type_,
            Type::LowCardinality { nested_type }
                if matches!(**nested_type, Type::Nullable { .. })
        );
        Self { type_, dictionary, keys: Arc::new(keys), nullable }
    }

    /// Get the dictionary column
    pub fn dictionary(&self) -> &ColumnRef {
        &self.dictionary
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    /// Dictionary index of the row
    pub fn key_at(&self, index: usize) -> Result<usize> {
        self.keys
            .get(index)
            .map(|k| k as usize)
            .ok_or_else(|| Error::out_of_bounds(index, self.keys.len()))
    }

    /// Apply the projection to the dictionary and index it per row
    pub fn reinterpret<T: Projection>(&self) -> Option<TypedColumnRef<T>> {
        let values = try_reinterpret::<T>(&self.dictionary)?;
        Some(Arc::new(DictionaryView {
            keys: Arc::clone(&self.keys),
            values,
            nullable: self.nullable,
        }))
    }
}

impl TableColumn for LowCardinalityColumn {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn row_count(&self) -> usize {
        self.keys.len()
    }

    fn is_null(&self, index: usize) -> bool {
        self.nullable && self.keys.get(index) == Some(0)
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        let key = self.key_at(index)?;
        if self.nullable && key == 0 {
            return Ok(Value::Null);
        }
        self.dictionary.get_value(key)
    }

    impl_column_any!();
}

struct DictionaryView<T> {
    keys: Arc<Keys>,
    values: TypedColumnRef<T>,
    nullable: bool,
}

impl<T: Projection> TypedColumn<T> for DictionaryView<T> {
    fn row_count(&self) -> usize {
        self.keys.len()
    }

    fn is_null(&self, index: usize) -> bool {
        self.nullable && self.keys.get(index) == Some(0)
    }

    fn get(&self, index: usize) -> Result<T> {
        let key = self
            .keys
            .get(index)
            .ok_or_else(|| Error::out_of_bounds(index, self.keys.len()))?;
        if self.nullable && key == 0 {
            if let Some(null) = T::null() {
                return Ok(null);
            }
        }
        self.values.get(key as usize)
    }
}

/// Type of the dictionary column: the nested type without Nullable
fn dictionary_type(type_: &Type) -> Result<&Type> {
    let Type::LowCardinality { nested_type } = type_ else {
        return Err(Error::Internal(format!("{} is not LowCardinality", type_)));
    };
    let base = match nested_type.as_ref() {
        Type::Nullable { nested_type } => nested_type.as_ref(),
        other => other,
    };
    match base {
        Type::Simple(_)
        | Type::FixedString { .. }
        | Type::DateTime { .. }
        | Type::DateTime64 { .. }
        | Type::Decimal { .. }
        | Type::Enum8 { .. }
        | Type::Enum16 { .. } => Ok(base),
        _ => Err(Error::TypeNotSupported(type_.name())),
    }
}

fn read_version(buffer: &[u8]) -> Result<Progress> {
    let Some(version) = try_read_u64_le(buffer) else {
        return Ok(Progress::none());
    };
    if version != SHARED_DICTIONARIES_WITH_ADDITIONAL_KEYS {
        return Err(Error::Protocol(format!(
            "Unsupported LowCardinality key serialization version {}",
            version
        )));
    }
    Ok(Progress::prefix_done(8))
}

/// Parsed block header: key width code and dictionary size
fn read_header(buffer: &[u8]) -> Result<Option<(u64, usize)>> {
    if buffer.len() < 16 {
        return Ok(None);
    }
    let (Some(serialization_type), Some(size)) =
        (try_read_u64_le(buffer), try_read_u64_le(&buffer[8..]))
    else {
        return Ok(None);
    };
    if serialization_type & NEED_GLOBAL_DICTIONARY != 0 {
        return Err(Error::Protocol(
            "LowCardinality global dictionaries are not supported".to_string(),
        ));
    }
    if serialization_type & HAS_ADDITIONAL_KEYS == 0 {
        return Err(Error::Protocol(
            "LowCardinality block without additional keys".to_string(),
        ));
    }
    let size = usize::try_from(size).map_err(|_| {
        Error::Protocol(format!(
            "LowCardinality dictionary size {} too large",
            size
        ))
    })?;
    let code = serialization_type & KEY_WIDTH_MASK;
    debug!(
        key_width_code = code,
        dictionary_size = size,
        "low cardinality header"
    );
    Ok(Some((code, size)))
}

fn check_row_count(buffer: &[u8], rows: usize) -> Result<bool> {
    let Some(count) = try_read_u64_le(buffer) else {
        return Ok(false);
    };
    if count != rows as u64 {
        return Err(Error::Protocol(format!(
            "LowCardinality block has {} keys, expected {}",
            count, rows
        )));
    }
    Ok(true)
}

enum ReadState {
    Header,
    Dictionary { reader: Box<dyn ColumnReader>, size: usize, done: usize },
    RowCount { dictionary: ColumnRef },
    Keys { dictionary: ColumnRef },
    Invalid,
}

/// Incremental reader for LowCardinality(T)
pub struct LowCardinalityReader {
    type_: Type,
    dictionary_type: Type,
    settings: CodecSettings,
    rows: usize,
    key_code: u64,
    keys: Option<Keys>,
    state: ReadState,
}

impl LowCardinalityReader {
    /// Advance one state; `None` when the buffer holds too little to do so
    fn step(&mut self, buffer: &[u8]) -> Result<Option<Progress>> {
        match std::mem::replace(&mut self.state, ReadState::Invalid) {
            ReadState::Header => {
                let Some((code, size)) = read_header(buffer)? else {
                    self.state = ReadState::Header;
                    return Ok(None);
                };
                let mut reader = create_dictionary_reader(
                    &self.dictionary_type,
                    size,
                    &self.settings,
                )?;
                if reader.read_prefix(&[])?.elements == 0 {
                    return Err(Error::TypeNotSupported(self.type_.name()));
                }
                self.key_code = code;
                self.state = ReadState::Dictionary { reader, size, done: 0 };
                Ok(Some(Progress::new(16, 0)))
            }
            ReadState::Dictionary { mut reader, size, mut done } => {
                let consumed =
                    drive_nested_reader(reader.as_mut(), size, &mut done, buffer)?;
                if done < size {
                    self.state = ReadState::Dictionary { reader, size, done };
                    return Ok((consumed > 0).then(|| Progress::new(consumed, 0)));
                }
                let dictionary = reader.end_read()?;
                self.state = ReadState::RowCount { dictionary };
                Ok(Some(Progress::new(consumed, 0)))
            }
            ReadState::RowCount { dictionary } => {
                if !check_row_count(buffer, self.rows)? {
                    self.state = ReadState::RowCount { dictionary };
                    return Ok(None);
                }
                self.keys = Some(Keys::for_code(self.key_code, self.rows)?);
                self.state = ReadState::Keys { dictionary };
                Ok(Some(Progress::new(8, 0)))
            }
            ReadState::Keys { dictionary } => {
                let size = dictionary.row_count();
                self.state = ReadState::Keys { dictionary };
                let Some(keys) = self.keys.as_mut() else {
                    return Err(Error::Internal("LowCardinality keys missing".into()));
                };
                let before = keys.len();
                let count = keys.read(self.rows, buffer);
                let bad = (before..keys.len())
                    .filter_map(|i| keys.get(i))
                    .find(|&k| k >= size as u64);
                if let Some(bad) = bad {
                    return Err(Error::Protocol(format!(
                        "LowCardinality key {} outside dictionary of {}",
                        bad, size
                    )));
                }
                Ok(Some(Progress::new(count * keys.width(), count)))
            }
            ReadState::Invalid => Err(Error::Internal(
                "LowCardinality reader reused after error".into(),
            )),
        }
    }
}

impl ColumnReader for LowCardinalityReader {
    fn read_prefix(&mut self, buffer: &[u8]) -> Result<Progress> {
        read_version(buffer)
    }

    fn read_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut progress = Progress::none();
        loop {
            let in_keys = matches!(self.state, ReadState::Keys { .. });
            match self.step(&buffer[progress.bytes..])? {
                Some(step) => {
                    progress += step;
                    if in_keys {
                        return Ok(progress);
                    }
                }
                None => return Ok(progress),
            }
        }
    }

    fn end_read(self: Box<Self>) -> Result<ColumnRef> {
        let this = *self;
        let dictionary = match this.state {
            ReadState::Keys { dictionary } => dictionary,
            _ if this.rows == 0 => {
                create_dictionary_reader(&this.dictionary_type, 0, &this.settings)?
                    .end_read()?
            }
            _ => return Err(incomplete_column(0, this.rows)),
        };
        let keys = this.keys.unwrap_or(Keys::U8(Vec::new()));
        if keys.len() != this.rows {
            return Err(incomplete_column(keys.len(), this.rows));
        }
        Ok(Arc::new(LowCardinalityColumn::new(this.type_, dictionary, keys)))
    }
}

enum SkipState {
    Header,
    Dictionary { skipper: Box<dyn ColumnSkipper>, size: usize, done: usize },
    RowCount,
    Keys { width: usize },
}

/// Skip reader for LowCardinality(T)
pub struct LowCardinalitySkipper {
    dictionary_type: Type,
    rows: usize,
    key_code: u64,
    skipped: usize,
    state: SkipState,
}

impl ColumnSkipper for LowCardinalitySkipper {
    fn skip_prefix(&mut self, buffer: &[u8]) -> Result<Progress> {
        read_version(buffer)
    }

    fn skip_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = 0;
        loop {
            match &mut self.state {
                SkipState::Header => {
                    let Some((code, size)) = read_header(&buffer[consumed..])? else {
                        return Ok(Progress::new(consumed, 0));
                    };
                    consumed += 16;
                    self.key_code = code;
                    let skipper =
                        create_dictionary_skipper(&self.dictionary_type, size)?;
                    self.state = SkipState::Dictionary { skipper, size, done: 0 };
                }
                SkipState::Dictionary { skipper, size, done } => {
                    consumed += drive_nested_skipper(
                        skipper.as_mut(),
                        *size,
                        done,
                        &buffer[consumed..],
                    )?;
                    if *done < *size {
                        return Ok(Progress::new(consumed, 0));
                    }
                    self.state = SkipState::RowCount;
                }
                SkipState::RowCount => {
                    if !check_row_count(&buffer[consumed..], self.rows)? {
                        return Ok(Progress::new(consumed, 0));
                    }
                    consumed += 8;
                    let width = Keys::for_code(self.key_code, 0)?.width();
                    self.state = SkipState::Keys { width };
                }
                SkipState::Keys { width } => {
                    let count = ((buffer.len() - consumed) / *width)
                        .min(self.rows - self.skipped);
                    self.skipped += count;
                    return Ok(Progress::new(consumed + count * *width, count));
                }
            }
        }
    }
}

enum WriteState {
    Header,
    Dictionary,
    RowCount,
    Keys { written: usize },
}

/// Writer for LowCardinality(T)
pub struct LowCardinalityWriter {
    rows: usize,
    dictionary_size: usize,
    dictionary: Box<dyn ColumnWriter>,
    dictionary_done: usize,
    keys: Keys,
    state: WriteState,
}

impl ColumnWriter for LowCardinalityWriter {
    fn write_prefix(&mut self, output: &mut [u8]) -> Result<Progress> {
        if !try_write_u64_le(output, SHARED_DICTIONARIES_WITH_ADDITIONAL_KEYS) {
            return Ok(Progress::none());
        }
        Ok(Progress::prefix_done(8))
    }

    fn write_next(&mut self, output: &mut [u8]) -> Result<Progress> {
        let mut written = 0;
        loop {
            match &mut self.state {
                WriteState::Header => {
                    if output.len() < 16 {
                        return Ok(Progress::none());
                    }
                    let serialization_type = self.keys.code() | HAS_ADDITIONAL_KEYS;
                    try_write_u64_le(output, serialization_type);
                    try_write_u64_le(&mut output[8..], self.dictionary_size as u64);
                    written += 16;
                    self.state = WriteState::Dictionary;
                }
                WriteState::Dictionary => {
                    written += drive_nested_writer(
                        self.dictionary.as_mut(),
                        self.dictionary_size,
                        &mut self.dictionary_done,
                        &mut output[written..],
                    )?;
                    if self.dictionary_done < self.dictionary_size {
                        return Ok(Progress::new(written, 0));
                    }
                    self.state = WriteState::RowCount;
                }
                WriteState::RowCount => {
                    if !try_write_u64_le(&mut output[written..], self.rows as u64) {
                        return Ok(Progress::new(written, 0));
                    }
                    written += 8;
                    self.state = WriteState::Keys { written: 0 };
                }
                WriteState::Keys { written: keys_written } => {
                    let count = self.keys.write(*keys_written, &mut output[written..]);
                    *keys_written += count;
                    return Ok(Progress::new(
                        written + count * self.keys.width(),
                        count,
                    ));
                }
            }
        }
    }
}

pub(crate) fn create_reader(
    type_: &Type,
    rows: usize,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnReader>> {
    Ok(Box::new(LowCardinalityReader {
        dictionary_type: dictionary_type(type_)?.clone(),
        type_: type_.clone(),
        settings: settings.clone(),
        rows,
        key_code: 0,
        keys: None,
        state: ReadState::Header,
    }))
}

pub(crate) fn create_skipper(
    type_: &Type,
    rows: usize,
) -> Result<Box<dyn ColumnSkipper>> {
    Ok(Box::new(LowCardinalitySkipper {
        dictionary_type: dictionary_type(type_)?.clone(),
        rows,
        key_code: 0,
        skipped: 0,
        state: SkipState::Header,
    }))
}

pub(crate) fn create_writer(
    type_: &Type,
    rows: Vec<Value>,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnWriter>> {
    let dictionary_type = dictionary_type(type_)?;
    let nullable = matches!(
        type_,
        Type::LowCardinality { nested_type }
            if matches!(**nested_type, Type::Nullable { .. })
    );

    let default = dictionary_type.default_value(settings);
    let mut dictionary = vec![default.clone()];
    let mut index: HashMap<ValueKey, usize> = HashMap::new();
    if !nullable {
        index.insert(ValueKey(default), 0);
    }

    let row_count = rows.len();
    let mut keys = Vec::with_capacity(row_count);
    for value in rows {
        if value.is_null() {
            if !nullable {
                return Err(Error::type_mismatch(type_.name(), "Null"));
            }
            keys.push(0);
            continue;
        }
        let next = dictionary.len();
        let key = *index.entry(ValueKey(value.clone())).or_insert_with(|| {
            dictionary.push(value);
            next
        });
        keys.push(key);
    }

    let keys = Keys::for_dictionary(dictionary.len(), &keys);
    debug!(
        dictionary_size = dictionary.len(),
        key_width = keys.width(),
        "low cardinality dictionary built"
    );
    let dictionary_size = dictionary.len();
    let dictionary = create_dictionary_writer(dictionary_type, dictionary, settings)?;
    Ok(Box::new(LowCardinalityWriter {
        rows: row_count,
        dictionary_size,
        dictionary,
        dictionary_done: 0,
        keys,
        state: WriteState::Header,
    }))
}
