//! Variant column implementation
//!
//! **ClickHouse Documentation:** <https://clickhouse.com/docs/en/sql-reference/data-types/variant>
//!
//! ## Wire Format
//!
//! ```text
//! prefix: [mode: UInt64 = 0] [prefix of each alternative]
//! body:   [discriminant: UInt8 * rows]   // 0xFF = NULL
//!         [rows of alternative 0] ... [rows of alternative N-1]
//! ```
//!
//! Each alternative stream holds only the rows whose discriminant selects it,
//! in row order. Discriminants index the alternatives in declared order.

use super::{
    impl_column_any,
    numeric::incomplete_column,
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
            create_reader as create_alternative_reader,
            create_skipper as create_alternative_skipper,
            create_writer as create_alternative_writer,
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

/// Discriminant of a row holding no value
pub const NULL_DISCRIMINANT: u8 = 0xFF;

const BASIC_MODE: u64 = 0;
const COMPACT_MODE: u64 = 1;

/// Column for Variant(T...): per-row discriminants over one column per
/// alternative
pub struct VariantColumn {
    type_: Type,
    discriminants: Arc<[u8]>,
    /// Row position within its alternative's column
    local: Arc<[usize]>,
    alternatives: Vec<ColumnRef>,
}

impl VariantColumn {
    pub fn discriminant(&self, index: usize) -> Option<u8> {
        self.discriminants.get(index).copied()
    }

    /// Column of the rows that chose alternative `index`
    pub fn alternative(&self, index: usize) -> Option<&ColumnRef> {
        self.alternatives.get(index)
    }
}

impl TableColumn for VariantColumn {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn row_count(&self) -> usize {
        self.discriminants.len()
    }

    fn is_null(&self, index: usize) -> bool {
        match self.discriminant(index) {
            Some(NULL_DISCRIMINANT) => true,
            Some(d) => self.alternatives[d as usize].is_null(self.local[index]),
            None => false,
        }
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        let d = self
            .discriminant(index)
            .ok_or_else(|| Error::out_of_bounds(index, self.discriminants.len()))?;
        if d == NULL_DISCRIMINANT {
            return Ok(Value::Null);
        }
        self.alternatives[d as usize].get_value(self.local[index])
    }

    impl_column_any!();
}

fn alternatives(type_: &Type) -> Result<&[Type]> {
    match type_ {
        Type::Variant { variants } => Ok(variants.as_slice()),
        _ => Err(Error::Internal(format!("{} is not a Variant", type_))),
    }
}

fn read_mode(type_: &Type, buffer: &[u8]) -> Result<bool> {
    let Some(mode) = try_read_u64_le(buffer) else {
        return Ok(false);
    };
    match mode {
        BASIC_MODE => Ok(true),
        COMPACT_MODE => Err(Error::TypeNotSupported(format!(
            "compact discriminators of {}",
            type_
        ))),
        other => Err(Error::Protocol(format!(
            "Unknown Variant discriminators mode {}",
            other
        ))),
    }
}

/// Discriminant stream shared by the reader and the skipper
struct Discriminants {
    rows: usize,
    alternatives: usize,
    values: Vec<u8>,
    local: Vec<usize>,
    counts: Vec<usize>,
}

impl Discriminants {
    fn new(rows: usize, alternatives: usize) -> Self {
        Self {
            rows,
            alternatives,
            values: Vec::with_capacity(reserved_capacity(rows)),
            local: Vec::with_capacity(reserved_capacity(rows)),
            counts: vec![0; alternatives],
        }
    }

    fn is_complete(&self) -> bool {
        self.values.len() == self.rows
    }

    fn read(&mut self, buffer: &[u8]) -> Result<usize> {
        let count = buffer.len().min(self.rows - self.values.len());
        for &d in &buffer[..count] {
            if d == NULL_DISCRIMINANT {
                self.local.push(0);
            } else {
                let slot = self.counts.get_mut(d as usize).ok_or_else(|| {
                    Error::Protocol(format!(
                        "Variant discriminant {} with {} alternatives",
                        d, self.alternatives
                    ))
                })?;
                self.local.push(*slot);
                *slot += 1;
            }
            self.values.push(d);
        }
        if count > 0 && self.is_complete() {
            debug!(rows = self.rows, counts = ?self.counts, "variant discriminants read");
        }
        Ok(count)
    }
}

/// Incremental reader for Variant(T...)
pub struct VariantReader {
    type_: Type,
    types: Vec<Type>,
    settings: CodecSettings,
    mode_read: bool,
    probes: Vec<PrefixProbe>,
    discriminants: Discriminants,
    readers: Vec<Box<dyn ColumnReader>>,
    current: usize,
    current_done: usize,
    rows_done: usize,
}

impl VariantReader {
    fn start_alternatives(&mut self) -> Result<()> {
        for ((type_, probe), &count) in
            self.types.iter().zip(&self.probes).zip(&self.discriminants.counts)
        {
            let mut reader = create_alternative_reader(type_, count, &self.settings)?;
            probe.replay_reader(reader.as_mut())?;
            self.readers.push(reader);
        }
        Ok(())
    }
}

/// Feed the alternatives' prefixes to their probes in order
fn feed_probes(probes: &mut [PrefixProbe], buffer: &[u8]) -> Result<Progress> {
    let mut consumed = 0;
    for probe in probes.iter_mut().filter(|p| !p.is_done()) {
        let progress = probe.feed(&buffer[consumed..])?;
        consumed += progress.bytes;
        if progress.elements == 0 {
            return Ok(Progress::new(consumed, 0));
        }
    }
    Ok(Progress::prefix_done(consumed))
}

impl ColumnReader for VariantReader {
    fn read_prefix(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = 0;
        if !self.mode_read {
            if !read_mode(&self.type_, buffer)? {
                return Ok(Progress::none());
            }
            self.mode_read = true;
            consumed = 8;
        }
        let progress = feed_probes(&mut self.probes, &buffer[consumed..])?;
        Ok(Progress::new(consumed + progress.bytes, progress.elements))
    }

    fn read_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = self.discriminants.read(buffer)?;
        if !self.discriminants.is_complete() {
            return Ok(Progress::new(consumed, 0));
        }
        if self.readers.is_empty() {
            self.start_alternatives()?;
        }
        while let Some(reader) = self.readers.get_mut(self.current) {
            let count = self.discriminants.counts[self.current];
            consumed += drive_nested_reader(
                reader.as_mut(),
                count,
                &mut self.current_done,
                &buffer[consumed..],
            )?;
            if self.current_done < count {
                return Ok(Progress::new(consumed, 0));
            }
            self.current += 1;
            self.current_done = 0;
        }
        let completed = self.discriminants.rows - self.rows_done;
        self.rows_done = self.discriminants.rows;
        Ok(Progress::new(consumed, completed))
    }

    fn end_read(self: Box<Self>) -> Result<ColumnRef> {
        let mut this = *self;
        if this.rows_done != this.discriminants.rows {
            return Err(incomplete_column(this.rows_done, this.discriminants.rows));
        }
        if this.readers.is_empty() {
            this.start_alternatives()?;
        }
        let alternatives = this
            .readers
            .into_iter()
            .map(|reader| reader.end_read())
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(VariantColumn {
            type_: this.type_,
            discriminants: Arc::from(this.discriminants.values),
            local: Arc::from(this.discriminants.local),
            alternatives,
        }))
    }
}

/// Skip reader for Variant(T...)
pub struct VariantSkipper {
    type_: Type,
    types: Vec<Type>,
    mode_read: bool,
    probes: Vec<PrefixProbe>,
    discriminants: Discriminants,
    skippers: Vec<Box<dyn ColumnSkipper>>,
    current: usize,
    current_done: usize,
    rows_done: usize,
}

impl ColumnSkipper for VariantSkipper {
    fn skip_prefix(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = 0;
        if !self.mode_read {
            if !read_mode(&self.type_, buffer)? {
                return Ok(Progress::none());
            }
            self.mode_read = true;
            consumed = 8;
        }
        let progress = feed_probes(&mut self.probes, &buffer[consumed..])?;
        Ok(Progress::new(consumed + progress.bytes, progress.elements))
    }

    fn skip_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = self.discriminants.read(buffer)?;
        if !self.discriminants.is_complete() {
            return Ok(Progress::new(consumed, 0));
        }
        if self.skippers.is_empty() {
            for ((type_, probe), &count) in
                self.types.iter().zip(&self.probes).zip(&self.discriminants.counts)
            {
                let mut skipper = create_alternative_skipper(type_, count)?;
                probe.replay_skipper(skipper.as_mut())?;
                self.skippers.push(skipper);
            }
        }
        while let Some(skipper) = self.skippers.get_mut(self.current) {
            let count = self.discriminants.counts[self.current];
            consumed += drive_nested_skipper(
                skipper.as_mut(),
                count,
                &mut self.current_done,
                &buffer[consumed..],
            )?;
            if self.current_done < count {
                return Ok(Progress::new(consumed, 0));
            }
            self.current += 1;
            self.current_done = 0;
        }
        let completed = self.discriminants.rows - self.rows_done;
        self.rows_done = self.discriminants.rows;
        Ok(Progress::new(consumed, completed))
    }
}

/// Writer for Variant(T...)
pub struct VariantWriter {
    mode_written: bool,
    prefix_index: usize,
    discriminants: Vec<u8>,
    discriminants_written: usize,
    counts: Vec<usize>,
    writers: Vec<Box<dyn ColumnWriter>>,
    current: usize,
    current_done: usize,
    rows_done: usize,
}

impl ColumnWriter for VariantWriter {
    fn write_prefix(&mut self, output: &mut [u8]) -> Result<Progress> {
        let mut written = 0;
        if !self.mode_written {
            if !try_write_u64_le(output, BASIC_MODE) {
                return Ok(Progress::none());
            }
            self.mode_written = true;
            written = 8;
        }
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
        let remaining = self.discriminants.len() - self.discriminants_written;
        let mut written = output.len().min(remaining);
        output[..written].copy_from_slice(
            &self.discriminants
                [self.discriminants_written..self.discriminants_written + written],
        );
        self.discriminants_written += written;
        if self.discriminants_written < self.discriminants.len() {
            return Ok(Progress::new(written, 0));
        }
        while let Some(writer) = self.writers.get_mut(self.current) {
            let count = self.counts[self.current];
            written += drive_nested_writer(
                writer.as_mut(),
                count,
                &mut self.current_done,
                &mut output[written..],
            )?;
            if self.current_done < count {
                return Ok(Progress::new(written, 0));
            }
            self.current += 1;
            self.current_done = 0;
        }
        // Every row is complete once the last alternative is written
        let completed = self.discriminants.len() - self.rows_done;
        self.rows_done = self.discriminants.len();
        Ok(Progress::new(written, completed))
    }
}

pub(crate) fn create_reader(
    type_: &Type,
    rows: usize,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnReader>> {
    let types = alternatives(type_)?.to_vec();
    let probes = types.iter().map(PrefixProbe::new).collect::<Result<Vec<_>>>()?;
    Ok(Box::new(VariantReader {
        type_: type_.clone(),
        discriminants: Discriminants::new(rows, types.len()),
        types,
        settings: settings.clone(),
        mode_read: false,
        probes,
        readers: Vec::new(),
        current: 0,
        current_done: 0,
        rows_done: 0,
    }))
}

pub(crate) fn create_skipper(
    type_: &Type,
    rows: usize,
) -> Result<Box<dyn ColumnSkipper>> {
    let types = alternatives(type_)?.to_vec();
    let probes = types.iter().map(PrefixProbe::new).collect::<Result<Vec<_>>>()?;
    Ok(Box::new(VariantSkipper {
        type_: type_.clone(),
        discriminants: Discriminants::new(rows, types.len()),
        types,
        mode_read: false,
        probes,
        skippers: Vec::new(),
        current: 0,
        current_done: 0,
        rows_done: 0,
    }))
}

pub(crate) fn create_writer(
    type_: &Type,
    rows: Vec<Value>,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnWriter>> {
    let types = alternatives(type_)?;
    let mut discriminants = Vec::with_capacity(rows.len());
    let mut columns: Vec<Vec<Value>> = types.iter().map(|_| Vec::new()).collect();
    for value in rows {
        if value.is_null() {
            discriminants.push(NULL_DISCRIMINANT);
            continue;
        }
        let Some(index) = types.iter().position(|t| t.accepts(&value)) else {
            let allowed: Vec<String> = types.iter().map(Type::name).collect();
            return Err(Error::TypeNotSupported(format!(
                "{} value for Variant alternatives {}",
                value.kind_name(),
                allowed.join(", ")
            )));
        };
        discriminants.push(index as u8);
        columns[index].push(value);
    }
    let counts = columns.iter().map(Vec::len).collect();
    let writers = types
        .iter()
        .zip(columns)
        .map(|(t, values)| create_alternative_writer(t, values, settings))
        .collect::<Result<Vec<_>>>()?;
    Ok(Box::new(VariantWriter {
        mode_written: false,
        prefix_index: 0,
        discriminants,
        discriminants_written: 0,
        counts,
        writers,
        current: 0,
        current_done: 0,
        rows_done: 0,
    }))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::io::column_stream::{
        read_column,
        skip_column,
        write_column,
    };

    fn int_or_string() -> Type {
        Type::variant(vec![Type::int32(), Type::string()])
    }

    #[test]
    fn test_wire_layout() {
        let settings = CodecSettings::default();
        let rows = vec![Value::Int32(42), Value::from("x"), Value::Null];
        let writer = create_writer(&int_or_string(), rows, &settings).unwrap();
        let bytes = write_column(writer, 3, 64).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&0u64.to_le_bytes());
        expected.extend_from_slice(&[0, 1, NULL_DISCRIMINANT]);
        expected.extend_from_slice(&42i32.to_le_bytes());
        expected.extend_from_slice(b"\x01x");
        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn test_roundtrip_with_prefixed_alternative() {
        let type_ = Type::variant(vec![
            Type::low_cardinality(Type::string()),
            Type::array(Type::uint8()),
        ]);
        let settings = CodecSettings::default();
        let rows = vec![
            Value::Array(vec![Value::UInt8(1)]),
            Value::from("a"),
            Value::Null,
            Value::from("a"),
        ];
        let writer = create_writer(&type_, rows.clone(), &settings).unwrap();
        let bytes = write_column(writer, 4, 4).unwrap();

        let reader = create_reader(&type_, 4, &settings).unwrap();
        let column = read_column(reader, 4, &bytes, 1).unwrap().column;
        let values: Vec<Value> =
            (0..4).map(|i| column.get_value(i).unwrap()).collect();
        assert_eq!(values, rows);
        assert!(column.is_null(2));

        let skipper = create_skipper(&type_, 4).unwrap();
        assert_eq!(skip_column(skipper, 4, &bytes, 3).unwrap(), bytes.len());
    }

    #[test]
    fn test_unmatched_value_names_alternatives() {
        let result = create_writer(
            &int_or_string(),
            vec![Value::Float64(1.5)],
            &CodecSettings::default(),
        );
        match result {
            Err(Error::TypeNotSupported(message)) => {
                assert!(message.contains("Int32, String"))
            }
            _ => panic!("expected TypeNotSupported"),
        }
    }

    #[test]
    fn test_compact_mode_and_bad_discriminant() {
        let settings = CodecSettings::default();
        let mut reader = create_reader(&int_or_string(), 1, &settings).unwrap();
        assert!(matches!(
            reader.read_prefix(&1u64.to_le_bytes()),
            Err(Error::TypeNotSupported(_))
        ));

        let mut reader = create_reader(&int_or_string(), 1, &settings).unwrap();
        assert_eq!(
            reader.read_prefix(&0u64.to_le_bytes()).unwrap(),
            Progress::prefix_done(8)
        );
        assert!(matches!(reader.read_next(&[2]), Err(Error::Protocol(_))));
    }
}
