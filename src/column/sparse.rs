//! Sparse serialization
//!
//! Columns dominated by their type's default value can be sent with only
//! the non-default rows:
//!
//! ```text
//! [base prefix]
//! [varint: defaults before value 0] ... [varint: defaults before value k-1]
//! [varint: trailing defaults | END_OF_GRANULE]
//! [k values: base codec]
//! ```
//!
//! The decoded [`SparseColumn`] keeps the non-default positions and values and
//! answers every other row from a one-row default column.

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
    io::{
        buffer_utils::{
            put_varint,
            try_read_varint,
        },
        column_stream::{
            create_reader as create_base_reader,
            create_skipper as create_base_skipper,
            create_writer as create_base_writer,
            drive_nested_reader,
            drive_nested_skipper,
            drive_nested_writer,
            materialize,
            ColumnReader,
            ColumnSkipper,
            ColumnWriter,
            PrefixProbe,
            Progress,
        },
    },
    settings::CodecSettings,
    types::Type,
    value::same_value,
    Error,
    Result,
    Value,
};
use std::sync::Arc;
use tracing::debug;

/// Marks the run length that closes the granule
pub const END_OF_GRANULE_FLAG: u64 = 1 << 62;

/// Column of `rows` rows where only `positions` hold non-default values
pub struct SparseColumn {
    type_: Type,
    rows: usize,
    positions: Arc<[usize]>,
    values: ColumnRef,
    default: ColumnRef,
}

impl SparseColumn {
    pub fn new(
        type_: Type,
        rows: usize,
        positions: Arc<[usize]>,
        values: ColumnRef,
        default: ColumnRef,
    ) -> Self {
        Self { type_, rows, positions, values, default }
    }

    /// Rows holding a non-default value, ascending
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// The non-default values in row order
    pub fn values(&self) -> &ColumnRef {
        &self.values
    }

    fn locate(&self, index: usize) -> Option<usize> {
        self.positions.binary_search(&index).ok()
    }

    /// Apply the projection to the values and the default, repeating the
    /// default for every other row
    pub fn reinterpret<T: Projection>(&self) -> Option<TypedColumnRef<T>> {
        let values = try_reinterpret::<T>(&self.values)?;
        let default = try_reinterpret::<T>(&self.default)?;
        Some(Arc::new(SparseView {
            rows: self.rows,
            positions: Arc::clone(&self.positions),
            values,
            default,
        }))
    }
}

impl TableColumn for SparseColumn {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn row_count(&self) -> usize {
        self.rows
    }

    fn is_null(&self, index: usize) -> bool {
        if index >= self.rows {
            return false;
        }
        match self.locate(index) {
            Some(k) => self.values.is_null(k),
            None => self.default.is_null(0),
        }
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        if index >= self.rows {
            return Err(Error::out_of_bounds(index, self.rows));
        }
        match self.locate(index) {
            Some(k) => self.values.get_value(k),
            None => self.default.get_value(0),
        }
    }

    impl_column_any!();
}

struct SparseView<T> {
    rows: usize,
    positions: Arc<[usize]>,
    values: TypedColumnRef<T>,
    default: TypedColumnRef<T>,
}

impl<T: Projection> TypedColumn<T> for SparseView<T> {
    fn row_count(&self) -> usize {
        self.rows
    }

    fn is_null(&self, index: usize) -> bool {
        if index >= self.rows {
            return false;
        }
        match self.positions.binary_search(&index) {
            Ok(k) => self.values.is_null(k),
            Err(_) => self.default.is_null(0),
        }
    }

    fn get(&self, index: usize) -> Result<T> {
        if index >= self.rows {
            return Err(Error::out_of_bounds(index, self.rows));
        }
        match self.positions.binary_search(&index) {
            Ok(k) => self.values.get(k),
            Err(_) => self.default.get(0),
        }
    }
}

/// Run-length stream shared by the reader and the skipper
struct Offsets {
    rows: usize,
    positions: Vec<usize>,
    next_row: usize,
    complete: bool,
}

impl Offsets {
    fn new(rows: usize) -> Self {
        Self { rows, positions: Vec::new(), next_row: 0, complete: false }
    }

    fn read(&mut self, buffer: &[u8]) -> Result<usize> {
        let mut consumed = 0;
        while !self.complete {
            let Some((value, len)) = try_read_varint(&buffer[consumed..])? else {
                break;
            };
            consumed += len;
            let end = value & END_OF_GRANULE_FLAG != 0;
            let run = value & !END_OF_GRANULE_FLAG;
            let row = usize::try_from(run)
                .ok()
                .and_then(|run| self.next_row.checked_add(run))
                .filter(|&row| row <= self.rows)
                .ok_or_else(|| {
                    Error::Protocol(format!(
                        "Sparse run of {} defaults after row {} exceeds {} rows",
                        run, self.next_row, self.rows
                    ))
                })?;
            if end {
                if row != self.rows {
                    return Err(Error::Protocol(format!(
                        "Sparse granule ends at row {}, expected {}",
                        row, self.rows
                    )));
                }
                self.next_row = row;
                self.complete = true;
                debug!(
                    rows = self.rows,
                    non_default = self.positions.len(),
                    "sparse offsets read"
                );
            } else {
                if row == self.rows {
                    return Err(Error::Protocol(format!(
                        "Sparse value position {} outside {} rows",
                        row, self.rows
                    )));
                }
                self.positions.push(row);
                self.next_row = row + 1;
            }
        }
        Ok(consumed)
    }

    /// Rows fully known once `values` non-default values are available
    fn rows_within(&self, values: usize) -> usize {
        self.positions.get(values).copied().unwrap_or(self.rows)
    }
}

/// Incremental reader for sparse-serialized columns
pub struct SparseReader {
    type_: Type,
    settings: CodecSettings,
    probe: PrefixProbe,
    offsets: Offsets,
    values: Option<Box<dyn ColumnReader>>,
    values_done: usize,
    rows_done: usize,
}

impl SparseReader {
    fn start_values(&mut self) -> Result<()> {
        let mut reader = create_base_reader(
            &self.type_,
            self.offsets.positions.len(),
            &self.settings,
        )?;
        self.probe.replay_reader(reader.as_mut())?;
        self.values = Some(reader);
        Ok(())
    }
}

impl ColumnReader for SparseReader {
    fn read_prefix(&mut self, buffer: &[u8]) -> Result<Progress> {
        self.probe.feed(buffer)
    }

    fn read_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = self.offsets.read(buffer)?;
        if !self.offsets.complete {
            return Ok(Progress::new(consumed, 0));
        }
        if self.values.is_none() {
            self.start_values()?;
        }
        if let Some(values) = self.values.as_mut() {
            consumed += drive_nested_reader(
                values.as_mut(),
                self.offsets.positions.len(),
                &mut self.values_done,
                &buffer[consumed..],
            )?;
        }
        let rows = self.offsets.rows_within(self.values_done);
        let completed = rows - self.rows_done;
        self.rows_done = rows;
        Ok(Progress::new(consumed, completed))
    }

    fn end_read(self: Box<Self>) -> Result<ColumnRef> {
        let mut this = *self;
        if this.rows_done != this.offsets.rows {
            return Err(incomplete_column(this.rows_done, this.offsets.rows));
        }
        if this.values.is_none() {
            this.start_values()?;
        }
        let values = match this.values {
            Some(reader) => reader.end_read()?,
            None => return Err(Error::Internal("Sparse value reader missing".into())),
        };
        let default = materialize(
            &this.type_,
            vec![this.type_.default_value(&this.settings)],
            &this.settings,
        )?;
        Ok(Arc::new(SparseColumn::new(
            this.type_,
            this.offsets.rows,
            Arc::from(this.offsets.positions),
            values,
            default,
        )))
    }
}

/// Skip reader for sparse-serialized columns
pub struct SparseSkipper {
    type_: Type,
    probe: PrefixProbe,
    offsets: Offsets,
    values: Option<Box<dyn ColumnSkipper>>,
    values_done: usize,
    rows_done: usize,
}

impl ColumnSkipper for SparseSkipper {
    fn skip_prefix(&mut self, buffer: &[u8]) -> Result<Progress> {
        self.probe.feed(buffer)
    }

    fn skip_next(&mut self, buffer: &[u8]) -> Result<Progress> {
        let mut consumed = self.offsets.read(buffer)?;
        if !self.offsets.complete {
            return Ok(Progress::new(consumed, 0));
        }
        if self.values.is_none() {
            let mut skipper =
                create_base_skipper(&self.type_, self.offsets.positions.len())?;
            self.probe.replay_skipper(skipper.as_mut())?;
            self.values = Some(skipper);
        }
        if let Some(values) = self.values.as_mut() {
            consumed += drive_nested_skipper(
                values.as_mut(),
                self.offsets.positions.len(),
                &mut self.values_done,
                &buffer[consumed..],
            )?;
        }
        let rows = self.offsets.rows_within(self.values_done);
        let completed = rows - self.rows_done;
        self.rows_done = rows;
        Ok(Progress::new(consumed, completed))
    }
}

/// Writer emitting run lengths of default rows, then the other values
pub struct SparseWriter {
    rows: usize,
    runs: Vec<u64>,
    runs_written: usize,
    positions: Vec<usize>,
    values: Box<dyn ColumnWriter>,
    values_done: usize,
    rows_done: usize,
}

impl ColumnWriter for SparseWriter {
    fn write_prefix(&mut self, output: &mut [u8]) -> Result<Progress> {
        self.values.write_prefix(output)
    }

    fn write_next(&mut self, output: &mut [u8]) -> Result<Progress> {
        let mut written = 0;
        while let Some(&run) = self.runs.get(self.runs_written) {
            match put_varint(&mut output[written..], run) {
                Some(len) => written += len,
                None => return Ok(Progress::new(written, 0)),
            }
            self.runs_written += 1;
        }
        written += drive_nested_writer(
            self.values.as_mut(),
            self.positions.len(),
            &mut self.values_done,
            &mut output[written..],
        )?;
        let rows = self.positions.get(self.values_done).copied().unwrap_or(self.rows);
        let completed = rows - self.rows_done;
        self.rows_done = rows;
        Ok(Progress::new(written, completed))
    }
}

fn check_base(type_: &Type) -> Result<()> {
    if matches!(type_, Type::LowCardinality { .. }) {
        return Err(Error::TypeNotSupported(format!(
            "sparse serialization of {}",
            type_
        )));
    }
    Ok(())
}

pub(crate) fn create_reader(
    type_: &Type,
    rows: usize,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnReader>> {
    check_base(type_)?;
    Ok(Box::new(SparseReader {
        type_: type_.clone(),
        settings: settings.clone(),
        probe: PrefixProbe::new(type_)?,
        offsets: Offsets::new(rows),
        values: None,
        values_done: 0,
        rows_done: 0,
    }))
}

pub(crate) fn create_skipper(
    type_: &Type,
    rows: usize,
) -> Result<Box<dyn ColumnSkipper>> {
    check_base(type_)?;
    Ok(Box::new(SparseSkipper {
        type_: type_.clone(),
        probe: PrefixProbe::new(type_)?,
        offsets: Offsets::new(rows),
        values: None,
        values_done: 0,
        rows_done: 0,
    }))
}

pub(crate) fn create_writer(
    type_: &Type,
    rows: Vec<Value>,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnWriter>> {
    check_base(type_)?;
    let default = type_.default_value(settings);
    let row_count = rows.len();
    let mut runs = Vec::new();
    let mut positions = Vec::new();
    let mut values = Vec::new();
    let mut run = 0u64;
    for (row, value) in rows.into_iter().enumerate() {
        if same_value(&value, &default) {
            run += 1;
            continue;
        }
        runs.push(run);
        run = 0;
        positions.push(row);
        values.push(value);
    }
    if row_count > 0 {
        runs.push(run | END_OF_GRANULE_FLAG);
    }
    let values = create_base_writer(type_, values, settings)?;
    Ok(Box::new(SparseWriter {
        rows: row_count,
        runs,
        runs_written: 0,
        positions,
        values,
        values_done: 0,
        rows_done: 0,
    }))
}
