//! Date, Date32, DateTime and DateTime64 columns
//!
//! - Date: UInt16 days since 1970-01-01 (1970-01-01..2149-06-06)
//! - Date32: Int32 days since 1970-01-01 (1900-01-01..2299-12-31)
//! - DateTime: UInt32 seconds since the epoch
//! - DateTime64(p): Int64 ticks of 10^-p seconds, p <= 9
//!
//! Time values are instants; the column's zone (its type argument, else
//! [`CodecSettings::time_zone`]) only matters when turning wall-clock input
//! into instants and when rendering literals.

use super::{
    downcast_column,
    impl_column_any,
    numeric::{
        FixedReader,
        FixedWriter,
    },
    projection::{
        Projection,
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
    settings::CodecSettings,
    types::{
        Type,
        TypeCode,
    },
    Error,
    Result,
    Value,
};
use chrono::{
    DateTime,
    Datelike,
    LocalResult,
    NaiveDate,
    TimeZone,
    Utc,
};
use chrono_tz::Tz;
use std::sync::Arc;

/// `num_days_from_ce` of 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;
const NANOS_PER_SECOND: i64 = 1_000_000_000;

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

fn date_range(type_: &Type) -> (NaiveDate, NaiveDate) {
    match type_ {
        Type::Simple(TypeCode::Date32) => (ymd(1900, 1, 1), ymd(2299, 12, 31)),
        _ => (ymd(1970, 1, 1), ymd(2149, 6, 6)),
    }
}

/// Instant range DateTime64 accepts
fn datetime64_range() -> (i64, i64) {
    let min = ymd(1900, 1, 1).and_hms_opt(0, 0, 0).unwrap_or_default();
    let max = ymd(2299, 12, 31).and_hms_opt(23, 59, 59).unwrap_or_default();
    (min.and_utc().timestamp(), max.and_utc().timestamp())
}

fn days_to_date(days: i32) -> Result<NaiveDate> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| Error::Overflow(format!("{} days since epoch", days)))
}

fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

fn pow10(exponent: u32) -> i64 {
    10i64.pow(exponent)
}

/// Column for Date and Date32
pub struct DateColumn {
    type_: Type,
    days: Vec<i32>,
}

impl DateColumn {
    pub fn new(type_: Type, days: Vec<i32>) -> Self {
        Self { type_, days }
    }

    /// Days since 1970-01-01
    pub fn days(&self) -> &[i32] {
        &self.days
    }
}

impl TableColumn for DateColumn {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn row_count(&self) -> usize {
        self.days.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        TypedColumn::get(self, index).map(Value::Date)
    }

    impl_column_any!();
}

impl TypedColumn<NaiveDate> for DateColumn {
    fn row_count(&self) -> usize {
        self.days.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get(&self, index: usize) -> Result<NaiveDate> {
        let days = self
            .days
            .get(index)
            .ok_or_else(|| Error::out_of_bounds(index, self.days.len()))?;
        days_to_date(*days)
    }
}

impl Projection for NaiveDate {
    fn project(column: &ColumnRef) -> Option<TypedColumnRef<Self>> {
        downcast_column::<DateColumn>(column)
            .map(|c| c as TypedColumnRef<NaiveDate>)
    }
}

/// Column for DateTime and DateTime64; rows are ticks of 10^-precision
/// seconds (precision 0 for DateTime)
pub struct DateTimeColumn {
    type_: Type,
    tz: Tz,
    precision: u32,
    ticks: Vec<i64>,
}

impl DateTimeColumn {
    pub fn new(type_: Type, tz: Tz, precision: u32, ticks: Vec<i64>) -> Self {
        Self { type_, tz, precision, ticks }
    }

    pub fn ticks(&self) -> &[i64] {
        &self.ticks
    }

    pub fn time_zone(&self) -> Tz {
        self.tz
    }
}

impl TableColumn for DateTimeColumn {
    fn column_type(&self) -> &Type {
        &self.type_
    }

    fn row_count(&self) -> usize {
        self.ticks.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        TypedColumn::get(self, index).map(Value::DateTime)
    }

    impl_column_any!();
}

impl TypedColumn<DateTime<Tz>> for DateTimeColumn {
    fn row_count(&self) -> usize {
        self.ticks.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get(&self, index: usize) -> Result<DateTime<Tz>> {
        let ticks = *self
            .ticks
            .get(index)
            .ok_or_else(|| Error::out_of_bounds(index, self.ticks.len()))?;
        let per_second = pow10(self.precision);
        let secs = ticks.div_euclid(per_second);
        let nanos = ticks.rem_euclid(per_second) * pow10(9 - self.precision);
        match Utc.timestamp_opt(secs, nanos as u32) {
            LocalResult::Single(instant) => Ok(instant.with_timezone(&self.tz)),
            _ => Err(Error::Overflow(format!(
                "{} ticks at precision {}",
                ticks, self.precision
            ))),
        }
    }
}

impl Projection for DateTime<Tz> {
    fn project(column: &ColumnRef) -> Option<TypedColumnRef<Self>> {
        downcast_column::<DateTimeColumn>(column)
            .map(|c| c as TypedColumnRef<DateTime<Tz>>)
    }
}

/// Convert a row value to a calendar date for a Date/Date32 column
pub(crate) fn date_from_value(type_: &Type, value: Value) -> Result<NaiveDate> {
    let date = match value {
        Value::Date(date) => date,
        Value::DateTime(instant) => instant.date_naive(),
        Value::NaiveDateTime(wall) => wall.date(),
        other => {
            return Err(Error::type_mismatch(type_.name(), other.kind_name()))
        }
    };
    let (min, max) = date_range(type_);
    if date < min || date > max {
        return Err(Error::Overflow(format!(
            "{} outside the {} range {}..{}",
            date,
            type_.name(),
            min,
            max
        )));
    }
    Ok(date)
}

/// Convert a row value to an instant, reading wall-clock input in `tz`
fn instant_from_value(
    type_: &Type,
    tz: Tz,
    value: Value,
) -> Result<DateTime<Tz>> {
    let wall = match value {
        Value::DateTime(instant) => return Ok(instant.with_timezone(&tz)),
        Value::NaiveDateTime(wall) => wall,
        Value::Date(date) => date.and_hms_opt(0, 0, 0).unwrap_or_default(),
        other => match other.as_i64() {
            Some(secs) => {
                return Utc
                    .timestamp_opt(secs, 0)
                    .single()
                    .map(|instant| instant.with_timezone(&tz))
                    .ok_or_else(|| {
                        Error::Overflow(format!("{} seconds", secs))
                    })
            }
            None => {
                return Err(Error::type_mismatch(
                    type_.name(),
                    other.kind_name(),
                ))
            }
        },
    };
    tz.from_local_datetime(&wall).earliest().ok_or_else(|| {
        Error::InvalidArgument(format!(
            "{} does not exist in time zone {}",
            wall,
            tz.name()
        ))
    })
}

fn datetime_seconds(type_: &Type, instant: &DateTime<Tz>) -> Result<u32> {
    u32::try_from(instant.timestamp()).map_err(|_| {
        Error::Overflow(format!("{} outside the {} range", instant, type_.name()))
    })
}

fn datetime64_ticks(
    type_: &Type,
    precision: u32,
    instant: &DateTime<Tz>,
) -> Result<i64> {
    let overflow =
        || Error::Overflow(format!("{} outside the {} range", instant, type_.name()));
    let secs = instant.timestamp();
    let (min, max) = datetime64_range();
    if secs < min || secs > max {
        return Err(overflow());
    }
    let fraction = i64::from(instant.timestamp_subsec_nanos())
        / pow10(9 - precision);
    secs.checked_mul(pow10(precision))
        .and_then(|t| t.checked_add(fraction))
        .ok_or_else(overflow)
}

pub(crate) fn create_date_reader(
    type_: &Type,
    rows: usize,
) -> Result<Box<dyn ColumnReader>> {
    let type_ = type_.clone();
    match type_ {
        Type::Simple(TypeCode::Date) => {
            Ok(Box::new(FixedReader::<u16>::new(rows, move |data| {
                let days = data.into_iter().map(i32::from).collect();
                Arc::new(DateColumn::new(type_, days)) as ColumnRef
            })))
        }
        Type::Simple(TypeCode::Date32) => {
            Ok(Box::new(FixedReader::<i32>::new(rows, move |days| {
                Arc::new(DateColumn::new(type_, days)) as ColumnRef
            })))
        }
        _ => Err(Error::Internal(format!("{} is not a date type", type_))),
    }
}

pub(crate) fn create_date_writer(
    type_: &Type,
    rows: Vec<Value>,
) -> Result<Box<dyn ColumnWriter>> {
    let days = rows
        .into_iter()
        .map(|value| date_from_value(type_, value).map(date_to_days))
        .collect::<Result<Vec<i32>>>()?;
    match type_ {
        // The range check keeps Date days within u16
        Type::Simple(TypeCode::Date) => Ok(Box::new(FixedWriter::new(
            days.into_iter().map(|d| d as u16).collect(),
        ))),
        _ => Ok(Box::new(FixedWriter::new(days))),
    }
}

fn datetime_params(
    type_: &Type,
    settings: &CodecSettings,
) -> Result<(Tz, Option<u32>)> {
    let tz = type_
        .time_zone(settings)
        .ok_or_else(|| Error::Internal(format!("{} is not a time type", type_)))?;
    let precision = match type_ {
        Type::DateTime64 { precision, .. } => Some(*precision as u32),
        _ => None,
    };
    Ok((tz, precision))
}

pub(crate) fn create_datetime_reader(
    type_: &Type,
    rows: usize,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnReader>> {
    let (tz, precision) = datetime_params(type_, settings)?;
    let type_ = type_.clone();
    match precision {
        None => Ok(Box::new(FixedReader::<u32>::new(rows, move |data| {
            let ticks = data.into_iter().map(i64::from).collect();
            Arc::new(DateTimeColumn::new(type_, tz, 0, ticks)) as ColumnRef
        }))),
        Some(precision) => {
            Ok(Box::new(FixedReader::<i64>::new(rows, move |ticks| {
                Arc::new(DateTimeColumn::new(type_, tz, precision, ticks))
                    as ColumnRef
            })))
        }
    }
}

pub(crate) fn create_datetime_writer(
    type_: &Type,
    rows: Vec<Value>,
    settings: &CodecSettings,
) -> Result<Box<dyn ColumnWriter>> {
    let (tz, precision) = datetime_params(type_, settings)?;
    let instants = rows
        .into_iter()
        .map(|value| instant_from_value(type_, tz, value));
    match precision {
        None => {
            let data = instants
                .map(|instant| datetime_seconds(type_, &instant?))
                .collect::<Result<Vec<u32>>>()?;
            Ok(Box::new(FixedWriter::new(data)))
        }
        Some(precision) => {
            let data = instants
                .map(|instant| datetime64_ticks(type_, precision, &instant?))
                .collect::<Result<Vec<i64>>>()?;
            Ok(Box::new(FixedWriter::new(data)))
        }
    }
}

/// Unquoted literal text of a time value in the column's zone
pub(crate) fn format_datetime_literal(
    type_: &Type,
    value: &Value,
    settings: &CodecSettings,
) -> Result<String> {
    let (tz, precision) = datetime_params(type_, settings)?;
    let instant = instant_from_value(type_, tz, value.clone())?;
    let mut text = instant.format("%Y-%m-%d %H:%M:%S").to_string();
    if let Some(precision) = precision.filter(|p| *p > 0) {
        let fraction =
            i64::from(instant.timestamp_subsec_nanos()) / pow10(9 - precision);
        text.push_str(&format!(
            ".{:0width$}",
            fraction,
            width = precision as usize
        ));
    }
    Ok(text)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::io::column_stream::{
        read_column,
        write_column,
    };

    fn round_trip(type_: &Type, values: Vec<Value>) -> (Vec<u8>, ColumnRef) {
        let settings = CodecSettings::default();
        let rows = values.len();
        let writer = type_.create_writer(values, &settings).unwrap();
        let bytes = write_column(writer, rows, 64).unwrap();
        let reader = type_.create_reader(rows, &settings).unwrap();
        let column = read_column(reader, rows, &bytes, 3).unwrap().column;
        (bytes.to_vec(), column)
    }

    #[test]
    fn test_date_layout() {
        let date = ymd(1970, 1, 11);
        let (bytes, column) = round_trip(&Type::date(), vec![Value::Date(date)]);
        assert_eq!(bytes, vec![10, 0]);
        assert_eq!(column.get_value(0).unwrap(), Value::Date(date));
    }

    #[test]
    fn test_date_range() {
        let settings = CodecSettings::default();
        let before_epoch = Value::Date(ymd(1969, 12, 31));
        assert!(matches!(
            Type::date().create_writer(vec![before_epoch.clone()], &settings),
            Err(Error::Overflow(_))
        ));
        let (bytes, column) = round_trip(&Type::date32(), vec![before_epoch.clone()]);
        assert_eq!(bytes, (-1i32).to_le_bytes().to_vec());
        assert_eq!(column.get_value(0).unwrap(), before_epoch);
        assert!(Type::date()
            .create_writer(vec![Value::Date(ymd(2149, 6, 6))], &settings)
            .is_ok());
    }

    #[test]
    fn test_datetime64_ticks() {
        let type_ = Type::datetime64(3, Some(Tz::UTC));
        let wall = ymd(2020, 1, 1).and_hms_milli_opt(0, 0, 1, 234).unwrap();
        let (bytes, column) =
            round_trip(&type_, vec![Value::NaiveDateTime(wall)]);
        let expected = 1_577_836_801_234i64;
        assert_eq!(bytes, expected.to_le_bytes().to_vec());
        match column.get_value(0).unwrap() {
            Value::DateTime(dt) => assert_eq!(dt.naive_utc(), wall),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_datetime64_truncates_precision() {
        let type_ = Type::datetime64(1, Some(Tz::UTC));
        let wall = ymd(1969, 12, 31).and_hms_milli_opt(23, 59, 59, 990).unwrap();
        let (bytes, _) = round_trip(&type_, vec![Value::NaiveDateTime(wall)]);
        assert_eq!(bytes, (-1i64).to_le_bytes().to_vec());
    }

    #[test]
    fn test_datetime64_range() {
        let type_ = Type::datetime64(9, Some(Tz::UTC));
        let wall = ymd(2300, 1, 1).and_hms_opt(0, 0, 0).unwrap();
        assert!(matches!(
            type_.create_writer(
                vec![Value::NaiveDateTime(wall)],
                &CodecSettings::default()
            ),
            Err(Error::Overflow(_))
        ));
    }

    #[test]
    fn test_datetime_uses_column_zone() {
        let type_ = Type::datetime(Some(Tz::Europe__Moscow));
        let wall = ymd(2021, 6, 1).and_hms_opt(3, 0, 0).unwrap();
        let (bytes, _) = round_trip(&type_, vec![Value::NaiveDateTime(wall)]);
        // 03:00 MSK is midnight UTC
        let expected = ymd(2021, 6, 1).and_hms_opt(0, 0, 0).unwrap();
        let expected = expected.and_utc().timestamp() as u32;
        assert_eq!(bytes, expected.to_le_bytes().to_vec());
    }

    #[test]
    fn test_datetime_before_epoch_overflows() {
        let type_ = Type::datetime(Some(Tz::UTC));
        let wall = ymd(1969, 1, 1).and_hms_opt(0, 0, 0).unwrap();
        assert!(matches!(
            type_.create_writer(
                vec![Value::NaiveDateTime(wall)],
                &CodecSettings::default()
            ),
            Err(Error::Overflow(_))
        ));
    }

    #[test]
    fn test_nonexistent_local_time() {
        let type_ = Type::datetime(Some(Tz::Europe__Berlin));
        // Clocks jump from 02:00 to 03:00
        let wall = ymd(2021, 3, 28).and_hms_opt(2, 30, 0).unwrap();
        assert!(matches!(
            type_.create_writer(
                vec![Value::NaiveDateTime(wall)],
                &CodecSettings::default()
            ),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_literal() {
        let type_ = Type::datetime64(3, None);
        let settings = CodecSettings::default().time_zone(Tz::Asia__Tokyo);
        let instant = Utc.timestamp_opt(0, 5_000_000).unwrap();
        let value = Value::DateTime(instant.with_timezone(&Tz::UTC));
        assert_eq!(
            format_datetime_literal(&type_, &value, &settings).unwrap(),
            "1970-01-01 09:00:00.005"
        );
    }
}
