//! Decimal columns
//!
//! Values are two's-complement integers scaled by `10^scale`, stored in 32,
//! 64 or 128 bits depending on precision:
//! - precision <= 9: Int32
//! - precision <= 18: Int64
//! - otherwise: Int128
//!
//! Writing rescales the source value's mantissa to the column scale by
//! multiplying 32-bit limbs in steps of at most `10^9`, so overflow is caught
//! at the step where it happens. A source with more fractional digits than
//! the column is first rounded half away from zero.

use super::{
    downcast_column,
    impl_column_any,
    numeric::{
        FixedReader,
        FixedWriter,
    },
    projection::{
        MappedColumn,
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
    types::Type,
    Error,
    Result,
    Value,
};
use rust_decimal::{
    Decimal,
    RoundingStrategy,
};
use std::{
    str::FromStr,
    sync::Arc,
};

/// Largest power of ten multiplied in one step
const MAX_STEP_DIGITS: u32 = 9;

/// Storage of a decimal column, chosen by precision
enum DecimalData {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Int128(Vec<i128>),
}

impl DecimalData {
    fn len(&self) -> usize {
        match self {
            DecimalData::Int32(v) => v.len(),
            DecimalData::Int64(v) => v.len(),
            DecimalData::Int128(v) => v.len(),
        }
    }

    fn get(&self, index: usize) -> Option<i128> {
        match self {
            DecimalData::Int32(v) => v.get(index).map(|x| i128::from(*x)),
            DecimalData::Int64(v) => v.get(index).map(|x| i128::from(*x)),
            DecimalData::Int128(v) => v.get(index).copied(),
        }
    }
}

/// Column for Decimal types with precision and scale
pub struct DecimalColumn {
    type_: Type,
    scale: usize,
    data: DecimalData,
}

impl DecimalColumn {
    fn new(type_: Type, scale: usize, data: DecimalData) -> Self {
        Self { type_, scale, data }
    }

    pub fn scale(&self) -> usize {
        self.scale
    }

    /// Stored integer, scaled by `10^scale`
    pub fn mantissa(&self, index: usize) -> Result<i128> {
        self.data
            .get(index)
            .ok_or_else(|| Error::out_of_bounds(index, self.data.len()))
    }

    /// Row as text at the column scale
    pub fn as_string(&self, index: usize) -> Result<String> {
        Ok(format_decimal(self.mantissa(index)?, self.scale))
    }
}

impl TableColumn for DecimalColumn {
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
        let mantissa = self.mantissa(index)?;
        let scale = self.scale as u32;
        Ok(match Decimal::try_from_i128_with_scale(mantissa, scale) {
            Ok(decimal) => Value::Decimal(decimal),
            Err(_) => Value::WideDecimal { mantissa, scale },
        })
    }

    impl_column_any!();
}

impl TypedColumn<i128> for DecimalColumn {
    fn row_count(&self) -> usize {
        self.data.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get(&self, index: usize) -> Result<i128> {
        self.mantissa(index)
    }
}

impl TypedColumn<Decimal> for DecimalColumn {
    fn row_count(&self) -> usize {
        self.data.len()
    }

    fn is_null(&self, _index: usize) -> bool {
        false
    }

    fn get(&self, index: usize) -> Result<Decimal> {
        let mantissa = self.mantissa(index)?;
        Decimal::try_from_i128_with_scale(mantissa, self.scale as u32).map_err(
            |_| {
                Error::Overflow(format!(
                    "{} does not fit a 96-bit decimal",
                    format_decimal(mantissa, self.scale)
                ))
            },
        )
    }
}

impl Projection for Decimal {
    fn project(column: &ColumnRef) -> Option<TypedColumnRef<Self>> {
        downcast_column::<DecimalColumn>(column)
            .map(|c| c as TypedColumnRef<Decimal>)
    }
}

/// `f64` view of a decimal column
pub(crate) fn project_f64(column: &ColumnRef) -> Option<TypedColumnRef<f64>> {
    let column = downcast_column::<DecimalColumn>(column)?;
    let divisor = 10f64.powi(column.scale as i32);
    Some(MappedColumn::<i128, f64>::new(column, move |mantissa| {
        Ok(mantissa as f64 / divisor)
    }))
}

/// Sign, magnitude and scale of a value to be stored
struct SourceDecimal {
    negative: bool,
    magnitude: u128,
    scale: u32,
}

fn source_decimal(value: &Value, target_scale: u32) -> Result<SourceDecimal> {
    let from_decimal = |d: Decimal| {
        let d = if d.scale() > target_scale {
            d.round_dp_with_strategy(
                target_scale,
                RoundingStrategy::MidpointAwayFromZero,
            )
        } else {
            d
        };
        SourceDecimal {
            negative: d.is_sign_negative(),
            magnitude: d.mantissa().unsigned_abs(),
            scale: d.scale(),
        }
    };
    let from_int = |v: i128| SourceDecimal {
        negative: v < 0,
        magnitude: v.unsigned_abs(),
        scale: 0,
    };
    let float_error =
        |v: f64| Error::Overflow(format!("{} cannot be stored as a decimal", v));

    let source = match value {
        Value::Decimal(d) => from_decimal(*d),
        Value::WideDecimal { mantissa, scale } => {
            rescale_down(*mantissa, *scale, target_scale)
        }
        Value::Int8(v) => from_int(i128::from(*v)),
        Value::Int16(v) => from_int(i128::from(*v)),
        Value::Int32(v) => from_int(i128::from(*v)),
        Value::Int64(v) => from_int(i128::from(*v)),
        Value::Int128(v) => from_int(*v),
        Value::UInt8(v) => from_int(i128::from(*v)),
        Value::UInt16(v) => from_int(i128::from(*v)),
        Value::UInt32(v) => from_int(i128::from(*v)),
        Value::UInt64(v) => from_int(i128::from(*v)),
        Value::UInt128(v) => {
            SourceDecimal { negative: false, magnitude: *v, scale: 0 }
        }
        Value::Float32(v) => from_decimal(
            Decimal::try_from(*v).map_err(|_| float_error(f64::from(*v)))?,
        ),
        Value::Float64(v) => {
            from_decimal(Decimal::try_from(*v).map_err(|_| float_error(*v))?)
        }
        Value::String(s) => from_decimal(Decimal::from_str(s.trim()).map_err(
            |e| Error::InvalidArgument(format!("Invalid decimal '{}': {}", s, e)),
        )?),
        other => {
            return Err(Error::type_mismatch("Decimal", other.kind_name()))
        }
    };
    Ok(source)
}

/// Round `mantissa / 10^scale` half away from zero to at most `target_scale`
/// fractional digits
fn rescale_down(
    mantissa: i128,
    scale: u32,
    target_scale: u32,
) -> SourceDecimal {
    let negative = mantissa < 0;
    let magnitude = mantissa.unsigned_abs();
    if scale <= target_scale {
        return SourceDecimal { negative, magnitude, scale };
    }
    let magnitude = match 10u128.checked_pow(scale - target_scale) {
        Some(divisor) => {
            let quotient = magnitude / divisor;
            let remainder = magnitude % divisor;
            if remainder >= divisor - remainder {
                quotient + 1
            } else {
                quotient
            }
        }
        None => 0,
    };
    SourceDecimal { negative, magnitude, scale: target_scale }
}

/// Multiply a little-endian 4-limb magnitude by `10^digits`
///
/// Returns `None` when the product needs more than 128 bits.
fn multiply_limbs(mut limbs: [u32; 4], mut digits: u32) -> Option<[u32; 4]> {
    while digits > 0 {
        let step = digits.min(MAX_STEP_DIGITS);
        let factor = 10u64.pow(step);
        let mut carry = 0u64;
        for limb in limbs.iter_mut() {
            let product = u64::from(*limb) * factor + carry;
            *limb = product as u32;
            carry = product >> 32;
        }
        if carry != 0 {
            return None;
        }
        digits -= step;
    }
    Some(limbs)
}

fn to_limbs(magnitude: u128) -> [u32; 4] {
    [
        magnitude as u32,
        (magnitude >> 32) as u32,
        (magnitude >> 64) as u32,
        (magnitude >> 96) as u32,
    ]
}

fn from_limbs(limbs: [u32; 4]) -> u128 {
    limbs
        .iter()
        .rev()
        .fold(0u128, |acc, limb| (acc << 32) | u128::from(*limb))
}

/// Rescale `value` to `scale` and check it fits the storage of `precision`
pub(crate) fn scaled_mantissa(
    value: &Value,
    precision: usize,
    scale: usize,
) -> Result<i128> {
    let target_scale = scale as u32;
    let source = source_decimal(value, target_scale)?;
    let overflow = || {
        Error::Overflow(format!(
            "{:?} does not fit Decimal({}, {})",
            value, precision, scale
        ))
    };

    let delta = i64::from(target_scale) - i64::from(source.scale);
    if delta < 0 {
        return Err(Error::Internal(format!(
            "Decimal scale {} above target scale {} after rounding",
            source.scale, target_scale
        )));
    }
    if source.magnitude == 0 {
        return Ok(0);
    }

    let limbs = multiply_limbs(to_limbs(source.magnitude), delta as u32)
        .ok_or_else(overflow)?;
    let magnitude = from_limbs(limbs);

    let mantissa = if source.negative {
        if magnitude > i128::MIN.unsigned_abs() {
            return Err(overflow());
        }
        (magnitude as i128).wrapping_neg()
    } else {
        i128::try_from(magnitude).map_err(|_| overflow())?
    };

    let fits = if precision <= 9 {
        i32::try_from(mantissa).is_ok()
    } else if precision <= 18 {
        i64::try_from(mantissa).is_ok()
    } else {
        true
    };
    if !fits {
        return Err(overflow());
    }
    Ok(mantissa)
}

/// Format scaled integer to decimal string
/// 12345 with scale 2 -> "123.45"
pub(crate) fn format_decimal(value: i128, scale: usize) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs_value = value.unsigned_abs();
    if scale == 0 {
        return format!("{}{}", sign, abs_value);
    }

    let scale_divisor = 10u128.pow(scale as u32);
    let integer_part = abs_value / scale_divisor;
    let fractional_part = abs_value % scale_divisor;
    format!(
        "{}{}.{:0width$}",
        sign,
        integer_part,
        fractional_part,
        width = scale
    )
}

fn precision_and_scale(type_: &Type) -> Result<(usize, usize)> {
    match type_ {
        Type::Decimal { precision, scale } => Ok((*precision, *scale)),
        _ => Err(Error::Internal(format!("{} is not a decimal type", type_))),
    }
}

pub(crate) fn create_reader(
    type_: &Type,
    rows: usize,
) -> Result<Box<dyn ColumnReader>> {
    let (precision, scale) = precision_and_scale(type_)?;
    let type_ = type_.clone();
    let reader: Box<dyn ColumnReader> = if precision <= 9 {
        Box::new(FixedReader::<i32>::new(rows, move |data| {
            Arc::new(DecimalColumn::new(type_, scale, DecimalData::Int32(data)))
                as ColumnRef
        }))
    } else if precision <= 18 {
        Box::new(FixedReader::<i64>::new(rows, move |data| {
            Arc::new(DecimalColumn::new(type_, scale, DecimalData::Int64(data)))
                as ColumnRef
        }))
    } else {
        Box::new(FixedReader::<i128>::new(rows, move |data| {
            Arc::new(DecimalColumn::new(type_, scale, DecimalData::Int128(data)))
                as ColumnRef
        }))
    };
    Ok(reader)
}

pub(crate) fn create_writer(
    type_: &Type,
    rows: Vec<Value>,
) -> Result<Box<dyn ColumnWriter>> {
    let (precision, scale) = precision_and_scale(type_)?;
    let mantissas = rows
        .iter()
        .map(|value| scaled_mantissa(value, precision, scale))
        .collect::<Result<Vec<i128>>>()?;

    // scaled_mantissa has already checked the storage width
    let writer: Box<dyn ColumnWriter> = if precision <= 9 {
        Box::new(FixedWriter::new(
            mantissas.into_iter().map(|m| m as i32).collect(),
        ))
    } else if precision <= 18 {
        Box::new(FixedWriter::new(
            mantissas.into_iter().map(|m| m as i64).collect(),
        ))
    } else {
        Box::new(FixedWriter::new(mantissas))
    };
    Ok(writer)
}
