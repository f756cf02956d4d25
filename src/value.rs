//! Dynamic row values
//!
//! [`Value`] is what writers consume and what
//! [`TableColumn::get_value`](crate::column::TableColumn::get_value) produces. Typed
//! access without the per-row enum goes through
//! [`try_reinterpret`](crate::column::ColumnRefExt::try_reinterpret).

use crate::{
    Error,
    Result,
};
use bytes::Bytes;
use chrono::{
    DateTime,
    NaiveDate,
    NaiveDateTime,
};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::{
    hash::{
        Hash,
        Hasher,
    },
    net::{
        Ipv4Addr,
        Ipv6Addr,
    },
};
use uuid::Uuid;

/// A single row value of any supported wire type
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Int128(i128),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    UInt128(u128),
    Float32(f32),
    Float64(f64),
    /// Text; also the read form of enum items
    String(String),
    /// Raw bytes; the read form of FixedString
    Bytes(Bytes),
    Uuid(Uuid),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Date(NaiveDate),
    /// An instant; the read form of DateTime and DateTime64
    DateTime(DateTime<Tz>),
    /// Wall-clock time, interpreted in the column's zone when written
    NaiveDateTime(NaiveDateTime),
    Decimal(Decimal),
    /// `mantissa / 10^scale`; the read form of decimals outside the 96-bit
    /// mantissa or 28-digit scale of [`Decimal`]
    WideDecimal { mantissa: i128, scale: u32 },
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Short name of the variant, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int8(_) => "Int8",
            Value::Int16(_) => "Int16",
            Value::Int32(_) => "Int32",
            Value::Int64(_) => "Int64",
            Value::Int128(_) => "Int128",
            Value::UInt8(_) => "UInt8",
            Value::UInt16(_) => "UInt16",
            Value::UInt32(_) => "UInt32",
            Value::UInt64(_) => "UInt64",
            Value::UInt128(_) => "UInt128",
            Value::Float32(_) => "Float32",
            Value::Float64(_) => "Float64",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Uuid(_) => "UUID",
            Value::Ipv4(_) => "IPv4",
            Value::Ipv6(_) => "IPv6",
            Value::Date(_) => "Date",
            Value::DateTime(_) => "DateTime",
            Value::NaiveDateTime(_) => "NaiveDateTime",
            Value::Decimal(_) | Value::WideDecimal { .. } => "Decimal",
            Value::Array(_) => "Array",
            Value::Tuple(_) => "Tuple",
            Value::Map(_) => "Map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Byte view of String and Bytes values
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s.as_bytes()),
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Any integer variant that fits into `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int8(v) => Some(v.into()),
            Value::Int16(v) => Some(v.into()),
            Value::Int32(v) => Some(v.into()),
            Value::Int64(v) => Some(v),
            Value::Int128(v) => i64::try_from(v).ok(),
            Value::UInt8(v) => Some(v.into()),
            Value::UInt16(v) => Some(v.into()),
            Value::UInt32(v) => Some(v.into()),
            Value::UInt64(v) => i64::try_from(v).ok(),
            Value::UInt128(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }
}

macro_rules! impl_from_for_value {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_for_value!(
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    i128 => Int128,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    u128 => UInt128,
    f32 => Float32,
    f64 => Float64,
    String => String,
    Bytes => Bytes,
    Uuid => Uuid,
    Ipv4Addr => Ipv4,
    Ipv6Addr => Ipv6,
    NaiveDate => Date,
    DateTime<Tz> => DateTime,
    NaiveDateTime => NaiveDateTime,
    Decimal => Decimal,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

/// Conversion of a row value into a fixed-width storage element
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

macro_rules! impl_integer_from_value {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self> {
                    let converted = match &value {
                        Value::Int8(v) => <$t>::try_from(*v).ok(),
                        Value::Int16(v) => <$t>::try_from(*v).ok(),
                        Value::Int32(v) => <$t>::try_from(*v).ok(),
                        Value::Int64(v) => <$t>::try_from(*v).ok(),
                        Value::Int128(v) => <$t>::try_from(*v).ok(),
                        Value::UInt8(v) => <$t>::try_from(*v).ok(),
                        Value::UInt16(v) => <$t>::try_from(*v).ok(),
                        Value::UInt32(v) => <$t>::try_from(*v).ok(),
                        Value::UInt64(v) => <$t>::try_from(*v).ok(),
                        Value::UInt128(v) => <$t>::try_from(*v).ok(),
                        other => {
                            return Err(Error::type_mismatch(
                                stringify!($t),
                                other.kind_name(),
                            ))
                        }
                    };
                    converted.ok_or_else(|| {
                        Error::Overflow(format!(
                            "{:?} does not fit into {}",
                            value,
                            stringify!($t)
                        ))
                    })
                }
            }
        )*
    };
}

impl_integer_from_value!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128);

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float32(v) => Ok(v.into()),
            Value::Float64(v) => Ok(v),
            Value::Int8(v) => Ok(v.into()),
            Value::Int16(v) => Ok(v.into()),
            Value::Int32(v) => Ok(v.into()),
            Value::UInt8(v) => Ok(v.into()),
            Value::UInt16(v) => Ok(v.into()),
            Value::UInt32(v) => Ok(v.into()),
            other => Err(Error::type_mismatch("f64", other.kind_name())),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float32(v) => Ok(v),
            Value::Float64(v) => {
                let narrowed = v as f32;
                if v.is_nan() || f64::from(narrowed) == v {
                    Ok(narrowed)
                } else {
                    Err(Error::Overflow(format!(
                        "{} cannot be represented as f32",
                        v
                    )))
                }
            }
            Value::Int8(v) => Ok(v.into()),
            Value::Int16(v) => Ok(v.into()),
            Value::UInt8(v) => Ok(v.into()),
            Value::UInt16(v) => Ok(v.into()),
            other => Err(Error::type_mismatch("f32", other.kind_name())),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            Value::UInt8(0) => Ok(false),
            Value::UInt8(1) => Ok(true),
            other => Err(Error::type_mismatch("Bool", other.kind_name())),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Uuid(v) => Ok(v),
            Value::String(s) => Uuid::parse_str(&s).map_err(|e| {
                Error::InvalidArgument(format!("Invalid UUID '{}': {}", s, e))
            }),
            other => Err(Error::type_mismatch("UUID", other.kind_name())),
        }
    }
}

impl FromValue for Ipv4Addr {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Ipv4(v) => Ok(v),
            Value::UInt32(v) => Ok(Ipv4Addr::from(v)),
            Value::String(s) => s.parse().map_err(|_| {
                Error::InvalidArgument(format!("Invalid IPv4 address: {}", s))
            }),
            other => Err(Error::type_mismatch("IPv4", other.kind_name())),
        }
    }
}

impl FromValue for Ipv6Addr {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Ipv6(v) => Ok(v),
            Value::Ipv4(v) => Ok(v.to_ipv6_mapped()),
            Value::String(s) => s.parse().map_err(|_| {
                Error::InvalidArgument(format!("Invalid IPv6 address: {}", s))
            }),
            other => Err(Error::type_mismatch("IPv6", other.kind_name())),
        }
    }
}

/// Structural equality where floats compare by bit pattern
pub(crate) fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float32(x), Value::Float32(y)) => x.to_bits() == y.to_bits(),
        (Value::Float64(x), Value::Float64(y)) => x.to_bits() == y.to_bits(),
        (Value::Array(x), Value::Array(y)) | (Value::Tuple(x), Value::Tuple(y)) => {
            x.len() == y.len()
                && x.iter().zip(y).all(|(x, y)| same_value(x, y))
        }
        (Value::Map(x), Value::Map(y)) => {
            x.len() == y.len()
                && x.iter().zip(y).all(|((xk, xv), (yk, yv))| {
                    same_value(xk, yk) && same_value(xv, yv)
                })
        }
        _ => a == b,
    }
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    std::mem::discriminant(value).hash(state);
    match value {
        Value::Null => {}
        Value::Bool(v) => v.hash(state),
        Value::Int8(v) => v.hash(state),
        Value::Int16(v) => v.hash(state),
        Value::Int32(v) => v.hash(state),
        Value::Int64(v) => v.hash(state),
        Value::Int128(v) => v.hash(state),
        Value::UInt8(v) => v.hash(state),
        Value::UInt16(v) => v.hash(state),
        Value::UInt32(v) => v.hash(state),
        Value::UInt64(v) => v.hash(state),
        Value::UInt128(v) => v.hash(state),
        Value::Float32(v) => v.to_bits().hash(state),
        Value::Float64(v) => v.to_bits().hash(state),
        Value::String(v) => v.hash(state),
        Value::Bytes(v) => v.hash(state),
        Value::Uuid(v) => v.hash(state),
        Value::Ipv4(v) => v.hash(state),
        Value::Ipv6(v) => v.hash(state),
        Value::Date(v) => v.hash(state),
        Value::DateTime(v) => v.naive_utc().hash(state),
        Value::NaiveDateTime(v) => v.hash(state),
        Value::Decimal(v) => v.hash(state),
        Value::WideDecimal { mantissa, scale } => {
            mantissa.hash(state);
            scale.hash(state);
        }
        Value::Array(items) | Value::Tuple(items) => {
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Map(entries) => {
            entries.len().hash(state);
            for (k, v) in entries {
                hash_value(k, state);
                hash_value(v, state);
            }
        }
    }
}

/// Hash-map key wrapper over [`Value`] using [`same_value`] equality
#[derive(Debug, Clone)]
pub(crate) struct ValueKey(pub Value);

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        same_value(&self.0, &other.0)
    }
}

impl Eq for ValueKey {}

impl Hash for ValueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(&self.0, state)
    }
}
