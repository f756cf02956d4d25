//! # ClickHouse Type System
//!
//! Type descriptors for the native protocol's column codecs. A [`Type`] is
//! resolved once from a type name (see [`Type::parse`]) and is immutable
//! afterwards; it is the factory for the column's reader, skip reader and
//! writer.
//!
//! ## Storage on the wire
//!
//! | Type | Row storage |
//! |------|-------------|
//! | `Bool`, `(U)Int8..128`, `Float32/64` | little-endian fixed width |
//! | `UUID` | two u64 halves, high half first |
//! | `IPv4` / `IPv6` | u32 little-endian / 16 bytes network order |
//! | `Date` / `Date32` | u16 / i32 days since 1970-01-01 |
//! | `DateTime` / `DateTime64(p)` | u32 seconds / i64 ticks of 10^-p s |
//! | `Decimal(P, S)` | i32, i64 or i128 by precision |
//! | `Enum8` / `Enum16` | i8 / i16 item value |
//! | `String` / `FixedString(N)` | varint length + bytes / N bytes |
//!
//! Composite types (`Array`, `Tuple`, `Map`, `Nullable`, `LowCardinality`,
//! `Variant`) frame the streams of their element types; see the modules
//! under [`crate::column`].
//!
//! Reference: <https://clickhouse.com/docs/en/sql-reference/data-types>
//!
//! ## Unspecified types
//!
//! A parametric base name given without its arguments (`Array`,
//! `Decimal`, `FixedString`, ...) resolves to [`Type::Unspecified`]. It can
//! be named and compared, but every reader/writer factory fails with
//! [`Error::TypeNotFullySpecified`](crate::Error::TypeNotFullySpecified).

pub mod parser;
pub mod registry;

pub use registry::{
    default_registry,
    parse_type_name,
    TypeConstructor,
    TypeRegistry,
};

use crate::{
    io::column_stream::{
        self,
        ColumnReader,
        ColumnSkipper,
        ColumnWriter,
        SerializationKind,
    },
    literal,
    settings::CodecSettings,
    Result,
    Value,
};
use chrono::{
    NaiveDate,
    NaiveDateTime,
    TimeZone,
};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::{
    fmt,
    net::{
        Ipv4Addr,
        Ipv6Addr,
    },
};
use uuid::Uuid;

/// Type code enumeration matching ClickHouse types
///
/// Each variant represents a base type in ClickHouse. For parametric types
/// (like Array, Nullable, etc.), see the [`Type`] enum which includes
/// parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    /// Column without values; every row is NULL.
    Nothing = 0,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    Float32,
    Float64,
    /// Variable-length byte string.
    String,
    /// Fixed-length byte string, padded with null bytes.
    FixedString,
    /// Unix timestamp (UInt32) with optional timezone.
    DateTime,
    /// Ticks of 10^-precision seconds (Int64) with optional timezone.
    DateTime64,
    /// Days since 1970-01-01 (UInt16).
    Date,
    /// Days since 1970-01-01 (Int32).
    Date32,
    Array,
    Nullable,
    Tuple,
    Enum8,
    Enum16,
    UUID,
    IPv4,
    IPv6,
    Decimal,
    Decimal32,
    Decimal64,
    Decimal128,
    LowCardinality,
    Map,
    /// Tagged union of alternative types.
    Variant,
}

impl TypeCode {
    /// Returns the ClickHouse type name string for this type code.
    pub fn name(&self) -> &'static str {
        match self {
            TypeCode::Nothing => "Nothing",
            TypeCode::Bool => "Bool",
            TypeCode::Int8 => "Int8",
            TypeCode::Int16 => "Int16",
            TypeCode::Int32 => "Int32",
            TypeCode::Int64 => "Int64",
            TypeCode::Int128 => "Int128",
            TypeCode::UInt8 => "UInt8",
            TypeCode::UInt16 => "UInt16",
            TypeCode::UInt32 => "UInt32",
            TypeCode::UInt64 => "UInt64",
            TypeCode::UInt128 => "UInt128",
            TypeCode::Float32 => "Float32",
            TypeCode::Float64 => "Float64",
            TypeCode::String => "String",
            TypeCode::FixedString => "FixedString",
            TypeCode::DateTime => "DateTime",
            TypeCode::DateTime64 => "DateTime64",
            TypeCode::Date => "Date",
            TypeCode::Date32 => "Date32",
            TypeCode::Array => "Array",
            TypeCode::Nullable => "Nullable",
            TypeCode::Tuple => "Tuple",
            TypeCode::Enum8 => "Enum8",
            TypeCode::Enum16 => "Enum16",
            TypeCode::UUID => "UUID",
            TypeCode::IPv4 => "IPv4",
            TypeCode::IPv6 => "IPv6",
            TypeCode::Decimal => "Decimal",
            TypeCode::Decimal32 => "Decimal32",
            TypeCode::Decimal64 => "Decimal64",
            TypeCode::Decimal128 => "Decimal128",
            TypeCode::LowCardinality => "LowCardinality",
            TypeCode::Map => "Map",
            TypeCode::Variant => "Variant",
        }
    }
}

/// Enum item for Enum8/Enum16 types, mapping a name to its integer value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumItem {
    /// The string name of this enum variant.
    pub name: String,
    /// The integer value associated with this enum variant.
    pub value: i16,
}

/// ClickHouse type definition, representing both simple and parametric types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// A parametric base name whose arguments were not given.
    Unspecified(TypeCode),
    /// A non-parametric type identified by its [`TypeCode`].
    Simple(TypeCode),
    /// Fixed-length byte string with the given size in bytes.
    FixedString { size: usize },
    /// Date and time; `None` uses [`CodecSettings::time_zone`].
    DateTime { timezone: Option<Tz> },
    /// Date and time with `precision` sub-second decimal digits (0 to 9).
    DateTime64 { precision: usize, timezone: Option<Tz> },
    /// Decimal with given precision (1 to 38) and scale.
    Decimal { precision: usize, scale: usize },
    Enum8 { items: Vec<EnumItem> },
    Enum16 { items: Vec<EnumItem> },
    Array { item_type: Box<Type> },
    Nullable { nested_type: Box<Type> },
    /// Tuple; `names` is set for named tuples `Tuple(a T, b U)`.
    Tuple { item_types: Vec<Type>, names: Option<Vec<String>> },
    LowCardinality { nested_type: Box<Type> },
    Map { key_type: Box<Type>, value_type: Box<Type> },
    /// Tagged union; alternatives keep their declared order.
    Variant { variants: Vec<Type> },
}

impl Type {
    /// Returns the [`TypeCode`] for this type.
    pub fn code(&self) -> TypeCode {
        match self {
            Type::Unspecified(code) | Type::Simple(code) => *code,
            Type::FixedString { .. } => TypeCode::FixedString,
            Type::DateTime { .. } => TypeCode::DateTime,
            Type::DateTime64 { .. } => TypeCode::DateTime64,
            Type::Decimal { .. } => TypeCode::Decimal,
            Type::Enum8 { .. } => TypeCode::Enum8,
            Type::Enum16 { .. } => TypeCode::Enum16,
            Type::Array { .. } => TypeCode::Array,
            Type::Nullable { .. } => TypeCode::Nullable,
            Type::Tuple { .. } => TypeCode::Tuple,
            Type::LowCardinality { .. } => TypeCode::LowCardinality,
            Type::Map { .. } => TypeCode::Map,
            Type::Variant { .. } => TypeCode::Variant,
        }
    }

    /// Returns the full ClickHouse type name string, including parameters.
    pub fn name(&self) -> String {
        match self {
            Type::Unspecified(code) | Type::Simple(code) => {
                code.name().to_string()
            }
            Type::FixedString { size } => format!("FixedString({})", size),
            Type::DateTime { timezone: None } => "DateTime".to_string(),
            Type::DateTime { timezone: Some(tz) } => {
                format!("DateTime({})", literal::quote(tz.name()))
            }
            Type::DateTime64 { precision, timezone: None } => {
                format!("DateTime64({})", precision)
            }
            Type::DateTime64 { precision, timezone: Some(tz) } => {
                format!("DateTime64({}, {})", precision, literal::quote(tz.name()))
            }
            Type::Decimal { precision, scale } => {
                format!("Decimal({}, {})", precision, scale)
            }
            Type::Enum8 { items } => {
                format!("Enum8({})", format_enum_items(items))
            }
            Type::Enum16 { items } => {
                format!("Enum16({})", format_enum_items(items))
            }
            Type::Array { item_type } => {
                format!("Array({})", item_type.name())
            }
            Type::Nullable { nested_type } => {
                format!("Nullable({})", nested_type.name())
            }
            Type::Tuple { item_types, names } => {
                let types: Vec<String> = match names {
                    Some(names) => names
                        .iter()
                        .zip(item_types)
                        .map(|(n, t)| format!("{} {}", n, t.name()))
                        .collect(),
                    None => item_types.iter().map(|t| t.name()).collect(),
                };
                format!("Tuple({})", types.join(", "))
            }
            Type::LowCardinality { nested_type } => {
                format!("LowCardinality({})", nested_type.name())
            }
            Type::Map { key_type, value_type } => {
                format!("Map({}, {})", key_type.name(), value_type.name())
            }
            Type::Variant { variants } => {
                let types: Vec<String> =
                    variants.iter().map(|t| t.name()).collect();
                format!("Variant({})", types.join(", "))
            }
        }
    }

    /// Whether every required argument of this type and its elements is
    /// bound
    pub fn is_fully_specified(&self) -> bool {
        match self {
            Type::Unspecified(_) => false,
            Type::Array { item_type } => item_type.is_fully_specified(),
            Type::Nullable { nested_type }
            | Type::LowCardinality { nested_type } => {
                nested_type.is_fully_specified()
            }
            Type::Tuple { item_types, .. } => {
                item_types.iter().all(Type::is_fully_specified)
            }
            Type::Map { key_type, value_type } => {
                key_type.is_fully_specified() && value_type.is_fully_specified()
            }
            Type::Variant { variants } => {
                variants.iter().all(Type::is_fully_specified)
            }
            _ => true,
        }
    }

    /// Returns the storage size in bytes for fixed-size types
    ///
    /// Returns `None` for variable-length and composite types.
    ///
    /// # Examples
    ///
    /// ```
    /// use clickhouse_column_codec::types::Type;
    ///
    /// assert_eq!(Type::uint32().storage_size_bytes(), Some(4));
    /// assert_eq!(Type::fixed_string(10).storage_size_bytes(), Some(10));
    /// assert_eq!(Type::string().storage_size_bytes(), None);
    /// ```
    pub fn storage_size_bytes(&self) -> Option<usize> {
        match self {
            Type::Simple(code) => match code {
                TypeCode::Nothing | TypeCode::Bool => Some(1),
                TypeCode::Int8 | TypeCode::UInt8 => Some(1),
                TypeCode::Int16 | TypeCode::UInt16 => Some(2),
                TypeCode::Int32 | TypeCode::UInt32 | TypeCode::Float32 => {
                    Some(4)
                }
                TypeCode::Int64 | TypeCode::UInt64 | TypeCode::Float64 => {
                    Some(8)
                }
                TypeCode::Int128 | TypeCode::UInt128 | TypeCode::UUID => {
                    Some(16)
                }
                TypeCode::Date => Some(2),   // UInt16
                TypeCode::Date32 => Some(4), // Int32
                TypeCode::IPv4 => Some(4),
                TypeCode::IPv6 => Some(16),
                _ => None,
            },
            Type::FixedString { size } => Some(*size),
            Type::DateTime { .. } => Some(4),
            Type::DateTime64 { .. } => Some(8),
            Type::Enum8 { .. } => Some(1),
            Type::Enum16 { .. } => Some(2),
            Type::Decimal { precision, .. } => {
                if *precision <= 9 {
                    Some(4)
                } else if *precision <= 18 {
                    Some(8)
                } else {
                    Some(16)
                }
            }
            _ => None,
        }
    }

    pub fn nothing() -> Self {
        Type::Simple(TypeCode::Nothing)
    }

    pub fn bool() -> Self {
        Type::Simple(TypeCode::Bool)
    }

    pub fn int8() -> Self {
        Type::Simple(TypeCode::Int8)
    }

    pub fn int16() -> Self {
        Type::Simple(TypeCode::Int16)
    }

    pub fn int32() -> Self {
        Type::Simple(TypeCode::Int32)
    }

    pub fn int64() -> Self {
        Type::Simple(TypeCode::Int64)
    }

    pub fn int128() -> Self {
        Type::Simple(TypeCode::Int128)
    }

    pub fn uint8() -> Self {
        Type::Simple(TypeCode::UInt8)
    }

    pub fn uint16() -> Self {
        Type::Simple(TypeCode::UInt16)
    }

    pub fn uint32() -> Self {
        Type::Simple(TypeCode::UInt32)
    }

    pub fn uint64() -> Self {
        Type::Simple(TypeCode::UInt64)
    }

    pub fn uint128() -> Self {
        Type::Simple(TypeCode::UInt128)
    }

    pub fn float32() -> Self {
        Type::Simple(TypeCode::Float32)
    }

    pub fn float64() -> Self {
        Type::Simple(TypeCode::Float64)
    }

    /// Creates a variable-length String type.
    pub fn string() -> Self {
        Type::Simple(TypeCode::String)
    }

    /// Creates a FixedString type with the given size in bytes.
    pub fn fixed_string(size: usize) -> Self {
        Type::FixedString { size }
    }

    /// Creates a Date type (days since 1970-01-01, stored as UInt16).
    pub fn date() -> Self {
        Type::Simple(TypeCode::Date)
    }

    /// Creates a Date32 type (days since 1970-01-01, stored as Int32).
    pub fn date32() -> Self {
        Type::Simple(TypeCode::Date32)
    }

    /// Creates a DateTime type with an optional timezone.
    pub fn datetime(timezone: Option<Tz>) -> Self {
        Type::DateTime { timezone }
    }

    /// Creates a DateTime64 type with the given sub-second precision and
    /// optional timezone.
    pub fn datetime64(precision: usize, timezone: Option<Tz>) -> Self {
        Type::DateTime64 { precision, timezone }
    }

    /// Creates a Decimal type with the given precision and scale.
    pub fn decimal(precision: usize, scale: usize) -> Self {
        Type::Decimal { precision, scale }
    }

    pub fn ipv4() -> Self {
        Type::Simple(TypeCode::IPv4)
    }

    pub fn ipv6() -> Self {
        Type::Simple(TypeCode::IPv6)
    }

    /// Creates a UUID type.
    pub fn uuid() -> Self {
        Type::Simple(TypeCode::UUID)
    }

    /// Creates an Array type with the given element type.
    pub fn array(item_type: Type) -> Self {
        Type::Array { item_type: Box::new(item_type) }
    }

    /// Creates a Nullable wrapper around the given type.
    pub fn nullable(nested_type: Type) -> Self {
        Type::Nullable { nested_type: Box::new(nested_type) }
    }

    /// Creates a Tuple type with the given element types.
    pub fn tuple(item_types: Vec<Type>) -> Self {
        Type::Tuple { item_types, names: None }
    }

    /// Creates a Tuple type with named elements.
    pub fn named_tuple(item_types: Vec<Type>, names: Vec<String>) -> Self {
        Type::Tuple { item_types, names: Some(names) }
    }

    /// Creates an Enum8 type with the given name-value items.
    pub fn enum8(items: Vec<EnumItem>) -> Self {
        Type::Enum8 { items }
    }

    /// Creates an Enum16 type with the given name-value items.
    pub fn enum16(items: Vec<EnumItem>) -> Self {
        Type::Enum16 { items }
    }

    /// Creates a LowCardinality wrapper around the given type.
    pub fn low_cardinality(nested_type: Type) -> Self {
        Type::LowCardinality { nested_type: Box::new(nested_type) }
    }

    /// Creates a Map type with the given key and value types.
    pub fn map(key_type: Type, value_type: Type) -> Self {
        Type::Map {
            key_type: Box::new(key_type),
            value_type: Box::new(value_type),
        }
    }

    /// Creates a Variant type; alternatives keep the given order.
    pub fn variant(variants: Vec<Type>) -> Self {
        Type::Variant { variants }
    }

    /// Returns the items of an Enum8/Enum16 type.
    pub fn enum_items(&self) -> Option<&[EnumItem]> {
        match self {
            Type::Enum8 { items } | Type::Enum16 { items } => Some(items),
            _ => None,
        }
    }

    /// Returns true if this enum type contains a variant with the given
    /// integer value.
    pub fn has_enum_value(&self, value: i16) -> bool {
        self.get_enum_name(value).is_some()
    }

    /// Returns the enum variant name for the given integer value, if it
    /// exists.
    pub fn get_enum_name(&self, value: i16) -> Option<&str> {
        self.enum_items()?
            .iter()
            .find(|item| item.value == value)
            .map(|item| item.name.as_str())
    }

    /// Returns the integer value for the given enum variant name.
    pub fn get_enum_value(&self, name: &str) -> Option<i16> {
        self.enum_items()?
            .iter()
            .find(|item| item.name == name)
            .map(|item| item.value)
    }

    /// Zone a DateTime/DateTime64 column's values are expressed in
    pub fn time_zone(&self, settings: &CodecSettings) -> Option<Tz> {
        match self {
            Type::DateTime { timezone } | Type::DateTime64 { timezone, .. } => {
                Some(timezone.unwrap_or(settings.time_zone))
            }
            _ => None,
        }
    }

    /// The value a row of this type holds when nothing was set
    pub fn default_value(&self, settings: &CodecSettings) -> Value {
        match self {
            Type::Unspecified(_) => Value::Null,
            Type::Simple(code) => match code {
                TypeCode::Nothing => Value::Null,
                TypeCode::Bool => Value::Bool(false),
                TypeCode::Int8 => Value::Int8(0),
                TypeCode::Int16 => Value::Int16(0),
                TypeCode::Int32 => Value::Int32(0),
                TypeCode::Int64 => Value::Int64(0),
                TypeCode::Int128 => Value::Int128(0),
                TypeCode::UInt8 => Value::UInt8(0),
                TypeCode::UInt16 => Value::UInt16(0),
                TypeCode::UInt32 => Value::UInt32(0),
                TypeCode::UInt64 => Value::UInt64(0),
                TypeCode::UInt128 => Value::UInt128(0),
                TypeCode::Float32 => Value::Float32(0.0),
                TypeCode::Float64 => Value::Float64(0.0),
                TypeCode::String => Value::String(String::new()),
                TypeCode::UUID => Value::Uuid(Uuid::nil()),
                TypeCode::IPv4 => Value::Ipv4(Ipv4Addr::UNSPECIFIED),
                TypeCode::IPv6 => Value::Ipv6(Ipv6Addr::UNSPECIFIED),
                TypeCode::Date | TypeCode::Date32 => {
                    Value::Date(NaiveDate::default())
                }
                _ => Value::Null,
            },
            Type::FixedString { size } => {
                Value::Bytes(bytes::Bytes::from(vec![0u8; *size]))
            }
            Type::DateTime { .. } | Type::DateTime64 { .. } => {
                let tz = self.time_zone(settings).unwrap_or(settings.time_zone);
                Value::DateTime(tz.from_utc_datetime(&NaiveDateTime::default()))
            }
            Type::Decimal { scale, .. } => {
                Value::Decimal(Decimal::new(0, (*scale).min(28) as u32))
            }
            Type::Enum8 { items } | Type::Enum16 { items } => items
                .iter()
                .min_by_key(|item| item.value)
                .map(|item| Value::String(item.name.clone()))
                .unwrap_or(Value::Null),
            Type::Array { .. } => Value::Array(Vec::new()),
            Type::Map { .. } => Value::Map(Vec::new()),
            Type::Tuple { item_types, .. } => Value::Tuple(
                item_types.iter().map(|t| t.default_value(settings)).collect(),
            ),
            Type::Nullable { .. } | Type::Variant { .. } => Value::Null,
            Type::LowCardinality { nested_type } => {
                nested_type.default_value(settings)
            }
        }
    }

    /// Whether `value` has exactly the shape a writer of this type stores
    ///
    /// No numeric conversion is applied, so `Int64(1)` is not accepted by
    /// `Int32`. Variant writers classify rows with this.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Type::Nullable { .. }, Value::Null) => true,
            (Type::Variant { .. }, Value::Null) => true,
            (Type::Simple(TypeCode::Nothing), Value::Null) => true,
            (Type::Simple(code), value) => matches!(
                (code, value),
                (TypeCode::Bool, Value::Bool(_))
                    | (TypeCode::Int8, Value::Int8(_))
                    | (TypeCode::Int16, Value::Int16(_))
                    | (TypeCode::Int32, Value::Int32(_))
                    | (TypeCode::Int64, Value::Int64(_))
                    | (TypeCode::Int128, Value::Int128(_))
                    | (TypeCode::UInt8, Value::UInt8(_))
                    | (TypeCode::UInt16, Value::UInt16(_))
                    | (TypeCode::UInt32, Value::UInt32(_))
                    | (TypeCode::UInt64, Value::UInt64(_))
                    | (TypeCode::UInt128, Value::UInt128(_))
                    | (TypeCode::Float32, Value::Float32(_))
                    | (TypeCode::Float64, Value::Float64(_))
                    | (TypeCode::String, Value::String(_))
                    | (TypeCode::UUID, Value::Uuid(_))
                    | (TypeCode::IPv4, Value::Ipv4(_))
                    | (TypeCode::IPv6, Value::Ipv6(_))
                    | (TypeCode::Date | TypeCode::Date32, Value::Date(_))
            ),
            (Type::FixedString { size }, Value::Bytes(bytes)) => {
                bytes.len() <= *size
            }
            (
                Type::DateTime { .. } | Type::DateTime64 { .. },
                Value::DateTime(_) | Value::NaiveDateTime(_),
            ) => true,
            (
                Type::Decimal { .. },
                Value::Decimal(_) | Value::WideDecimal { .. },
            ) => true,
            (Type::Enum8 { .. } | Type::Enum16 { .. }, Value::String(name)) => {
                self.get_enum_value(name).is_some()
            }
            (Type::Array { item_type }, Value::Array(items)) => {
                items.iter().all(|v| item_type.accepts(v))
            }
            (Type::Tuple { item_types, .. }, Value::Tuple(items)) => {
                item_types.len() == items.len()
                    && item_types.iter().zip(items).all(|(t, v)| t.accepts(v))
            }
            (Type::Map { key_type, value_type }, Value::Map(entries)) => {
                entries
                    .iter()
                    .all(|(k, v)| key_type.accepts(k) && value_type.accepts(v))
            }
            (Type::Nullable { nested_type }, value)
            | (Type::LowCardinality { nested_type }, value) => {
                nested_type.accepts(value)
            }
            (Type::Variant { variants }, value) => {
                variants.iter().any(|t| t.accepts(value))
            }
            _ => false,
        }
    }

    /// Parse a type from its name with the built-in registry
    ///
    /// Resolved names are cached per thread.
    pub fn parse(type_str: &str) -> Result<Self> {
        parse_type_name(type_str)
    }

    /// Create a reader for `rows` rows of this type
    pub fn create_reader(
        &self,
        rows: usize,
        settings: &CodecSettings,
    ) -> Result<Box<dyn ColumnReader>> {
        column_stream::create_reader(self, rows, settings)
    }

    /// Create a reader for the given serialization kind
    pub fn create_reader_for(
        &self,
        rows: usize,
        kind: SerializationKind,
        settings: &CodecSettings,
    ) -> Result<Box<dyn ColumnReader>> {
        column_stream::create_reader_for(self, rows, kind, settings)
    }

    /// Create a reader that advances over `rows` rows without keeping them
    pub fn create_skip_reader(
        &self,
        rows: usize,
    ) -> Result<Box<dyn ColumnSkipper>> {
        column_stream::create_skipper(self, rows)
    }

    pub fn create_skip_reader_for(
        &self,
        rows: usize,
        kind: SerializationKind,
    ) -> Result<Box<dyn ColumnSkipper>> {
        column_stream::create_skipper_for(self, rows, kind)
    }

    /// Create a writer for `rows`
    ///
    /// Rows are converted up front, so a value that does not fit the type
    /// fails here rather than mid-stream.
    pub fn create_writer(
        &self,
        rows: Vec<Value>,
        settings: &CodecSettings,
    ) -> Result<Box<dyn ColumnWriter>> {
        column_stream::create_writer(self, rows, settings)
    }

    pub fn create_writer_for(
        &self,
        rows: Vec<Value>,
        kind: SerializationKind,
        settings: &CodecSettings,
    ) -> Result<Box<dyn ColumnWriter>> {
        column_stream::create_writer_for(self, rows, kind, settings)
    }

    /// Render `value` as a SQL literal of this type
    pub fn format_literal(
        &self,
        value: &Value,
        settings: &CodecSettings,
    ) -> Result<String> {
        literal::format_literal(self, value, settings)
    }

    /// Render `value` as `CAST(<literal> AS <type>)`
    pub fn format_parameter(
        &self,
        value: &Value,
        settings: &CodecSettings,
    ) -> Result<String> {
        literal::format_parameter(self, value, settings)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}


fn format_enum_items(items: &[EnumItem]) -> String {
    let formatted: Vec<String> = items
        .iter()
        .map(|item| format!("{} = {}", literal::quote(&item.name), item.value))
        .collect();
    formatted.join(", ")
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_type_code_name() {
        assert_eq!(TypeCode::Int32.name(), "Int32");
        assert_eq!(TypeCode::Nothing.name(), "Nothing");
        assert_eq!(TypeCode::Variant.name(), "Variant");
    }

    #[test]
    fn test_fixed_string_type() {
        let t = Type::fixed_string(10);
        assert_eq!(t.code(), TypeCode::FixedString);
        assert_eq!(t.name(), "FixedString(10)");
    }

    #[test]
    fn test_composite_names() {
        assert_eq!(Type::array(Type::int32()).name(), "Array(Int32)");
        assert_eq!(
            Type::tuple(vec![Type::int32(), Type::string()]).name(),
            "Tuple(Int32, String)"
        );
        assert_eq!(
            Type::named_tuple(
                vec![Type::uint64(), Type::string()],
                vec!["id".to_string(), "name".to_string()]
            )
            .name(),
            "Tuple(id UInt64, name String)"
        );
        assert_eq!(
            Type::map(Type::string(), Type::int32()).name(),
            "Map(String, Int32)"
        );
        assert_eq!(
            Type::variant(vec![Type::int32(), Type::string()]).name(),
            "Variant(Int32, String)"
        );
    }

    #[test]
    fn test_datetime_with_timezone() {
        let t = Type::datetime(Some(Tz::UTC));
        assert_eq!(t.name(), "DateTime('UTC')");
        let t = Type::datetime64(3, Some(Tz::Europe__Moscow));
        assert_eq!(t.name(), "DateTime64(3, 'Europe/Moscow')");
    }

    #[test]
    fn test_enum_name_escapes_quotes() {
        let t = Type::enum8(vec![EnumItem { name: "it's".into(), value: 1 }]);
        assert_eq!(t.name(), "Enum8('it\\'s' = 1)");
    }

    #[test]
    fn test_decimal_storage() {
        assert_eq!(Type::decimal(9, 2).storage_size_bytes(), Some(4));
        assert_eq!(Type::decimal(18, 2).storage_size_bytes(), Some(8));
        assert_eq!(Type::decimal(38, 2).storage_size_bytes(), Some(16));
    }

    #[test]
    fn test_fully_specified() {
        assert!(Type::array(Type::int8()).is_fully_specified());
        assert!(!Type::array(Type::Unspecified(TypeCode::Decimal))
            .is_fully_specified());
    }

    #[test]
    fn test_default_values() {
        let settings = CodecSettings::default();
        assert_eq!(Type::int32().default_value(&settings), Value::Int32(0));
        let e = Type::enum8(vec![
            EnumItem { name: "b".into(), value: 5 },
            EnumItem { name: "a".into(), value: -3 },
        ]);
        assert_eq!(e.default_value(&settings), Value::String("a".into()));
        assert_eq!(
            Type::nullable(Type::int32()).default_value(&settings),
            Value::Null
        );
        assert_eq!(
            Type::tuple(vec![Type::uint8(), Type::string()])
                .default_value(&settings),
            Value::Tuple(vec![Value::UInt8(0), Value::String(String::new())])
        );
    }

    #[test]
    fn test_accepts_is_strict() {
        assert!(Type::int32().accepts(&Value::Int32(1)));
        assert!(!Type::int32().accepts(&Value::Int64(1)));
        assert!(!Type::int32().accepts(&Value::Null));
        assert!(Type::nullable(Type::int32()).accepts(&Value::Null));
        assert!(Type::array(Type::string())
            .accepts(&Value::Array(vec![Value::from("x")])));
        assert!(!Type::array(Type::string())
            .accepts(&Value::Array(vec![Value::Int8(1)])));
    }

    #[test]
    fn test_parse_round_trips_name() {
        for name in [
            "Array(Nullable(String))",
            "Map(String, Array(Nullable(Decimal(18, 4))))",
            "LowCardinality(Nullable(String))",
            "Tuple(a Int8, b DateTime64(3, 'UTC'))",
            "Enum16('x' = -2, 'y' = 300)",
            "Variant(Int32, String)",
        ] {
            assert_eq!(Type::parse(name).unwrap().name(), name);
        }
    }
}
