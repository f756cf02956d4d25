//! SQL literal rendering for query parameters
//!
//! Values are rendered in the form ClickHouse parses back into the same
//! value of the column type: quoted and escaped strings, dates and times as
//! quoted text in the column's zone, decimals at the column scale.

use crate::{
    column::{
        date,
        decimal,
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
use std::{
    fmt::Write,
    net::{
        Ipv4Addr,
        Ipv6Addr,
    },
};
use uuid::Uuid;

/// Single-quote and escape text
pub fn quote(text: &str) -> String {
    quote_bytes(text.as_bytes())
}

/// Single-quote and escape raw bytes; non-UTF-8 bytes are kept as `\xHH`
pub fn quote_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('\'');
    let mut rest = bytes;
    while !rest.is_empty() {
        match std::str::from_utf8(rest) {
            Ok(text) => {
                push_escaped(&mut out, text);
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                push_escaped(&mut out, std::str::from_utf8(valid).unwrap_or_default());
                let invalid = e.error_len().unwrap_or(after.len());
                for b in &after[..invalid] {
                    let _ = write!(out, "\\x{:02X}", b);
                }
                rest = &after[invalid..];
            }
        }
    }
    out.push('\'');
    out
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\u{8}' => out.push_str("\\b"),
            c if c.is_ascii_control() => {
                let _ = write!(out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
}

/// Render `value` as a literal of `type_`
pub fn format_literal(
    type_: &Type,
    value: &Value,
    settings: &CodecSettings,
) -> Result<String> {
    if value.is_null() {
        return match type_ {
            Type::Nullable { .. }
            | Type::Variant { .. }
            | Type::Simple(TypeCode::Nothing) => Ok("NULL".to_string()),
            Type::LowCardinality { nested_type } => {
                format_literal(nested_type, value, settings)
            }
            _ => Err(Error::type_mismatch(type_.name(), value.kind_name())),
        };
    }

    match type_ {
        Type::Unspecified(_) => {
            Err(Error::TypeNotFullySpecified(type_.name()))
        }
        Type::Simple(code) => format_simple(type_, *code, value),
        Type::FixedString { .. } => match value {
            Value::String(s) => Ok(quote(s)),
            Value::Bytes(b) => Ok(quote_bytes(b)),
            _ => Err(Error::type_mismatch(type_.name(), value.kind_name())),
        },
        Type::DateTime { .. } | Type::DateTime64 { .. } => {
            date::format_datetime_literal(type_, value, settings).map(|s| quote(&s))
        }
        Type::Decimal { precision, scale } => {
            let mantissa = decimal::scaled_mantissa(value, *precision, *scale)?;
            Ok(decimal::format_decimal(mantissa, *scale))
        }
        Type::Enum8 { .. } | Type::Enum16 { .. } => {
            let name = match value {
                Value::String(name) if type_.get_enum_value(name).is_some() => {
                    name.as_str()
                }
                other => {
                    let number = i16::from_value(other.clone())?;
                    type_.get_enum_name(number).ok_or_else(|| {
                        Error::InvalidArgument(format!(
                            "{} is not an item of {}",
                            number,
                            type_.name()
                        ))
                    })?
                }
            };
            Ok(quote(name))
        }
        Type::Nullable { nested_type }
        | Type::LowCardinality { nested_type } => {
            format_literal(nested_type, value, settings)
        }
        Type::Array { item_type } => {
            let Value::Array(items) = value else {
                return Err(Error::type_mismatch(type_.name(), value.kind_name()));
            };
            let items = items
                .iter()
                .map(|v| format_literal(item_type, v, settings))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("[{}]", items.join(", ")))
        }
        Type::Tuple { item_types, .. } => {
            let Value::Tuple(items) = value else {
                return Err(Error::type_mismatch(type_.name(), value.kind_name()));
            };
            if items.len() != item_types.len() {
                return Err(Error::type_mismatch(
                    type_.name(),
                    format!("Tuple of {} elements", items.len()),
                ));
            }
            let items = item_types
                .iter()
                .zip(items)
                .map(|(t, v)| format_literal(t, v, settings))
                .collect::<Result<Vec<_>>>()?;
            if items.len() == 1 {
                Ok(format!("tuple({})", items[0]))
            } else {
                Ok(format!("({})", items.join(", ")))
            }
        }
        Type::Map { key_type, value_type } => {
            let Value::Map(entries) = value else {
                return Err(Error::type_mismatch(type_.name(), value.kind_name()));
            };
            let mut parts = Vec::with_capacity(entries.len() * 2);
            for (k, v) in entries {
                parts.push(format_literal(key_type, k, settings)?);
                parts.push(format_literal(value_type, v, settings)?);
            }
            Ok(format!("map({})", parts.join(", ")))
        }
        Type::Variant { variants } => {
            let alternative =
                variants.iter().find(|t| t.accepts(value)).ok_or_else(|| {
                    Error::TypeNotSupported(format!(
                        "{} value for {}",
                        value.kind_name(),
                        type_.name()
                    ))
                })?;
            format_literal(alternative, value, settings)
        }
    }
}

fn format_simple(type_: &Type, code: TypeCode, value: &Value) -> Result<String> {
    let value = value.clone();
    let text = match code {
        TypeCode::Bool => bool::from_value(value)?.to_string(),
        TypeCode::Int8 => i8::from_value(value)?.to_string(),
        TypeCode::Int16 => i16::from_value(value)?.to_string(),
        TypeCode::Int32 => i32::from_value(value)?.to_string(),
        TypeCode::Int64 => i64::from_value(value)?.to_string(),
        TypeCode::Int128 => i128::from_value(value)?.to_string(),
        TypeCode::UInt8 => u8::from_value(value)?.to_string(),
        TypeCode::UInt16 => u16::from_value(value)?.to_string(),
        TypeCode::UInt32 => u32::from_value(value)?.to_string(),
        TypeCode::UInt64 => u64::from_value(value)?.to_string(),
        TypeCode::UInt128 => u128::from_value(value)?.to_string(),
        TypeCode::Float32 => format_float(f64::from(f32::from_value(value)?)),
        TypeCode::Float64 => format_float(f64::from_value(value)?),
        TypeCode::String => match value {
            Value::String(s) => quote(&s),
            Value::Bytes(b) => quote_bytes(&b),
            other => {
                return Err(Error::type_mismatch(type_.name(), other.kind_name()))
            }
        },
        TypeCode::UUID => quote(&Uuid::from_value(value)?.to_string()),
        TypeCode::IPv4 => quote(&Ipv4Addr::from_value(value)?.to_string()),
        TypeCode::IPv6 => quote(&Ipv6Addr::from_value(value)?.to_string()),
        TypeCode::Date | TypeCode::Date32 => {
            quote(&date::date_from_value(type_, value)?.format("%Y-%m-%d").to_string())
        }
        _ => return Err(Error::TypeNotSupported(type_.name())),
    };
    Ok(text)
}

fn format_float(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value == f64::INFINITY {
        "inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        value.to_string()
    }
}

/// Render `value` as `CAST(<literal> AS <type>)`
pub fn format_parameter(
    type_: &Type,
    value: &Value,
    settings: &CodecSettings,
) -> Result<String> {
    let literal = format_literal(type_, value, settings)?;
    Ok(format!("CAST({} AS {})", literal, type_.name()))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn lit(type_name: &str, value: Value) -> String {
        let type_ = Type::parse(type_name).unwrap();
        format_literal(&type_, &value, &CodecSettings::default()).unwrap()
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a'b\\c\n\t"), "'a\\'b\\\\c\\n\\t'");
        assert_eq!(quote("\u{1}"), "'\\x01'");
        assert_eq!(quote_bytes(&[b'a', 0xFF]), "'a\\xFF'");
    }

    #[test]
    fn test_scalars() {
        assert_eq!(lit("Int32", Value::Int32(-5)), "-5");
        assert_eq!(lit("UInt64", Value::UInt8(5)), "5");
        assert_eq!(lit("Float64", Value::Float64(f64::NAN)), "nan");
        assert_eq!(lit("Bool", Value::Bool(true)), "true");
        assert_eq!(lit("String", Value::from("it's")), "'it\\'s'");
        assert_eq!(
            lit("Date", Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())),
            "'2024-02-29'"
        );
    }

    #[test]
    fn test_decimal_at_column_scale() {
        let value = Value::Decimal(Decimal::from_str("1.5").unwrap());
        assert_eq!(lit("Decimal(9, 3)", value), "1.500");
        let value = Value::Decimal(Decimal::from_str("-0.125").unwrap());
        assert_eq!(lit("Decimal(9, 2)", value), "-0.13");
        let value = Value::WideDecimal {
            mantissa: -(10i128.pow(31)),
            scale: 1,
        };
        assert_eq!(
            lit("Decimal(38, 2)", value),
            format!("-1{}.00", "0".repeat(30))
        );
    }

    #[test]
    fn test_composites() {
        assert_eq!(
            lit(
                "Array(Nullable(Int8))",
                Value::Array(vec![Value::Int8(1), Value::Null])
            ),
            "[1, NULL]"
        );
        assert_eq!(
            lit("Tuple(Int8)", Value::Tuple(vec![Value::Int8(1)])),
            "tuple(1)"
        );
        assert_eq!(
            lit(
                "Tuple(Int8, String)",
                Value::Tuple(vec![Value::Int8(1), Value::from("a")])
            ),
            "(1, 'a')"
        );
        assert_eq!(
            lit(
                "Map(String, UInt8)",
                Value::Map(vec![(Value::from("k"), Value::UInt8(2))])
            ),
            "map('k', 2)"
        );
    }

    #[test]
    fn test_enum_and_variant() {
        assert_eq!(lit("Enum8('a' = 1, 'b' = 2)", Value::Int8(2)), "'b'");
        assert_eq!(lit("Variant(Int32, String)", Value::from("x")), "'x'");
        assert_eq!(lit("Variant(Int32, String)", Value::Null), "NULL");
    }

    #[test]
    fn test_null_for_non_nullable_fails() {
        let result = format_literal(
            &Type::int32(),
            &Value::Null,
            &CodecSettings::default(),
        );
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_parameter() {
        let type_ = Type::parse("DateTime('UTC')").unwrap();
        let value = Value::NaiveDateTime(
            NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(3, 4, 5)
                .unwrap(),
        );
        assert_eq!(
            format_parameter(&type_, &value, &CodecSettings::default()).unwrap(),
            "CAST('2024-01-02 03:04:05' AS DateTime('UTC'))"
        );
    }
}
