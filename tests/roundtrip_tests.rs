// Write/skip/read round trips for every column kind
// Each case writes through small output windows and reads through small
// input windows, so every row crosses several buffer boundaries

mod common;

use bytes::Bytes;
use chrono::{
    NaiveDate,
    TimeZone,
};
use chrono_tz::Tz;
use clickhouse_column_codec::{
    Type,
    Value,
};
use common::roundtrip;
use rust_decimal::Decimal;
use std::{
    net::{
        Ipv4Addr,
        Ipv6Addr,
    },
    str::FromStr,
};
use uuid::Uuid;

fn check(type_name: &str, rows: Vec<Value>) {
    let type_ = Type::parse(type_name).expect("Failed to parse type");
    assert_eq!(roundtrip(&type_, &rows), rows, "round trip of {}", type_name);
}

fn string(s: &str) -> Value {
    Value::String(s.to_string())
}

#[test]
fn test_integers() {
    check("Int8", vec![Value::Int8(i8::MIN), Value::Int8(0), Value::Int8(i8::MAX)]);
    check("Int32", (0..100).map(|i| Value::Int32(i * 1_000 - 7)).collect());
    check("UInt64", vec![Value::UInt64(0), Value::UInt64(u64::MAX)]);
    check(
        "Int128",
        vec![Value::Int128(i128::MIN), Value::Int128(-1), Value::Int128(i128::MAX)],
    );
    check("UInt128", vec![Value::UInt128(u128::MAX), Value::UInt128(1)]);
}

#[test]
fn test_floats_and_bool() {
    check(
        "Float64",
        vec![Value::Float64(-1.5), Value::Float64(f64::MAX), Value::Float64(0.0)],
    );
    check("Float32", vec![Value::Float32(3.25), Value::Float32(f32::MIN)]);
    check("Bool", vec![Value::Bool(true), Value::Bool(false)]);
}

#[test]
fn test_strings() {
    check("String", vec![string(""), string("hello"), string(&"x".repeat(300))]);
    check("String", Vec::new());
}

#[test]
fn test_fixed_string_pads_with_zeros() {
    check(
        "FixedString(4)",
        vec![
            Value::Bytes(Bytes::from_static(b"abcd")),
            Value::Bytes(Bytes::from_static(b"\0\0\0\0")),
        ],
    );

    let type_ = Type::fixed_string(4);
    let rows = roundtrip(&type_, &[Value::Bytes(Bytes::from_static(b"ab"))]);
    assert_eq!(rows, vec![Value::Bytes(Bytes::from_static(b"ab\0\0"))]);
}

#[test]
fn test_network_and_uuid() {
    check(
        "UUID",
        vec![
            Value::Uuid(Uuid::nil()),
            Value::Uuid(
                Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
            ),
        ],
    );
    check(
        "IPv4",
        vec![
            Value::Ipv4(Ipv4Addr::new(192, 168, 1, 1)),
            Value::Ipv4(Ipv4Addr::BROADCAST),
        ],
    );
    check(
        "IPv6",
        vec![Value::Ipv6(Ipv6Addr::LOCALHOST), Value::Ipv6(Ipv6Addr::UNSPECIFIED)],
    );
}

#[test]
fn test_dates() {
    let date = |y, m, d| Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap());
    check("Date", vec![date(1970, 1, 1), date(2024, 2, 29), date(2149, 6, 6)]);
    check("Date32", vec![date(1900, 1, 1), date(1969, 12, 31), date(2299, 12, 31)]);
}

#[test]
fn test_datetimes() {
    let moscow: Tz = "Europe/Moscow".parse().unwrap();
    check(
        "DateTime('Europe/Moscow')",
        vec![Value::DateTime(moscow.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap())],
    );
    check(
        "DateTime",
        vec![Value::DateTime(Tz::UTC.with_ymd_and_hms(2000, 1, 1, 0, 0, 1).unwrap())],
    );

    let instant = Tz::UTC
        .with_ymd_and_hms(2023, 6, 1, 12, 0, 0)
        .unwrap()
        + chrono::Duration::milliseconds(123);
    check("DateTime64(3, 'UTC')", vec![Value::DateTime(instant)]);
}

#[test]
fn test_naive_datetime_uses_column_zone() {
    let moscow: Tz = "Europe/Moscow".parse().unwrap();
    let wall = NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap();
    let type_ = Type::parse("DateTime('Europe/Moscow')").unwrap();
    let rows = roundtrip(&type_, &[Value::NaiveDateTime(wall)]);
    assert_eq!(
        rows,
        vec![Value::DateTime(moscow.from_local_datetime(&wall).unwrap())]
    );
}

#[test]
fn test_decimals() {
    let dec = |s: &str| Value::Decimal(Decimal::from_str(s).unwrap());
    check("Decimal(9, 2)", vec![dec("1.25"), dec("-99.99"), dec("0.00")]);
    check("Decimal(18, 4)", vec![dec("12345678.9012")]);
    check("Decimal(38, 10)", vec![dec("-1234567890.0123456789")]);

    // Outside rust_decimal's mantissa or scale
    let big = 10i128.pow(30);
    check(
        "Decimal(38, 0)",
        vec![
            Value::WideDecimal { mantissa: big, scale: 0 },
            Value::WideDecimal { mantissa: -big, scale: 0 },
            dec("42"),
        ],
    );
    check(
        "Decimal(38, 30)",
        vec![Value::WideDecimal { mantissa: 15 * 10i128.pow(29), scale: 30 }],
    );
}

#[test]
fn test_enums() {
    check(
        "Enum8('red' = 1, 'green' = 2)",
        vec![string("green"), string("red"), string("green")],
    );
    check("Enum16('low' = -1000, 'high' = 1000)", vec![string("high"), string("low")]);
}

#[test]
fn test_nothing() {
    check("Nothing", vec![Value::Null; 3]);
    check("Nullable(Nothing)", vec![Value::Null; 2]);
}

#[test]
fn test_nullable() {
    check(
        "Nullable(String)",
        vec![string("a"), Value::Null, string(""), Value::Null],
    );
    check("Nullable(UInt8)", vec![Value::Null, Value::UInt8(7)]);
}

#[test]
fn test_arrays() {
    check(
        "Array(Int32)",
        vec![
            Value::Array(vec![Value::Int32(1), Value::Int32(2)]),
            Value::Array(vec![]),
            Value::Array(vec![Value::Int32(3)]),
        ],
    );
    check(
        "Array(Array(Nullable(String)))",
        vec![
            Value::Array(vec![
                Value::Array(vec![string("a"), Value::Null]),
                Value::Array(vec![]),
            ]),
            Value::Array(vec![]),
            Value::Array(vec![Value::Array(vec![string("b")])]),
        ],
    );
}

#[test]
fn test_tuples() {
    check(
        "Tuple(UInt8, String, Nullable(Int64))",
        vec![
            Value::Tuple(vec![Value::UInt8(1), string("one"), Value::Null]),
            Value::Tuple(vec![Value::UInt8(2), string("two"), Value::Int64(-2)]),
        ],
    );
    check(
        "Tuple(id UInt64, tags Array(String))",
        vec![Value::Tuple(vec![
            Value::UInt64(9),
            Value::Array(vec![string("x"), string("y")]),
        ])],
    );
}

#[test]
fn test_maps() {
    check(
        "Map(String, UInt64)",
        vec![
            Value::Map(vec![(string("a"), Value::UInt64(1)), (string("b"), Value::UInt64(2))]),
            Value::Map(vec![]),
        ],
    );
    check(
        "Map(LowCardinality(String), Array(Nullable(Int32)))",
        vec![Value::Map(vec![(
            string("k"),
            Value::Array(vec![Value::Int32(1), Value::Null]),
        )])],
    );
}

#[test]
fn test_low_cardinality() {
    check(
        "LowCardinality(String)",
        vec![string("a"), string("b"), string("a"), string("")],
    );
    check(
        "LowCardinality(Nullable(String))",
        vec![string("a"), Value::Null, string(""), Value::Null],
    );
    check(
        "Array(LowCardinality(String))",
        vec![
            Value::Array(vec![string("x"), string("y")]),
            Value::Array(vec![]),
            Value::Array(vec![string("x")]),
        ],
    );
    check("LowCardinality(UInt32)", vec![Value::UInt32(5), Value::UInt32(5)]);
}

#[test]
fn test_variant() {
    check(
        "Variant(Int32, String)",
        vec![Value::Int32(42), string("x"), Value::Null, Value::Int32(-1)],
    );
    check(
        "Array(Variant(Array(UInt8), String))",
        vec![Value::Array(vec![
            Value::Array(vec![Value::UInt8(1)]),
            string("s"),
            Value::Null,
        ])],
    );
}

#[test]
fn test_zero_rows_of_every_composite() {
    for name in [
        "Array(String)",
        "Nullable(Int32)",
        "Tuple(Int8, String)",
        "Map(String, Int32)",
        "LowCardinality(String)",
        "Variant(Int32, String)",
    ] {
        check(name, Vec::new());
    }
}
