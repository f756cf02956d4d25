// Typed views over decoded columns

mod common;

use bytes::Bytes;
use chrono::{
    NaiveDate,
    TimeZone,
};
use chrono_tz::Tz;
use clickhouse_column_codec::{
    ColumnRef,
    ColumnRefExt,
    Type,
    TypedColumn,
    Value,
};
use common::{
    decode,
    encode,
};
use rust_decimal::Decimal;
use std::str::FromStr;

fn column(type_name: &str, rows: &[Value]) -> ColumnRef {
    let type_ = Type::parse(type_name).unwrap();
    decode(&type_, rows.len(), &encode(&type_, rows, 32), 32)
}

fn strings(items: &[&str]) -> Vec<Value> {
    items.iter().map(|s| Value::String(s.to_string())).collect()
}

#[test]
fn test_numeric_widening_only() {
    let col = column("Int16", &[Value::Int16(-3), Value::Int16(300)]);
    let wide = col.try_reinterpret::<i64>().expect("Int16 widens to i64");
    assert_eq!(wide.get(0).unwrap(), -3);
    assert_eq!(wide.get(1).unwrap(), 300);
    assert!(col.try_reinterpret::<f64>().is_some());

    assert!(col.try_reinterpret::<i8>().is_none());
    assert!(col.try_reinterpret::<u64>().is_none());
    assert!(col.try_reinterpret::<String>().is_none());
}

#[test]
fn test_option_over_nullable() {
    let col = column("Nullable(Int32)", &[Value::Int32(5), Value::Null]);
    let view = col.try_reinterpret::<Option<i64>>().unwrap();
    assert_eq!(view.get(0).unwrap(), Some(5));
    assert_eq!(view.get(1).unwrap(), None);
    assert!(view.is_null(1));

    // Without an Option the stored default shows through
    let plain = col.try_reinterpret::<i32>().unwrap();
    assert_eq!(plain.get(1).unwrap(), 0);
}

#[test]
fn test_strings_and_bytes() {
    let col = column("String", &strings(&["a", "bc"]));
    assert_eq!(col.try_reinterpret::<String>().unwrap().get(1).unwrap(), "bc");
    assert_eq!(
        col.try_reinterpret::<Bytes>().unwrap().get(0).unwrap(),
        Bytes::from_static(b"a")
    );

    let col = column("FixedString(3)", &[Value::Bytes(Bytes::from_static(b"ab"))]);
    assert_eq!(col.try_reinterpret::<String>().unwrap().get(0).unwrap(), "ab");
    assert_eq!(
        col.try_reinterpret::<Bytes>().unwrap().get(0).unwrap(),
        Bytes::from_static(b"ab\0")
    );
}

#[test]
fn test_enum_as_name_or_number() {
    let col = column("Enum8('a' = 1, 'b' = 2)", &strings(&["b", "a"]));
    assert_eq!(col.try_reinterpret::<String>().unwrap().get(0).unwrap(), "b");
    assert_eq!(col.try_reinterpret::<i8>().unwrap().get(1).unwrap(), 1);
}

#[test]
fn test_low_cardinality_is_transparent() {
    let col = column("LowCardinality(String)", &strings(&["x", "y", "x"]));
    let view = col.try_reinterpret::<String>().unwrap();
    assert_eq!(view.row_count(), 3);
    assert_eq!(view.get(2).unwrap(), "x");
}

#[test]
fn test_arrays_and_maps() {
    let col = column(
        "Array(Nullable(String))",
        &[
            Value::Array(vec![Value::String("a".to_string()), Value::Null]),
            Value::Array(vec![]),
        ],
    );
    let view = col.try_reinterpret::<Vec<Option<String>>>().unwrap();
    assert_eq!(view.get(0).unwrap(), vec![Some("a".to_string()), None]);
    assert!(view.get(1).unwrap().is_empty());

    let col = column(
        "Map(String, UInt32)",
        &[Value::Map(vec![(Value::String("k".to_string()), Value::UInt32(1))])],
    );
    let view = col.try_reinterpret::<Vec<(String, u64)>>().unwrap();
    assert_eq!(view.get(0).unwrap(), vec![("k".to_string(), 1)]);
}

#[test]
fn test_tuples() {
    let col = column(
        "Tuple(UInt8, String)",
        &[Value::Tuple(vec![Value::UInt8(1), Value::String("one".to_string())])],
    );
    let view = col.try_reinterpret::<(u32, String)>().unwrap();
    assert_eq!(view.get(0).unwrap(), (1, "one".to_string()));
    assert!(col.try_reinterpret::<(u8,)>().is_none());
    assert!(col.try_reinterpret::<(u8, String, String)>().is_none());
}

#[test]
fn test_wide_tuple_nests_tail() {
    let names: Vec<String> = (0..10).map(|_| "UInt8".to_string()).collect();
    let type_name = format!("Tuple({})", names.join(", "));
    let row = Value::Tuple((0..10).map(Value::UInt8).collect());
    let col = column(&type_name, &[row]);

    type Wide = (u8, u8, u8, u8, u8, u8, u8, (u8, u8, u8));
    let view = col.try_reinterpret::<Wide>().expect("Expected nested tail");
    assert_eq!(view.get(0).unwrap(), (0, 1, 2, 3, 4, 5, 6, (7, 8, 9)));
}

#[test]
fn test_dates_and_decimals() {
    let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let col = column("Date", &[Value::Date(day)]);
    assert_eq!(col.try_reinterpret::<NaiveDate>().unwrap().get(0).unwrap(), day);

    let instant = Tz::UTC.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    let col = column("DateTime('UTC')", &[Value::DateTime(instant)]);
    assert_eq!(
        col.try_reinterpret::<chrono::DateTime<Tz>>().unwrap().get(0).unwrap(),
        instant
    );

    let col = column(
        "Decimal(18, 3)",
        &[Value::Decimal(Decimal::from_str("2.500").unwrap())],
    );
    assert_eq!(
        col.try_reinterpret::<Decimal>().unwrap().get(0).unwrap(),
        Decimal::from_str("2.5").unwrap()
    );
    assert_eq!(col.try_reinterpret::<f64>().unwrap().get(0).unwrap(), 2.5);
}

#[test]
fn test_value_view_accepts_anything() {
    let col = column("Variant(Int32, String)", &[Value::Int32(1), Value::Null]);
    let view = col.try_reinterpret::<Value>().unwrap();
    assert_eq!(view.get(0).unwrap(), Value::Int32(1));
    assert_eq!(view.get(1).unwrap(), Value::Null);
}
