// LowCardinality wire layout and dictionary behavior

mod common;

use clickhouse_column_codec::{
    column::{
        lowcardinality::Keys,
        LowCardinalityColumn,
    },
    io::column_stream::read_column,
    CodecSettings,
    ColumnRefExt,
    Error,
    TableColumn,
    Type,
    TypedColumn,
    Value,
};
use common::{
    decode,
    encode,
    roundtrip,
    values,
};

fn lc_string() -> Type {
    Type::parse("LowCardinality(String)").unwrap()
}

fn distinct_strings(n: usize) -> Vec<Value> {
    (0..n).map(|i| Value::String(format!("value_{}", i))).collect()
}

fn serialization_type(bytes: &[u8]) -> u64 {
    u64::from_le_bytes(bytes[8..16].try_into().unwrap())
}

fn dictionary_size(bytes: &[u8]) -> u64 {
    u64::from_le_bytes(bytes[16..24].try_into().unwrap())
}

#[test]
fn test_prefix_is_shared_dictionary_version() {
    let bytes = encode(&lc_string(), &distinct_strings(1), 64);
    assert_eq!(&bytes[..8], &1u64.to_le_bytes());
    // Additional keys flag is always set on written blocks
    assert_eq!(serialization_type(&bytes) & (1 << 9), 1 << 9);
}

#[test]
fn test_key_width_switches_above_256_entries() {
    // The default value occupies dictionary slot 0
    let rows = distinct_strings(255);
    let bytes = encode(&lc_string(), &rows, 1024);
    assert_eq!(serialization_type(&bytes) & 0xFF, 0);
    assert_eq!(dictionary_size(&bytes), 256);
    assert_eq!(values(&decode(&lc_string(), rows.len(), &bytes, 100)), rows);

    let rows = distinct_strings(256);
    let bytes = encode(&lc_string(), &rows, 1024);
    assert_eq!(serialization_type(&bytes) & 0xFF, 1);
    assert_eq!(dictionary_size(&bytes), 257);

    let column = decode(&lc_string(), rows.len(), &bytes, 100);
    assert_eq!(values(&column), rows);
    let lc = column
        .as_any()
        .downcast_ref::<LowCardinalityColumn>()
        .expect("Expected LowCardinality column");
    assert!(matches!(lc.keys(), Keys::U16(_)));
}

#[test]
fn test_repeated_values_share_dictionary_entries() {
    let rows: Vec<Value> = ["b", "a", "b", "b", "", "a"]
        .iter()
        .map(|s| Value::String(s.to_string()))
        .collect();
    let bytes = encode(&lc_string(), &rows, 32);
    // default, b, a
    assert_eq!(dictionary_size(&bytes), 3);

    let column = decode(&lc_string(), rows.len(), &bytes, 4);
    let lc = column.as_any().downcast_ref::<LowCardinalityColumn>().unwrap();
    assert_eq!(lc.dictionary().row_count(), 3);
    assert_eq!(lc.key_at(0).unwrap(), lc.key_at(2).unwrap());
    assert_eq!(lc.key_at(4).unwrap(), 0);
    assert_eq!(values(&column), rows);
}

#[test]
fn test_nullable_dictionary_reserves_null_slot() {
    let type_ = Type::parse("LowCardinality(Nullable(String))").unwrap();
    let rows = vec![
        Value::Null,
        Value::String("x".to_string()),
        Value::String(String::new()),
        Value::Null,
    ];
    let column = decode(&type_, rows.len(), &encode(&type_, &rows, 16), 3);
    assert!(column.is_null(0));
    assert!(!column.is_null(2));
    assert!(column.is_null(3));
    assert_eq!(values(&column), rows);

    let view = column.try_reinterpret::<Option<String>>().unwrap();
    assert_eq!(view.get(1).unwrap(), Some("x".to_string()));
    assert_eq!(view.get(3).unwrap(), None);
}

#[test]
fn test_numeric_dictionary() {
    let type_ = Type::parse("LowCardinality(Int64)").unwrap();
    let rows: Vec<Value> = (0..50).map(|i| Value::Int64(i % 4 - 2)).collect();
    assert_eq!(roundtrip(&type_, &rows), rows);
}

#[test]
fn test_invalid_nested_types() {
    let settings = CodecSettings::default();
    for name in [
        "LowCardinality(Array(String))",
        "LowCardinality(Nullable(Array(String)))",
    ] {
        let type_ = Type::parse(name).unwrap();
        assert!(matches!(
            type_.create_reader(1, &settings),
            Err(Error::TypeNotSupported(_))
        ));
    }
}

fn lc_block(serialization_type: u64, keys: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1u64.to_le_bytes());
    bytes.extend_from_slice(&serialization_type.to_le_bytes());
    bytes.extend_from_slice(&2u64.to_le_bytes());
    bytes.push(0);
    bytes.push(1);
    bytes.push(b'a');
    bytes.extend_from_slice(&(keys.len() as u64).to_le_bytes());
    bytes.extend_from_slice(keys);
    bytes
}

fn read_raw(bytes: &[u8], rows: usize) -> clickhouse_column_codec::Result<Vec<Value>> {
    let reader = lc_string().create_reader(rows, &CodecSettings::default())?;
    let outcome = read_column(reader, rows, bytes, 3)?;
    outcome.column.values()
}

#[test]
fn test_hand_built_block() {
    let rows = read_raw(&lc_block(1 << 9, &[1, 0, 1]), 3).unwrap();
    assert_eq!(
        rows,
        vec![
            Value::String("a".to_string()),
            Value::String(String::new()),
            Value::String("a".to_string()),
        ]
    );
}

#[test]
fn test_key_out_of_dictionary_range() {
    assert!(matches!(
        read_raw(&lc_block(1 << 9, &[0, 2]), 2),
        Err(Error::Protocol(_))
    ));
}

#[test]
fn test_global_dictionary_rejected() {
    assert!(matches!(
        read_raw(&lc_block((1 << 9) | (1 << 8), &[0]), 1),
        Err(Error::Protocol(_))
    ));
}

#[test]
fn test_missing_additional_keys_rejected() {
    assert!(matches!(read_raw(&lc_block(0, &[0]), 1), Err(Error::Protocol(_))));
}

#[test]
fn test_row_count_mismatch() {
    assert!(matches!(
        read_raw(&lc_block(1 << 9, &[0, 1]), 3),
        Err(Error::Protocol(_))
    ));
}
