// Incremental decoding must not depend on where the input is split
// A column read from arbitrarily fragmented input equals the column read
// from one contiguous buffer, and the skip reader passes the same bytes

mod common;

use chrono::TimeZone;
use clickhouse_column_codec::{
    io::column_stream::SerializationKind,
    Type,
    Value,
};
use common::{
    decode_as,
    decode_split_as,
    encode_as,
    skipped_bytes_as,
    values,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn split_points(len: usize, raw: &[u16]) -> Vec<usize> {
    raw.iter().map(|&b| b as usize % (len + 1)).collect()
}

fn check_any_split(
    type_: &Type,
    rows: &[Value],
    raw_splits: &[u16],
    write_chunk: usize,
) {
    let kind = SerializationKind::Default;
    check_any_split_as(type_, kind, rows, raw_splits, write_chunk);
}

fn check_any_split_as(
    type_: &Type,
    kind: SerializationKind,
    rows: &[Value],
    raw_splits: &[u16],
    write_chunk: usize,
) {
    let count = rows.len();
    let bytes = encode_as(type_, rows, kind, write_chunk);
    let whole = values(&decode_as(type_, count, kind, &bytes, bytes.len().max(1)));
    assert_eq!(whole, rows);

    let boundaries = split_points(bytes.len(), raw_splits);
    let fragmented =
        values(&decode_split_as(type_, count, kind, &bytes, &boundaries));
    assert_eq!(fragmented, whole);

    // One byte at a time is the most fragmented input possible
    let bytewise = values(&decode_as(type_, count, kind, &bytes, 1));
    assert_eq!(bytewise, whole);

    assert_eq!(skipped_bytes_as(type_, count, kind, &bytes, 1), bytes.len());
}

fn opt_string() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        "[a-z]{0,12}".prop_map(Value::String),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_array_nullable_string_any_split(
        rows in prop::collection::vec(
            prop::collection::vec(opt_string(), 0..6).prop_map(Value::Array),
            0..20
        ),
        splits in prop::collection::vec(any::<u16>(), 0..24),
        write_chunk in 1usize..64,
    ) {
        let type_ = Type::parse("Array(Nullable(String))").unwrap();
        check_any_split(&type_, &rows, &splits, write_chunk);
    }

    #[test]
    fn test_low_cardinality_any_split(
        rows in prop::collection::vec(opt_string(), 0..40),
        splits in prop::collection::vec(any::<u16>(), 0..24),
        write_chunk in 1usize..64,
    ) {
        let type_ = Type::parse("LowCardinality(Nullable(String))").unwrap();
        check_any_split(&type_, &rows, &splits, write_chunk);
    }

    #[test]
    fn test_map_any_split(
        rows in prop::collection::vec(
            prop::collection::vec(("[a-c]{1,3}", any::<i64>()), 0..5).prop_map(|entries| {
                Value::Map(
                    entries
                        .into_iter()
                        .map(|(k, v)| (Value::String(k), Value::Int64(v)))
                        .collect(),
                )
            }),
            0..12
        ),
        splits in prop::collection::vec(any::<u16>(), 0..24),
    ) {
        let type_ = Type::parse("Map(String, Int64)").unwrap();
        check_any_split(&type_, &rows, &splits, 16);
    }

    #[test]
    fn test_variant_any_split(
        rows in prop::collection::vec(
            prop_oneof![
                Just(Value::Null),
                any::<i32>().prop_map(Value::Int32),
                "[a-z]{0,8}".prop_map(Value::String),
            ],
            0..30
        ),
        splits in prop::collection::vec(any::<u16>(), 0..24),
    ) {
        let type_ = Type::parse("Variant(Int32, String)").unwrap();
        check_any_split(&type_, &rows, &splits, 8);
    }

    #[test]
    fn test_tuple_any_split(
        rows in prop::collection::vec(
            (any::<u16>(), opt_string()).prop_map(|(n, s)| {
                Value::Tuple(vec![Value::UInt16(n), s])
            }),
            0..20
        ),
        splits in prop::collection::vec(any::<u16>(), 0..24),
    ) {
        let type_ = Type::parse("Tuple(UInt16, Nullable(String))").unwrap();
        check_any_split(&type_, &rows, &splits, 5);
    }

    #[test]
    fn test_sparse_nullable_string_any_split(
        rows in prop::collection::vec(
            prop_oneof![
                4 => Just(Value::Null),
                1 => "[a-z]{0,6}".prop_map(Value::String),
            ],
            0..40
        ),
        splits in prop::collection::vec(any::<u16>(), 0..24),
        write_chunk in 1usize..32,
    ) {
        let type_ = Type::parse("Nullable(String)").unwrap();
        check_any_split_as(
            &type_,
            SerializationKind::Sparse,
            &rows,
            &splits,
            write_chunk,
        );
    }

    #[test]
    fn test_array_low_cardinality_any_split(
        rows in prop::collection::vec(
            prop::collection::vec(
                prop_oneof![
                    Just(Value::Null),
                    "[a-c]{0,2}".prop_map(Value::String),
                ],
                0..5
            )
            .prop_map(Value::Array),
            0..16
        ),
        splits in prop::collection::vec(any::<u16>(), 0..24),
        write_chunk in 1usize..48,
    ) {
        // The dictionary prefix sits ahead of the offsets and is replayed
        let type_ =
            Type::parse("Array(LowCardinality(Nullable(String)))").unwrap();
        check_any_split(&type_, &rows, &splits, write_chunk);
    }

    #[test]
    fn test_decimal_any_split(
        rows in prop::collection::vec(
            (-999_999_999_999_999i64..=999_999_999_999_999)
                .prop_map(|m| Value::Decimal(Decimal::new(m, 4))),
            0..30
        ),
        splits in prop::collection::vec(any::<u16>(), 0..24),
        write_chunk in 1usize..32,
    ) {
        let type_ = Type::parse("Decimal(18, 4)").unwrap();
        check_any_split(&type_, &rows, &splits, write_chunk);
    }

    #[test]
    fn test_sparse_decimal_any_split(
        rows in prop::collection::vec(
            prop_oneof![
                3 => Just(0i64),
                1 => any::<i32>().prop_map(i64::from),
            ]
            .prop_map(|m| Value::Decimal(Decimal::new(m, 4))),
            0..40
        ),
        splits in prop::collection::vec(any::<u16>(), 0..24),
    ) {
        let type_ = Type::parse("Decimal(18, 4)").unwrap();
        check_any_split_as(&type_, SerializationKind::Sparse, &rows, &splits, 7);
    }

    #[test]
    fn test_datetime64_any_split(
        rows in prop::collection::vec(
            (0i64..4_102_444_800_000).prop_map(|millis| {
                Value::DateTime(
                    chrono_tz::UTC.timestamp_millis_opt(millis).unwrap(),
                )
            }),
            0..30
        ),
        splits in prop::collection::vec(any::<u16>(), 0..24),
    ) {
        let type_ = Type::parse("DateTime64(3, 'UTC')").unwrap();
        check_any_split(&type_, &rows, &splits, 11);
    }
}
