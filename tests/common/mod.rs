#![allow(dead_code)]
/// Common helpers for the codec integration tests
use clickhouse_column_codec::{
    io::column_stream::{
        read_column,
        read_column_split,
        skip_column,
        write_column,
        SerializationKind,
    },
    CodecSettings,
    ColumnRef,
    Type,
    Value,
};

/// Serialize `rows` as `type_`, writing into `chunk`-byte windows
pub fn encode(type_: &Type, rows: &[Value], chunk: usize) -> Vec<u8> {
    encode_as(type_, rows, SerializationKind::Default, chunk)
}

pub fn encode_as(
    type_: &Type,
    rows: &[Value],
    kind: SerializationKind,
    chunk: usize,
) -> Vec<u8> {
    let settings = CodecSettings::default();
    let writer = type_
        .create_writer_for(rows.to_vec(), kind, &settings)
        .expect("Failed to create writer");
    write_column(writer, rows.len(), chunk)
        .expect("Failed to write column")
        .to_vec()
}

/// Read `rows` rows of `type_` from `bytes`, revealing `chunk` bytes at a time
pub fn decode(type_: &Type, rows: usize, bytes: &[u8], chunk: usize) -> ColumnRef {
    decode_as(type_, rows, SerializationKind::Default, bytes, chunk)
}

pub fn decode_as(
    type_: &Type,
    rows: usize,
    kind: SerializationKind,
    bytes: &[u8],
    chunk: usize,
) -> ColumnRef {
    let settings = CodecSettings::default();
    let reader = type_
        .create_reader_for(rows, kind, &settings)
        .expect("Failed to create reader");
    let outcome =
        read_column(reader, rows, bytes, chunk).expect("Failed to read column");
    assert_eq!(outcome.bytes, bytes.len(), "column left unread bytes");
    outcome.column
}

/// Read the column with the input split at the given offsets
pub fn decode_split(
    type_: &Type,
    rows: usize,
    bytes: &[u8],
    boundaries: &[usize],
) -> ColumnRef {
    decode_split_as(type_, rows, SerializationKind::Default, bytes, boundaries)
}

pub fn decode_split_as(
    type_: &Type,
    rows: usize,
    kind: SerializationKind,
    bytes: &[u8],
    boundaries: &[usize],
) -> ColumnRef {
    let settings = CodecSettings::default();
    let reader = type_
        .create_reader_for(rows, kind, &settings)
        .expect("Failed to create reader");
    let outcome = read_column_split(reader, rows, bytes, boundaries)
        .expect("Failed to read column");
    assert_eq!(outcome.bytes, bytes.len(), "column left unread bytes");
    outcome.column
}

/// Bytes a skip reader passes over
pub fn skipped_bytes(type_: &Type, rows: usize, bytes: &[u8], chunk: usize) -> usize {
    skipped_bytes_as(type_, rows, SerializationKind::Default, bytes, chunk)
}

pub fn skipped_bytes_as(
    type_: &Type,
    rows: usize,
    kind: SerializationKind,
    bytes: &[u8],
    chunk: usize,
) -> usize {
    let skipper = type_
        .create_skip_reader_for(rows, kind)
        .expect("Failed to create skip reader");
    skip_column(skipper, rows, bytes, chunk).expect("Failed to skip column")
}

pub fn values(column: &ColumnRef) -> Vec<Value> {
    (0..column.row_count())
        .map(|i| column.get_value(i).expect("Failed to get value"))
        .collect()
}

/// Write then read back `rows`, checking the skip reader agrees on the size
pub fn roundtrip(type_: &Type, rows: &[Value]) -> Vec<Value> {
    let bytes = encode(type_, rows, 7);
    assert_eq!(skipped_bytes(type_, rows.len(), &bytes, 5), bytes.len());
    values(&decode(type_, rows.len(), &bytes, 3))
}
