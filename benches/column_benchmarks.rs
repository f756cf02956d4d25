//! Column codec benchmarks
//!
//! ## Benchmarks:
//! - Column serialization through fixed-size output windows
//! - Column deserialization through fixed-size input windows
//! - Skipping a serialized column
//!
//! ## Run with:
//! `cargo bench --bench column_benchmarks`

use bytes::Bytes;
use clickhouse_column_codec::{
    io::column_stream::{
        read_column,
        skip_column,
        write_column,
    },
    CodecSettings,
    Type,
    Value,
};
use criterion::{
    black_box,
    criterion_group,
    criterion_main,
    BenchmarkId,
    Criterion,
    Throughput,
};

const ITEMS_1M: usize = 1_000_000;
const ITEMS_100K: usize = 100_000;

/// Window size used for both reading and writing
const CHUNK: usize = 64 * 1024;

#[inline]
fn generate_uint64(index: usize) -> u64 {
    let base = (index % 255) as u64;
    base << 56
        | base << 48
        | base << 40
        | base << 32
        | base << 24
        | base << 16
        | base << 8
        | base
}

/// 7 character slice of a rotating template
#[inline]
fn generate_string(index: usize) -> String {
    const TEMPLATE: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789\
                              9876543210ZYXWVUTSRQPONMLKJIHGFEDCBAzyxwvutsrqponmlkjihgfedcba";
    const RESULT_SIZE: usize = 7;

    let start_pos = index % (TEMPLATE.len() - RESULT_SIZE);
    String::from_utf8_lossy(&TEMPLATE[start_pos..start_pos + RESULT_SIZE])
        .to_string()
}

fn uint64_rows(count: usize) -> Vec<Value> {
    (0..count).map(|i| Value::UInt64(generate_uint64(i))).collect()
}

fn string_rows(count: usize) -> Vec<Value> {
    (0..count).map(|i| Value::String(generate_string(i))).collect()
}

/// Low cardinality strings: 100 distinct values
fn category_rows(count: usize) -> Vec<Value> {
    (0..count).map(|i| Value::String(format!("category_{}", i % 100))).collect()
}

fn serialize(type_: &Type, rows: &[Value]) -> Bytes {
    let writer = type_
        .create_writer(rows.to_vec(), &CodecSettings::default())
        .expect("Failed to create writer");
    write_column(writer, rows.len(), CHUNK)
        .expect("Failed to serialize")
        .freeze()
}

fn cases() -> Vec<(&'static str, Type, Vec<Value>)> {
    vec![
        ("UInt64", Type::uint64(), uint64_rows(ITEMS_1M)),
        ("String", Type::string(), string_rows(ITEMS_1M)),
        (
            "LowCardinality(String)",
            Type::low_cardinality(Type::string()),
            category_rows(ITEMS_1M),
        ),
    ]
}

/// Benchmark: write 1M rows
fn column_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("column_write");
    group.throughput(Throughput::Elements(ITEMS_1M as u64));

    for (name, type_, rows) in cases() {
        group.bench_function(BenchmarkId::new(name, "1M_items"), |b| {
            b.iter(|| {
                let writer = type_
                    .create_writer(rows.clone(), &CodecSettings::default())
                    .expect("Failed to create writer");
                let bytes = write_column(writer, ITEMS_1M, CHUNK)
                    .expect("Failed to serialize");
                black_box(bytes.len())
            });
        });
    }

    group.finish();
}

/// Benchmark: read 1M rows
fn column_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("column_read");

    for (name, type_, rows) in cases() {
        let serialized = serialize(&type_, &rows);
        group.throughput(Throughput::Bytes(serialized.len() as u64));
        group.bench_function(BenchmarkId::new(name, "1M_items"), |b| {
            b.iter(|| {
                let reader = type_
                    .create_reader(ITEMS_1M, &CodecSettings::default())
                    .expect("Failed to create reader");
                let outcome = read_column(reader, ITEMS_1M, &serialized, CHUNK)
                    .expect("Failed to deserialize");
                black_box(outcome.column.row_count())
            });
        });
    }

    group.finish();
}

/// Benchmark: skip 1M rows
fn column_skip(c: &mut Criterion) {
    let mut group = c.benchmark_group("column_skip");

    for (name, type_, rows) in cases() {
        let serialized = serialize(&type_, &rows);
        group.throughput(Throughput::Bytes(serialized.len() as u64));
        group.bench_function(BenchmarkId::new(name, "1M_items"), |b| {
            b.iter(|| {
                let skipper = type_
                    .create_skip_reader(ITEMS_1M)
                    .expect("Failed to create skip reader");
                black_box(
                    skip_column(skipper, ITEMS_1M, &serialized, CHUNK)
                        .expect("Failed to skip"),
                )
            });
        });
    }

    group.finish();
}

/// Benchmark: nested column round trip
fn column_array_roundtrip(c: &mut Criterion) {
    let type_ = Type::array(Type::nullable(Type::string()));
    let rows: Vec<Value> = (0..ITEMS_100K)
        .map(|i| {
            Value::Array(
                (0..i % 4)
                    .map(|j| {
                        if j == 2 {
                            Value::Null
                        } else {
                            Value::String(generate_string(i + j))
                        }
                    })
                    .collect(),
            )
        })
        .collect();

    let mut group = c.benchmark_group("column_roundtrip");
    group.throughput(Throughput::Elements(ITEMS_100K as u64));

    group.bench_function(
        BenchmarkId::new("Array(Nullable(String))", "100K_items"),
        |b| {
            b.iter(|| {
                let serialized = serialize(&type_, &rows);
                let reader = type_
                    .create_reader(ITEMS_100K, &CodecSettings::default())
                    .expect("Failed to create reader");
                let outcome =
                    read_column(reader, ITEMS_100K, &serialized, CHUNK)
                        .expect("Failed to deserialize");
                black_box(outcome.column.row_count())
            });
        },
    );

    group.finish();
}

criterion_group!(
    benches,
    column_write,
    column_read,
    column_skip,
    column_array_roundtrip
);
criterion_main!(benches);
