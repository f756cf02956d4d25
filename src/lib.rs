//! # clickhouse-column-codec
//!
//! Column codecs of the ClickHouse native protocol: incremental readers,
//! skip readers and writers for every wire type, driven by whatever bytes
//! (or output space) the transport has at hand.
//!
//! ```
//! use clickhouse_column_codec::{
//!     io::column_stream::{read_column, write_column},
//!     CodecSettings, Type, Value,
//! };
//!
//! let settings = CodecSettings::default();
//! let type_ = Type::parse("Array(Nullable(String))").unwrap();
//! let rows = vec![Value::Array(vec![Value::from("a"), Value::Null])];
//!
//! let writer = type_.create_writer(rows.clone(), &settings).unwrap();
//! let bytes = write_column(writer, 1, 16).unwrap();
//!
//! let reader = type_.create_reader(1, &settings).unwrap();
//! let column = read_column(reader, 1, &bytes, 3).unwrap().column;
//! assert_eq!(column.get_value(0).unwrap(), rows[0]);
//! ```

pub mod column;
pub mod dispatch;
pub mod error;
pub mod io;
pub mod literal;
pub mod settings;
pub mod types;
pub mod value;

pub use column::{
    ColumnRef,
    ColumnRefExt,
    Projection,
    TableColumn,
    TypedColumn,
    TypedColumnRef,
};
pub use error::{
    Error,
    Result,
};
pub use io::column_stream::{
    ColumnReader,
    ColumnSkipper,
    ColumnWriter,
    Progress,
    SerializationKind,
};
pub use settings::CodecSettings;
pub use types::{
    Type,
    TypeCode,
    TypeRegistry,
};
pub use value::{
    FromValue,
    Value,
};
