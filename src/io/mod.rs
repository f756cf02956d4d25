//! Incremental I/O for column data
//!
//! `buffer_utils` decodes and encodes the framing integers (varints and
//! little-endian words) from partially filled buffers; `column_stream` holds
//! the reader, skipper and writer contracts and the helpers that drive them
//! over a byte slice the way a transport would.

pub mod buffer_utils;
pub mod column_stream;

pub use column_stream::{
    ColumnReader,
    ColumnSkipper,
    ColumnWriter,
    Progress,
    SerializationKind,
};
