//! Runtime element type to monomorphized code
//!
//! Fixed-width columns pick their row storage from the resolved type once,
//! at construction. [`StorageKind`] is the closed set of storage element
//! types; [`StorageKind::dispatch`] calls a [`StorageVisitor`] with the
//! matching Rust type so every arm is compiled separately.

use crate::{
    column::numeric::Primitive,
    types::TypeCode,
};
use std::net::{
    Ipv4Addr,
    Ipv6Addr,
};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
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
    Uuid,
    Ipv4,
    Ipv6,
}

/// A generic algorithm to run for one storage element type
pub trait StorageVisitor {
    type Output;

    fn visit<T: Primitive>(self) -> Self::Output;
}

impl StorageKind {
    /// Storage of a non-parametric type, if it is a plain primitive
    pub fn of(code: TypeCode) -> Option<Self> {
        let kind = match code {
            TypeCode::Bool => StorageKind::Bool,
            TypeCode::Int8 => StorageKind::Int8,
            TypeCode::Int16 => StorageKind::Int16,
            TypeCode::Int32 => StorageKind::Int32,
            TypeCode::Int64 => StorageKind::Int64,
            TypeCode::Int128 => StorageKind::Int128,
            TypeCode::UInt8 => StorageKind::UInt8,
            TypeCode::UInt16 => StorageKind::UInt16,
            TypeCode::UInt32 => StorageKind::UInt32,
            TypeCode::UInt64 => StorageKind::UInt64,
            TypeCode::UInt128 => StorageKind::UInt128,
            TypeCode::Float32 => StorageKind::Float32,
            TypeCode::Float64 => StorageKind::Float64,
            TypeCode::UUID => StorageKind::Uuid,
            TypeCode::IPv4 => StorageKind::Ipv4,
            TypeCode::IPv6 => StorageKind::Ipv6,
            _ => return None,
        };
        Some(kind)
    }

    pub fn dispatch<V: StorageVisitor>(self, visitor: V) -> V::Output {
        match self {
            StorageKind::Bool => visitor.visit::<bool>(),
            StorageKind::Int8 => visitor.visit::<i8>(),
            StorageKind::Int16 => visitor.visit::<i16>(),
            StorageKind::Int32 => visitor.visit::<i32>(),
            StorageKind::Int64 => visitor.visit::<i64>(),
            StorageKind::Int128 => visitor.visit::<i128>(),
            StorageKind::UInt8 => visitor.visit::<u8>(),
            StorageKind::UInt16 => visitor.visit::<u16>(),
            StorageKind::UInt32 => visitor.visit::<u32>(),
            StorageKind::UInt64 => visitor.visit::<u64>(),
            StorageKind::UInt128 => visitor.visit::<u128>(),
            StorageKind::Float32 => visitor.visit::<f32>(),
            StorageKind::Float64 => visitor.visit::<f64>(),
            StorageKind::Uuid => visitor.visit::<Uuid>(),
            StorageKind::Ipv4 => visitor.visit::<Ipv4Addr>(),
            StorageKind::Ipv6 => visitor.visit::<Ipv6Addr>(),
        }
    }
}
