//! # Column Module
//!
//! Finalized, immutable columns ([`TableColumn`]) together with the
//! incremental readers, skippers and writers that produce and serialize
//! them. Each wire type family lives in its own module.
//!
//! ## ClickHouse Documentation
//!
//! - [Data Types Overview](https://clickhouse.com/docs/en/sql-reference/data-types)
//! - [Nullable Type](https://clickhouse.com/docs/en/sql-reference/data-types/nullable)
//! - [Array Type](https://clickhouse.com/docs/en/sql-reference/data-types/array)
//! - [LowCardinality Type](https://clickhouse.com/docs/en/sql-reference/data-types/lowcardinality)
//! - [Tuple Type](https://clickhouse.com/docs/en/sql-reference/data-types/tuple)
//! - [Map Type](https://clickhouse.com/docs/en/sql-reference/data-types/map)
//! - [Variant Type](https://clickhouse.com/docs/en/sql-reference/data-types/variant)
//!
//! ## Reinterpretation
//!
//! A finalized column can be viewed as a statically typed
//! [`TypedColumn<T>`] through [`ColumnRefExt::try_reinterpret`]. Views share
//! the column's storage; nothing is copied. Nullable, LowCardinality and
//! Sparse columns are transparent: the requested projection is applied to
//! their inner column and wrapped with the null mask, dictionary keys or
//! default-row positions respectively.
//!
//! | Column | Natural projection | Also |
//! |--------|--------------------|------|
//! | `Int32` | `i32` | `i64`, `i128`, `f64` |
//! | `String` | `String` | `Bytes` |
//! | `Array(T)` | `Vec<T>` | |
//! | `Tuple(A, B)` | `(A, B)` | |
//! | `Map(K, V)` | `Vec<(K, V)>` | |
//! | `Nullable(T)` | `Option<T>` | `T` (null rows yield the stored default) |
//! | any | [`Value`] | |

/// Boilerplate shared by every [`TableColumn`] implementation
macro_rules! impl_column_any {
    () => {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn into_any(
            self: std::sync::Arc<Self>,
        ) -> std::sync::Arc<dyn std::any::Any + Send + Sync> {
            self
        }
    };
}

pub(crate) use impl_column_any;

pub mod array;
pub mod date;
pub mod decimal;
pub mod enum_column;
pub mod lowcardinality;
pub mod map;
pub mod nothing;
pub mod nullable;
pub mod numeric;
pub mod projection;
pub mod sparse;
pub mod string;
pub mod tuple;
pub mod variant;

pub use array::ArrayColumn;
pub use date::{
    DateColumn,
    DateTimeColumn,
};
pub use decimal::DecimalColumn;
pub use enum_column::EnumColumn;
pub use lowcardinality::LowCardinalityColumn;
pub use map::MapColumn;
pub use nothing::NothingColumn;
pub use nullable::NullableColumn;
pub use numeric::{
    FixedSize,
    VectorColumn,
};
pub use projection::{
    Projection,
    TypedColumn,
    TypedColumnRef,
};
pub use sparse::SparseColumn;
pub use string::{
    FixedStringColumn,
    StringColumn,
};
pub use tuple::TupleColumn;
pub use variant::VariantColumn;

use crate::{
    types::Type,
    Result,
    Value,
};
use std::{
    any::Any,
    sync::Arc,
};

/// Reference to a finalized column (using Arc for cheap cloning)
pub type ColumnRef = Arc<dyn TableColumn>;

/// Immutable random-access view over one column's materialized rows
pub trait TableColumn: Send + Sync + 'static {
    /// Get the type of this column
    fn column_type(&self) -> &Type;

    /// Get the number of rows in this column
    fn row_count(&self) -> usize;

    /// Whether the row is null; rows past the end are reported as not null
    fn is_null(&self, index: usize) -> bool;

    /// Get the row as a dynamic value
    fn get_value(&self, index: usize) -> Result<Value>;

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Owned downcast support, used to build zero-copy typed views
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Operations available on any [`ColumnRef`]
pub trait ColumnRefExt {
    /// View the column as `T` without copying; `None` when no conversion
    /// from this column's type to `T` exists
    fn try_reinterpret<T: Projection>(&self) -> Option<TypedColumnRef<T>>;

    /// Collect every row as a [`Value`]
    fn values(&self) -> Result<Vec<Value>>;
}

impl ColumnRefExt for ColumnRef {
    fn try_reinterpret<T: Projection>(&self) -> Option<TypedColumnRef<T>> {
        projection::try_reinterpret(self)
    }

    fn values(&self) -> Result<Vec<Value>> {
        (0..self.row_count()).map(|i| self.get_value(i)).collect()
    }
}

/// Downcast a column reference to its concrete type, sharing the allocation
pub(crate) fn downcast_column<C: TableColumn>(
    column: &ColumnRef,
) -> Option<Arc<C>> {
    if !column.as_any().is::<C>() {
        return None;
    }
    Arc::clone(column).into_any().downcast::<C>().ok()
}
