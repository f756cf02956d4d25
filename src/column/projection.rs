//! Typed views over finalized columns
//!
//! [`try_reinterpret`] first unwraps the transparent wrapper columns
//! (Nullable, LowCardinality, Sparse, Nothing), each of which re-applies the
//! request to its inner column and wraps the result. Every other column is
//! handed to [`Projection::project`] of the requested type, which knows the
//! concrete columns it can be read from.

use super::{
    decimal,
    downcast_column,
    enum_column,
    lowcardinality::LowCardinalityColumn,
    nothing::NothingColumn,
    nullable::NullableColumn,
    numeric::VectorColumn,
    sparse::SparseColumn,
    ColumnRef,
};
use crate::{
    Error,
    Result,
    Value,
};
use std::{
    marker::PhantomData,
    net::{
        Ipv4Addr,
        Ipv6Addr,
    },
    sync::Arc,
};
use uuid::Uuid;

/// Random-access column of `T`
pub trait TypedColumn<T>: Send + Sync {
    fn row_count(&self) -> usize;
    fn is_null(&self, index: usize) -> bool;
    fn get(&self, index: usize) -> Result<T>;
}

pub type TypedColumnRef<T> = Arc<dyn TypedColumn<T>>;

/// A Rust type a column can be viewed as
pub trait Projection: Sized + Send + Sync + 'static {
    /// View `column` as `Self`, or `None` when its type does not convert
    fn project(column: &ColumnRef) -> Option<TypedColumnRef<Self>>;

    /// How a null row is represented, if `Self` can represent one
    fn null() -> Option<Self> {
        None
    }
}

/// View `column` as `T` without copying
pub fn try_reinterpret<T: Projection>(
    column: &ColumnRef,
) -> Option<TypedColumnRef<T>> {
    let any = column.as_any();
    if let Some(nullable) = any.downcast_ref::<NullableColumn>() {
        return nullable.reinterpret::<T>();
    }
    if let Some(lc) = any.downcast_ref::<LowCardinalityColumn>() {
        return lc.reinterpret::<T>();
    }
    if let Some(sparse) = any.downcast_ref::<SparseColumn>() {
        return sparse.reinterpret::<T>();
    }
    if let Some(nothing) = any.downcast_ref::<NothingColumn>() {
        return T::null().map(|_| {
            Arc::new(AllNullView::<T>::new(nothing.len())) as TypedColumnRef<T>
        });
    }
    T::project(column)
}

/// Converts each row of an inner view on access
pub struct MappedColumn<S, T> {
    inner: TypedColumnRef<S>,
    map: Arc<dyn Fn(S) -> Result<T> + Send + Sync>,
}

impl<S: 'static, T: 'static> MappedColumn<S, T> {
    pub fn new(
        inner: TypedColumnRef<S>,
        map: impl Fn(S) -> Result<T> + Send + Sync + 'static,
    ) -> TypedColumnRef<T> {
        Arc::new(Self { inner, map: Arc::new(map) })
    }
}

impl<S, T> TypedColumn<T> for MappedColumn<S, T> {
    fn row_count(&self) -> usize {
        self.inner.row_count()
    }

    fn is_null(&self, index: usize) -> bool {
        self.inner.is_null(index)
    }

    fn get(&self, index: usize) -> Result<T> {
        (self.map)(self.inner.get(index)?)
    }
}

/// `Option<T>` over a view of `T`; rows the inner view reports null are
/// `None`
struct SomeView<T> {
    inner: TypedColumnRef<T>,
}

impl<T> TypedColumn<Option<T>> for SomeView<T> {
    fn row_count(&self) -> usize {
        self.inner.row_count()
    }

    fn is_null(&self, index: usize) -> bool {
        self.inner.is_null(index)
    }

    fn get(&self, index: usize) -> Result<Option<T>> {
        if self.inner.is_null(index) {
            return Ok(None);
        }
        self.inner.get(index).map(Some)
    }
}

struct AllNullView<T> {
    rows: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AllNullView<T> {
    fn new(rows: usize) -> Self {
        Self { rows, _marker: PhantomData }
    }
}

impl<T: Projection> TypedColumn<T> for AllNullView<T> {
    fn row_count(&self) -> usize {
        self.rows
    }

    fn is_null(&self, _index: usize) -> bool {
        true
    }

    fn get(&self, index: usize) -> Result<T> {
        if index >= self.rows {
            return Err(Error::out_of_bounds(index, self.rows));
        }
        T::null().ok_or_else(|| {
            Error::Internal("Null view over a non-nullable target".to_string())
        })
    }
}

struct ValueView {
    column: ColumnRef,
}

impl TypedColumn<Value> for ValueView {
    fn row_count(&self) -> usize {
        self.column.row_count()
    }

    fn is_null(&self, index: usize) -> bool {
        self.column.is_null(index)
    }

    fn get(&self, index: usize) -> Result<Value> {
        self.column.get_value(index)
    }
}

impl Projection for Value {
    fn project(column: &ColumnRef) -> Option<TypedColumnRef<Self>> {
        Some(Arc::new(ValueView { column: Arc::clone(column) }))
    }

    fn null() -> Option<Self> {
        Some(Value::Null)
    }
}

impl<T: Projection> Projection for Option<T> {
    fn project(column: &ColumnRef) -> Option<TypedColumnRef<Self>> {
        let inner = try_reinterpret::<T>(column)?;
        Some(Arc::new(SomeView { inner }))
    }

    fn null() -> Option<Self> {
        Some(None)
    }
}

macro_rules! impl_numeric_projection {
    ($target:ty $(, $source:ty)* $(; $extra:path)?) => {
        impl Projection for $target {
            fn project(column: &ColumnRef) -> Option<TypedColumnRef<Self>> {
                if let Some(c) = downcast_column::<VectorColumn<$target>>(column) {
                    return Some(c as TypedColumnRef<$target>);
                }
                $(
                    if let Some(c) = downcast_column::<VectorColumn<$source>>(column) {
                        return Some(MappedColumn::<$source, $target>::new(c, |v| {
                            Ok(<$target>::from(v))
                        }));
                    }
                )*
                $(
                    if let Some(c) = $extra(column) {
                        return Some(c);
                    }
                )?
                None
            }
        }
    };
}

impl_numeric_projection!(i8; enum_column::project_raw::<i8>);
impl_numeric_projection!(i16, i8, u8; enum_column::project_raw::<i16>);
impl_numeric_projection!(i32, i8, i16, u8, u16);
impl_numeric_projection!(i64, i8, i16, i32, u8, u16, u32);
impl_numeric_projection!(i128, i8, i16, i32, i64, u8, u16, u32, u64);
impl_numeric_projection!(u8);
impl_numeric_projection!(u16, u8);
impl_numeric_projection!(u32, u8, u16);
impl_numeric_projection!(u64, u8, u16, u32);
impl_numeric_projection!(u128, u8, u16, u32, u64);
impl_numeric_projection!(f32, i8, i16, u8, u16);
impl_numeric_projection!(f64, f32, i8, i16, i32, u8, u16, u32; decimal::project_f64);
impl_numeric_projection!(bool);
impl_numeric_projection!(Uuid);
impl_numeric_projection!(Ipv6Addr);

impl Projection for Ipv4Addr {
    fn project(column: &ColumnRef) -> Option<TypedColumnRef<Self>> {
        downcast_column::<VectorColumn<Ipv4Addr>>(column)
            .map(|c| c as TypedColumnRef<Ipv4Addr>)
    }
}
