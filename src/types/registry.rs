//! Name to constructor map used to resolve type names
//!
//! [`TypeRegistry::resolve`] splits a name with
//! [`split_type_name`](super::parser::split_type_name), looks the base name
//! up and hands the arguments to its constructor, which resolves nested type
//! arguments recursively through the same registry.

use super::{
    parser::{
        parse_enum_item,
        split_element_name,
        split_type_name,
        unquote,
        TypeName,
    },
    EnumItem,
    Type,
    TypeCode,
};
use crate::{
    settings::parse_time_zone,
    Error,
    Result,
};
use std::{
    cell::RefCell,
    collections::HashMap,
    sync::OnceLock,
};
use tracing::trace;

/// Builds a [`Type`] from a split type name
pub type TypeConstructor = fn(&TypeRegistry, &TypeName) -> Result<Type>;

/// Largest precision a 128-bit decimal can hold
pub const MAX_DECIMAL_PRECISION: usize = 38;
/// Largest DateTime64 precision (nanoseconds)
pub const MAX_DATETIME64_PRECISION: usize = 9;
/// Discriminant 255 marks a null Variant row
pub const MAX_VARIANT_ALTERNATIVES: usize = 255;

pub struct TypeRegistry {
    constructors: HashMap<&'static str, TypeConstructor>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut registry = Self { constructors: HashMap::new() };
        for &(name, _) in SIMPLE_TYPES {
            registry.register(name, simple);
        }
        registry.register("FixedString", fixed_string);
        registry.register("DateTime", datetime);
        registry.register("DateTime64", datetime64);
        registry.register("Decimal", decimal);
        registry.register("Decimal32", decimal32);
        registry.register("Decimal64", decimal64);
        registry.register("Decimal128", decimal128);
        registry.register("Enum8", enum8);
        registry.register("Enum16", enum16);
        registry.register("Array", array);
        registry.register("Nullable", nullable);
        registry.register("Tuple", tuple);
        registry.register("LowCardinality", low_cardinality);
        registry.register("Map", map);
        registry.register("Variant", variant);
        registry.register("SimpleAggregateFunction", simple_aggregate_function);
        registry
    }
}

impl TypeRegistry {
    /// Registry with every built-in type
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the constructor for a base name
    pub fn register(&mut self, name: &'static str, constructor: TypeConstructor) {
        self.constructors.insert(name, constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Resolve a type name into a descriptor tree
    pub fn resolve(&self, name: &str) -> Result<Type> {
        let type_name = split_type_name(name)?;
        let constructor = self
            .constructors
            .get(type_name.base)
            .ok_or_else(|| Error::TypeNotSupported(type_name.base.to_string()))?;
        let type_ = constructor(self, &type_name)?;
        trace!(name = type_name.text, resolved = %type_.name(), "resolved type");
        Ok(type_)
    }
}

/// The shared built-in registry
pub fn default_registry() -> &'static TypeRegistry {
    static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();
    REGISTRY.get_or_init(TypeRegistry::default)
}

// Each thread keeps its own cache of resolved names, so lookups need no lock
thread_local! {
    static TYPE_CACHE: RefCell<HashMap<String, Type>> =
        RefCell::new(HashMap::new());
}

/// Resolve a type name with the built-in registry, caching the result
pub fn parse_type_name(name: &str) -> Result<Type> {
    if let Some(type_) =
        TYPE_CACHE.with(|cache| cache.borrow().get(name).cloned())
    {
        return Ok(type_);
    }
    let type_ = default_registry().resolve(name)?;
    TYPE_CACHE.with(|cache| {
        cache.borrow_mut().insert(name.to_string(), type_.clone())
    });
    Ok(type_)
}

const SIMPLE_TYPES: &[(&str, TypeCode)] = &[
    ("Nothing", TypeCode::Nothing),
    ("Bool", TypeCode::Bool),
    ("Boolean", TypeCode::Bool),
    ("Int8", TypeCode::Int8),
    ("Int16", TypeCode::Int16),
    ("Int32", TypeCode::Int32),
    ("Int64", TypeCode::Int64),
    ("Int128", TypeCode::Int128),
    ("UInt8", TypeCode::UInt8),
    ("UInt16", TypeCode::UInt16),
    ("UInt32", TypeCode::UInt32),
    ("UInt64", TypeCode::UInt64),
    ("UInt128", TypeCode::UInt128),
    ("Float32", TypeCode::Float32),
    ("Float64", TypeCode::Float64),
    ("String", TypeCode::String),
    ("UUID", TypeCode::UUID),
    ("IPv4", TypeCode::IPv4),
    ("IPv6", TypeCode::IPv6),
    ("Date", TypeCode::Date),
    ("Date32", TypeCode::Date32),
];

fn simple(_: &TypeRegistry, name: &TypeName) -> Result<Type> {
    let code = SIMPLE_TYPES
        .iter()
        .find(|(base, _)| *base == name.base)
        .map(|(_, code)| *code)
        .ok_or_else(|| Error::TypeNotSupported(name.base.to_string()))?;
    no_arguments(name, Type::Simple(code))
}

fn no_arguments(name: &TypeName, type_: Type) -> Result<Type> {
    match &name.arguments {
        None => Ok(type_),
        Some(_) => Err(name.invalid("type takes no arguments")),
    }
}

/// Arguments of a parametric type; `None` means the name was given bare
fn arguments<'n, 'a>(
    name: &'n TypeName<'a>,
    expected: std::ops::RangeInclusive<usize>,
) -> Result<Option<&'n [&'a str]>> {
    let Some(args) = name.arguments.as_deref() else {
        return Ok(None);
    };
    if !expected.contains(&args.len()) {
        let count = if expected.start() == expected.end() {
            expected.start().to_string()
        } else {
            format!("{} to {}", expected.start(), expected.end())
        };
        return Err(name.invalid(format!(
            "expected {} argument(s), got {}",
            count,
            args.len()
        )));
    }
    Ok(Some(args))
}

fn parse_usize(name: &TypeName, argument: &str) -> Result<usize> {
    argument.parse::<usize>().map_err(|_| {
        name.invalid(format!("'{}' is not a non-negative integer", argument))
    })
}

fn fixed_string(_: &TypeRegistry, name: &TypeName) -> Result<Type> {
    let Some(args) = arguments(name, 1..=1)? else {
        return Ok(Type::Unspecified(TypeCode::FixedString));
    };
    let size = parse_usize(name, args[0])?;
    if size == 0 {
        return Err(name.invalid("FixedString length must be positive"));
    }
    Ok(Type::fixed_string(size))
}

fn datetime(_: &TypeRegistry, name: &TypeName) -> Result<Type> {
    match arguments(name, 0..=1)? {
        None | Some([]) => Ok(Type::datetime(None)),
        Some(args) => {
            let tz = parse_time_zone(&unquote(args[0])?)?;
            Ok(Type::datetime(Some(tz)))
        }
    }
}

fn datetime64(_: &TypeRegistry, name: &TypeName) -> Result<Type> {
    let Some(args) = arguments(name, 1..=2)? else {
        return Ok(Type::Unspecified(TypeCode::DateTime64));
    };
    let precision = parse_usize(name, args[0])?;
    if precision > MAX_DATETIME64_PRECISION {
        return Err(name.invalid(format!(
            "DateTime64 precision {} exceeds {}",
            precision, MAX_DATETIME64_PRECISION
        )));
    }
    let tz = match args.get(1) {
        Some(arg) => Some(parse_time_zone(&unquote(arg)?)?),
        None => None,
    };
    Ok(Type::datetime64(precision, tz))
}

fn checked_decimal(
    name: &TypeName,
    precision: usize,
    scale: usize,
) -> Result<Type> {
    if precision == 0 {
        return Err(name.invalid("Decimal precision must be positive"));
    }
    if precision > MAX_DECIMAL_PRECISION {
        return Err(Error::TypeNotSupported(format!(
            "{} (precision above {})",
            name.text, MAX_DECIMAL_PRECISION
        )));
    }
    if scale > precision {
        return Err(name.invalid(format!(
            "scale {} exceeds precision {}",
            scale, precision
        )));
    }
    Ok(Type::decimal(precision, scale))
}

fn decimal(_: &TypeRegistry, name: &TypeName) -> Result<Type> {
    let Some(args) = arguments(name, 2..=2)? else {
        return Ok(Type::Unspecified(TypeCode::Decimal));
    };
    let precision = parse_usize(name, args[0])?;
    let scale = parse_usize(name, args[1])?;
    checked_decimal(name, precision, scale)
}

fn sized_decimal(
    name: &TypeName,
    code: TypeCode,
    precision: usize,
) -> Result<Type> {
    let Some(args) = arguments(name, 1..=1)? else {
        return Ok(Type::Unspecified(code));
    };
    let scale = parse_usize(name, args[0])?;
    checked_decimal(name, precision, scale)
}

fn decimal32(_: &TypeRegistry, name: &TypeName) -> Result<Type> {
    sized_decimal(name, TypeCode::Decimal32, 9)
}

fn decimal64(_: &TypeRegistry, name: &TypeName) -> Result<Type> {
    sized_decimal(name, TypeCode::Decimal64, 18)
}

fn decimal128(_: &TypeRegistry, name: &TypeName) -> Result<Type> {
    sized_decimal(name, TypeCode::Decimal128, MAX_DECIMAL_PRECISION)
}

fn enum_items(
    name: &TypeName,
    args: &[&str],
    range: std::ops::RangeInclusive<i64>,
) -> Result<Vec<EnumItem>> {
    if args.is_empty() {
        return Err(name.invalid("enum must have at least one item"));
    }
    let parsed = args
        .iter()
        .map(|arg| parse_enum_item(arg))
        .collect::<Result<Vec<_>>>()?;

    let explicit = parsed.iter().filter(|(_, v)| v.is_some()).count();
    if explicit != 0 && explicit != parsed.len() {
        return Err(name.invalid("either all or no enum items need values"));
    }

    let mut items: Vec<EnumItem> = Vec::with_capacity(parsed.len());
    for (index, (item_name, value)) in parsed.into_iter().enumerate() {
        let value = value.unwrap_or(index as i64 + 1);
        if !range.contains(&value) {
            return Err(name.invalid(format!(
                "enum value {} out of range",
                value
            )));
        }
        let value = value as i16;
        if items.iter().any(|i| i.name == item_name || i.value == value) {
            return Err(name.invalid(format!(
                "duplicate enum item '{}' = {}",
                item_name, value
            )));
        }
        items.push(EnumItem { name: item_name, value });
    }
    Ok(items)
}

fn enum8(_: &TypeRegistry, name: &TypeName) -> Result<Type> {
    let Some(args) = name.arguments.as_deref() else {
        return Ok(Type::Unspecified(TypeCode::Enum8));
    };
    let range = i64::from(i8::MIN)..=i64::from(i8::MAX);
    Ok(Type::enum8(enum_items(name, args, range)?))
}

fn enum16(_: &TypeRegistry, name: &TypeName) -> Result<Type> {
    let Some(args) = name.arguments.as_deref() else {
        return Ok(Type::Unspecified(TypeCode::Enum16));
    };
    let range = i64::from(i16::MIN)..=i64::from(i16::MAX);
    Ok(Type::enum16(enum_items(name, args, range)?))
}

fn array(registry: &TypeRegistry, name: &TypeName) -> Result<Type> {
    let Some(args) = arguments(name, 1..=1)? else {
        return Ok(Type::Unspecified(TypeCode::Array));
    };
    Ok(Type::array(registry.resolve(args[0])?))
}

fn nullable(registry: &TypeRegistry, name: &TypeName) -> Result<Type> {
    let Some(args) = arguments(name, 1..=1)? else {
        return Ok(Type::Unspecified(TypeCode::Nullable));
    };
    let nested = registry.resolve(args[0])?;
    if matches!(nested, Type::Nullable { .. }) {
        return Err(name.invalid("nested Nullable"));
    }
    Ok(Type::nullable(nested))
}

fn low_cardinality(registry: &TypeRegistry, name: &TypeName) -> Result<Type> {
    let Some(args) = arguments(name, 1..=1)? else {
        return Ok(Type::Unspecified(TypeCode::LowCardinality));
    };
    Ok(Type::low_cardinality(registry.resolve(args[0])?))
}

fn tuple(registry: &TypeRegistry, name: &TypeName) -> Result<Type> {
    let Some(args) = name.arguments.as_deref() else {
        return Ok(Type::Unspecified(TypeCode::Tuple));
    };
    if args.is_empty() {
        return Err(name.invalid("Tuple needs at least one element"));
    }

    let mut types = Vec::with_capacity(args.len());
    let mut names = Vec::with_capacity(args.len());
    for arg in args {
        match split_element_name(arg)? {
            Some((element, type_name)) => {
                names.push(Some(element));
                types.push(registry.resolve(type_name)?);
            }
            None => {
                names.push(None);
                types.push(registry.resolve(arg)?);
            }
        }
    }

    if names.iter().all(Option::is_some) {
        let names = names.into_iter().flatten().collect();
        Ok(Type::named_tuple(types, names))
    } else if names.iter().all(Option::is_none) {
        Ok(Type::tuple(types))
    } else {
        Err(name.invalid("either all or no tuple elements need names"))
    }
}

fn map(registry: &TypeRegistry, name: &TypeName) -> Result<Type> {
    let Some(args) = arguments(name, 2..=2)? else {
        return Ok(Type::Unspecified(TypeCode::Map));
    };
    Ok(Type::map(registry.resolve(args[0])?, registry.resolve(args[1])?))
}

fn variant(registry: &TypeRegistry, name: &TypeName) -> Result<Type> {
    let Some(args) = name.arguments.as_deref() else {
        return Ok(Type::Unspecified(TypeCode::Variant));
    };
    if args.is_empty() || args.len() > MAX_VARIANT_ALTERNATIVES {
        return Err(name.invalid(format!(
            "Variant needs 1 to {} alternatives",
            MAX_VARIANT_ALTERNATIVES
        )));
    }
    let variants = args
        .iter()
        .map(|arg| registry.resolve(arg))
        .collect::<Result<Vec<_>>>()?;
    if variants.iter().any(|t| matches!(t, Type::Nullable { .. })) {
        return Err(name.invalid("Variant alternatives cannot be Nullable"));
    }
    Ok(Type::variant(variants))
}

fn simple_aggregate_function(
    registry: &TypeRegistry,
    name: &TypeName,
) -> Result<Type> {
    let Some(args) = arguments(name, 2..=2)? else {
        return Err(name.invalid("expected a function and a type"));
    };
    registry.resolve(args[1])
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_simple_types() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.resolve("Int32").unwrap(), Type::int32());
        assert_eq!(registry.resolve("Boolean").unwrap(), Type::bool());
        assert!(matches!(
            registry.resolve("Int32(1)"),
            Err(Error::InvalidTypeName { .. })
        ));
    }

    #[test]
    fn test_unknown_type() {
        let registry = TypeRegistry::new();
        assert!(matches!(
            registry.resolve("Int256"),
            Err(Error::TypeNotSupported(_))
        ));
        assert!(matches!(
            registry.resolve("Array(Foo)"),
            Err(Error::TypeNotSupported(_))
        ));
    }

    #[test]
    fn test_unspecified() {
        let registry = TypeRegistry::new();
        assert_eq!(
            registry.resolve("Array").unwrap(),
            Type::Unspecified(TypeCode::Array)
        );
        assert_eq!(
            registry.resolve("Decimal").unwrap(),
            Type::Unspecified(TypeCode::Decimal)
        );
        // A bare DateTime is complete
        assert_eq!(registry.resolve("DateTime").unwrap(), Type::datetime(None));
    }

    #[test]
    fn test_custom_constructor() {
        let mut registry = TypeRegistry::new();
        registry.register("JSONString", |_, _| Ok(Type::string()));
        assert!(registry.contains("JSONString"));
        assert_eq!(registry.resolve("JSONString").unwrap(), Type::string());
    }

    #[test]
    fn test_decimal_limits() {
        let registry = TypeRegistry::new();
        assert_eq!(
            registry.resolve("Decimal64(4)").unwrap(),
            Type::decimal(18, 4)
        );
        assert!(matches!(
            registry.resolve("Decimal(76, 2)"),
            Err(Error::TypeNotSupported(_))
        ));
        assert!(matches!(
            registry.resolve("Decimal(9, 10)"),
            Err(Error::InvalidTypeName { .. })
        ));
    }

    #[test]
    fn test_enum_auto_values() {
        let registry = TypeRegistry::new();
        let type_ = registry.resolve("Enum8('a', 'b')").unwrap();
        assert_eq!(type_.get_enum_value("b"), Some(2));
        assert!(registry.resolve("Enum8('a' = 200)").is_err());
        assert!(registry.resolve("Enum8('a' = 1, 'b' = 1)").is_err());
        assert!(registry.resolve("Enum8('a' = 1, 'b')").is_err());
    }

    #[test]
    fn test_simple_aggregate_function() {
        let registry = TypeRegistry::new();
        assert_eq!(
            registry
                .resolve("SimpleAggregateFunction(anyLast, Nullable(UInt8))")
                .unwrap(),
            Type::nullable(Type::uint8())
        );
    }

    #[test]
    fn test_caching() {
        let type_ = parse_type_name("Array(Int8)").unwrap();
        assert_eq!(type_, Type::array(Type::int8()));
        TYPE_CACHE.with(|cache| {
            assert!(cache.borrow().contains_key("Array(Int8)"));
        });
        assert!(parse_type_name("Array(Int8").is_err());
        TYPE_CACHE.with(|cache| {
            assert!(!cache.borrow().contains_key("Array(Int8"));
        });
    }
}
