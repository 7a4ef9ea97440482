//! Type converters
//!
//! A converter turns the raw text of a resolved property into a typed value.
//! Converters are looked up by [`ValueType`] in a [`ConverterRegistry`]; the
//! built-in set covers integers, booleans, strings and the ISO-8601 date/time
//! kinds, and callers may register their own (or override a built-in).

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat};

use crate::error::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
/// Date-time without seconds, accepted on input only
const DATETIME_MINUTES_FORMAT: &str = "%Y-%m-%dT%H:%M";
/// Byte length of a `YYYY-MM-DD` date
const ISO_DATE_LEN: usize = 10;

/// Identifier of a conversion target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Signed 64-bit decimal integer
    Integer,
    /// `true` (any case) or anything else as `false`
    Boolean,
    /// Identity
    String,
    /// Calendar date, `2024-01-15`
    Date,
    /// Time of day, `10:30:00`
    Time,
    /// Local date and time, `2024-01-15T10:30:00`
    DateTime,
    /// Date and time with offset, `2024-01-15T10:30:00+02:00`
    ZonedDateTime,
    /// Caller-defined type, identified by name
    Custom(String),
}

impl ValueType {
    /// Create a custom type identifier
    pub fn custom(name: impl Into<String>) -> Self {
        ValueType::Custom(name.into())
    }

    /// Canonical name of this type
    pub fn name(&self) -> &str {
        match self {
            ValueType::Integer => "integer",
            ValueType::Boolean => "boolean",
            ValueType::String => "string",
            ValueType::Date => "date",
            ValueType::Time => "time",
            ValueType::DateTime => "datetime",
            ValueType::ZonedDateTime => "zoned-datetime",
            ValueType::Custom(name) => name,
        }
    }

    /// All built-in types, in registration order
    pub fn builtins() -> [ValueType; 7] {
        [
            ValueType::Integer,
            ValueType::Boolean,
            ValueType::String,
            ValueType::Date,
            ValueType::Time,
            ValueType::DateTime,
            ValueType::ZonedDateTime,
        ]
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueType {
    type Err = std::convert::Infallible;

    /// Built-in names (and their short aliases) map to built-in types;
    /// anything else becomes a custom identifier.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "integer" | "int" => ValueType::Integer,
            "boolean" | "bool" => ValueType::Boolean,
            "string" | "str" => ValueType::String,
            "date" => ValueType::Date,
            "time" => ValueType::Time,
            "datetime" => ValueType::DateTime,
            "zoned-datetime" | "zoned" => ValueType::ZonedDateTime,
            other => ValueType::Custom(other.to_string()),
        })
    }
}

/// A converted property value
#[derive(Clone)]
pub enum TypedValue {
    Integer(i64),
    Boolean(bool),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    ZonedDateTime(DateTime<FixedOffset>),
    /// Value produced by a caller-registered converter
    Custom(Arc<dyn Any + Send + Sync>),
}

impl TypedValue {
    /// Wrap a caller-defined value
    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        TypedValue::Custom(Arc::new(value))
    }

    /// Get as i64 if this is an Integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as bool if this is a Boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as str if this is a String
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as a date if this is a Date
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            TypedValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Get as a time if this is a Time
    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            TypedValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Get as a local date-time if this is a DateTime
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            TypedValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Get as an offset date-time if this is a ZonedDateTime
    pub fn as_zoned_datetime(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            TypedValue::ZonedDateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Borrow a custom value as `T`, if it is one
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            TypedValue::Custom(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Take a shared handle to a custom value as `T`, if it is one
    pub fn downcast<T: Any + Send + Sync>(self) -> Option<Arc<T>> {
        match self {
            TypedValue::Custom(value) => value.downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Name of the variant, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            TypedValue::Integer(_) => "integer",
            TypedValue::Boolean(_) => "boolean",
            TypedValue::String(_) => "string",
            TypedValue::Date(_) => "date",
            TypedValue::Time(_) => "time",
            TypedValue::DateTime(_) => "datetime",
            TypedValue::ZonedDateTime(_) => "zoned-datetime",
            TypedValue::Custom(_) => "custom",
        }
    }

    /// Textual form that the matching built-in converter parses back to an
    /// equal value. `None` for custom values.
    pub fn to_property_string(&self) -> Option<String> {
        match self {
            TypedValue::Integer(i) => Some(i.to_string()),
            TypedValue::Boolean(b) => Some(b.to_string()),
            TypedValue::String(s) => Some(s.clone()),
            TypedValue::Date(d) => Some(d.format(DATE_FORMAT).to_string()),
            TypedValue::Time(t) => Some(t.format(TIME_FORMAT).to_string()),
            TypedValue::DateTime(dt) => Some(dt.format(DATETIME_FORMAT).to_string()),
            TypedValue::ZonedDateTime(dt) => {
                Some(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            TypedValue::Custom(_) => None,
        }
    }
}

impl fmt::Debug for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Integer(i) => f.debug_tuple("Integer").field(i).finish(),
            TypedValue::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            TypedValue::String(s) => f.debug_tuple("String").field(s).finish(),
            TypedValue::Date(d) => f.debug_tuple("Date").field(d).finish(),
            TypedValue::Time(t) => f.debug_tuple("Time").field(t).finish(),
            TypedValue::DateTime(dt) => f.debug_tuple("DateTime").field(dt).finish(),
            TypedValue::ZonedDateTime(dt) => f.debug_tuple("ZonedDateTime").field(dt).finish(),
            TypedValue::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl PartialEq for TypedValue {
    /// Custom values compare by identity
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypedValue::Integer(a), TypedValue::Integer(b)) => a == b,
            (TypedValue::Boolean(a), TypedValue::Boolean(b)) => a == b,
            (TypedValue::String(a), TypedValue::String(b)) => a == b,
            (TypedValue::Date(a), TypedValue::Date(b)) => a == b,
            (TypedValue::Time(a), TypedValue::Time(b)) => a == b,
            (TypedValue::DateTime(a), TypedValue::DateTime(b)) => a == b,
            (TypedValue::ZonedDateTime(a), TypedValue::ZonedDateTime(b)) => a == b,
            (TypedValue::Custom(a), TypedValue::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<i64> for TypedValue {
    fn from(i: i64) -> Self {
        TypedValue::Integer(i)
    }
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> Self {
        TypedValue::Boolean(b)
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        TypedValue::String(s)
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::String(s.to_string())
    }
}

/// Rejection reported by a converter function
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ConvertError {
    message: String,
}

impl ConvertError {
    /// Create a rejection with a human-readable reason
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::num::ParseIntError> for ConvertError {
    fn from(e: std::num::ParseIntError) -> Self {
        ConvertError::new(e.to_string())
    }
}

impl From<chrono::ParseError> for ConvertError {
    fn from(e: chrono::ParseError) -> Self {
        ConvertError::new(e.to_string())
    }
}

/// Trait for converter implementations
pub trait Converter: Send + Sync {
    /// Convert raw property text into a typed value
    fn convert(&self, raw: &str) -> std::result::Result<TypedValue, ConvertError>;
}

/// A simple function-based converter
pub struct FnConverter<F>
where
    F: Fn(&str) -> std::result::Result<TypedValue, ConvertError> + Send + Sync,
{
    func: F,
}

impl<F> FnConverter<F>
where
    F: Fn(&str) -> std::result::Result<TypedValue, ConvertError> + Send + Sync,
{
    /// Wrap a conversion function
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Converter for FnConverter<F>
where
    F: Fn(&str) -> std::result::Result<TypedValue, ConvertError> + Send + Sync,
{
    fn convert(&self, raw: &str) -> std::result::Result<TypedValue, ConvertError> {
        (self.func)(raw)
    }
}

static BUILTIN_REGISTRY: OnceLock<ConverterRegistry> = OnceLock::new();

/// The immutable built-in converter set.
///
/// Registries created with [`ConverterRegistry::with_builtins`] start as a
/// copy of this table; registering into them never touches it.
pub fn builtin_registry() -> &'static ConverterRegistry {
    BUILTIN_REGISTRY.get_or_init(|| {
        let mut registry = ConverterRegistry::new();
        registry.register_builtin_converters();
        registry
    })
}

/// Registry of available converters, keyed by target type
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: HashMap<ValueType, Arc<dyn Converter>>,
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.converters.keys().map(|t| t.name()).collect();
        names.sort_unstable();
        f.debug_struct("ConverterRegistry")
            .field("types", &names)
            .finish()
    }
}

impl ConverterRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// Create a registry seeded with the built-in converters
    pub fn with_builtins() -> Self {
        builtin_registry().clone()
    }

    fn register_builtin_converters(&mut self) {
        self.register_fn(ValueType::Integer, |s| Ok(TypedValue::Integer(s.parse()?)));
        self.register_fn(ValueType::Boolean, |s| {
            Ok(TypedValue::Boolean(s.eq_ignore_ascii_case("true")))
        });
        self.register_fn(ValueType::String, |s| Ok(TypedValue::String(s.to_string())));
        self.register_fn(ValueType::Date, |s| {
            // chrono accepts unpadded fields; ISO dates are always zero-padded
            if s.len() != ISO_DATE_LEN {
                return Err(ConvertError::new("expected a YYYY-MM-DD date"));
            }
            Ok(TypedValue::Date(NaiveDate::parse_from_str(s, DATE_FORMAT)?))
        });
        self.register_fn(ValueType::Time, |s| {
            Ok(TypedValue::Time(s.parse::<NaiveTime>()?))
        });
        self.register_fn(ValueType::DateTime, |s| {
            let dt = s
                .parse::<NaiveDateTime>()
                .or_else(|_| NaiveDateTime::parse_from_str(s, DATETIME_MINUTES_FORMAT))?;
            Ok(TypedValue::DateTime(dt))
        });
        self.register_fn(ValueType::ZonedDateTime, |s| {
            Ok(TypedValue::ZonedDateTime(DateTime::parse_from_rfc3339(s)?))
        });
    }

    /// Register a converter, replacing any existing one for the same type
    pub fn register(&mut self, value_type: ValueType, converter: Arc<dyn Converter>) {
        if self.converters.contains_key(&value_type) {
            log::debug!("Overriding converter for type '{}'", value_type);
        }
        self.converters.insert(value_type, converter);
    }

    /// Register a function as a converter
    pub fn register_fn<F>(&mut self, value_type: ValueType, func: F)
    where
        F: Fn(&str) -> std::result::Result<TypedValue, ConvertError> + Send + Sync + 'static,
    {
        self.register(value_type, Arc::new(FnConverter::new(func)));
    }

    /// Get a converter by type
    pub fn get(&self, value_type: &ValueType) -> Option<&Arc<dyn Converter>> {
        self.converters.get(value_type)
    }

    /// Check if a converter is registered for a type
    pub fn contains(&self, value_type: &ValueType) -> bool {
        self.converters.contains_key(value_type)
    }

    /// Convert raw text using the converter registered for `value_type`
    pub fn convert(&self, value_type: &ValueType, raw: &str) -> Result<TypedValue> {
        let converter = self
            .converters
            .get(value_type)
            .ok_or_else(|| Error::unsupported_type(value_type.name()))?;

        converter
            .convert(raw)
            .map_err(|e| Error::conversion_failed(value_type.name(), raw, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[derive(Debug, PartialEq)]
    struct Money {
        cents: i64,
    }

    fn money_converter(raw: &str) -> std::result::Result<TypedValue, ConvertError> {
        let (units, cents) = raw
            .split_once('.')
            .ok_or_else(|| ConvertError::new("expected <units>.<cents>"))?;
        Ok(TypedValue::custom(Money {
            cents: units.parse::<i64>()? * 100 + cents.parse::<i64>()?,
        }))
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ConverterRegistry::with_builtins();
        for value_type in ValueType::builtins() {
            assert!(registry.contains(&value_type), "missing {}", value_type);
        }
        assert!(!registry.contains(&ValueType::custom("Money")));
    }

    #[test]
    fn test_integer_converter() {
        let registry = ConverterRegistry::with_builtins();
        assert_eq!(
            registry.convert(&ValueType::Integer, "1722222222").unwrap(),
            TypedValue::Integer(1722222222)
        );
        assert_eq!(
            registry.convert(&ValueType::Integer, "-7").unwrap().as_i64(),
            Some(-7)
        );
    }

    #[test]
    fn test_integer_converter_rejects_garbage() {
        let registry = ConverterRegistry::with_builtins();
        let err = registry.convert(&ValueType::Integer, "forty-two").unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::ConversionFailed {
                type_name: "integer".into(),
                raw: "forty-two".into()
            }
        );
        assert!(err.to_string().contains("invalid digit"));
    }

    #[test]
    fn test_boolean_converter_is_lenient() {
        let registry = ConverterRegistry::with_builtins();
        let convert = |s: &str| {
            registry
                .convert(&ValueType::Boolean, s)
                .unwrap()
                .as_bool()
                .unwrap()
        };
        assert!(convert("true"));
        assert!(convert("TRUE"));
        assert!(convert("True"));
        assert!(!convert("false"));
        assert!(!convert("yes"));
        assert!(!convert(""));
    }

    #[test]
    fn test_string_converter_is_identity() {
        let registry = ConverterRegistry::with_builtins();
        assert_eq!(
            registry.convert(&ValueType::String, " a:b ").unwrap(),
            TypedValue::String(" a:b ".into())
        );
    }

    #[test]
    fn test_date_round_trip() {
        let registry = ConverterRegistry::with_builtins();
        let value = registry.convert(&ValueType::Date, "2024-01-15").unwrap();
        assert_eq!(value.as_date(), NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(value.to_property_string().as_deref(), Some("2024-01-15"));
    }

    #[test]
    fn test_time_round_trip() {
        let registry = ConverterRegistry::with_builtins();
        let value = registry.convert(&ValueType::Time, "10:30:15").unwrap();
        assert_eq!(value.as_time(), NaiveTime::from_hms_opt(10, 30, 15));
        assert_eq!(value.to_property_string().as_deref(), Some("10:30:15"));
    }

    #[test]
    fn test_datetime_round_trip() {
        let registry = ConverterRegistry::with_builtins();
        let value = registry
            .convert(&ValueType::DateTime, "2024-01-15T10:30:00")
            .unwrap();
        assert_eq!(
            value.as_datetime(),
            NaiveDate::from_ymd_opt(2024, 1, 15).and_then(|d| d.and_hms_opt(10, 30, 0))
        );
        assert_eq!(
            value.to_property_string().as_deref(),
            Some("2024-01-15T10:30:00")
        );
    }

    #[test]
    fn test_datetime_without_seconds() {
        let registry = ConverterRegistry::with_builtins();
        let value = registry
            .convert(&ValueType::DateTime, "2024-01-15T10:30")
            .unwrap();
        assert_eq!(
            value.as_datetime(),
            NaiveDate::from_ymd_opt(2024, 1, 15).and_then(|d| d.and_hms_opt(10, 30, 0))
        );
        assert_eq!(
            value.to_property_string().as_deref(),
            Some("2024-01-15T10:30:00")
        );

        let value = registry
            .convert(&ValueType::DateTime, "2024-01-15T10:30:00.250")
            .unwrap();
        assert_eq!(
            value.to_property_string().as_deref(),
            Some("2024-01-15T10:30:00.250")
        );
        assert!(registry.convert(&ValueType::DateTime, "2024-01-15T10").is_err());
    }

    #[test]
    fn test_date_requires_zero_padding() {
        let registry = ConverterRegistry::with_builtins();
        let err = registry.convert(&ValueType::Date, "2024-1-5").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ConversionFailed { .. }));
        assert!(err.to_string().contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_zoned_datetime_utc_round_trip() {
        let registry = ConverterRegistry::with_builtins();
        let value = registry
            .convert(&ValueType::ZonedDateTime, "2024-01-15T10:30:00Z")
            .unwrap();
        assert_eq!(value.as_zoned_datetime().unwrap().offset().local_minus_utc(), 0);
        assert_eq!(
            value.to_property_string().as_deref(),
            Some("2024-01-15T10:30:00Z")
        );
    }

    #[test]
    fn test_zoned_datetime_round_trip() {
        let registry = ConverterRegistry::with_builtins();
        let value = registry
            .convert(&ValueType::ZonedDateTime, "2024-01-15T10:30:00+02:00")
            .unwrap();
        let dt = value.as_zoned_datetime().unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 2 * 3600);
        assert_eq!(
            value.to_property_string().as_deref(),
            Some("2024-01-15T10:30:00+02:00")
        );
    }

    #[test]
    fn test_malformed_date_fails() {
        let registry = ConverterRegistry::with_builtins();
        let err = registry.convert(&ValueType::Date, "2024-13-45").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ConversionFailed { .. }));
        assert!(err.to_string().contains("Cannot convert '2024-13-45' to date"));
    }

    #[test]
    fn test_unsupported_type() {
        let registry = ConverterRegistry::with_builtins();
        let err = registry
            .convert(&ValueType::custom("Money"), "1.00")
            .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::UnsupportedType {
                type_name: "Money".into()
            }
        );
    }

    #[test]
    fn test_custom_converter() {
        let mut registry = ConverterRegistry::with_builtins();
        registry.register_fn(ValueType::custom("Money"), money_converter);

        let value = registry
            .convert(&ValueType::custom("Money"), "12.34")
            .unwrap();
        assert_eq!(value.downcast_ref::<Money>(), Some(&Money { cents: 1234 }));
        assert_eq!(value.downcast_ref::<String>(), None);
        assert_eq!(value.to_property_string(), None);

        let err = registry
            .convert(&ValueType::custom("Money"), "12")
            .unwrap_err();
        assert!(err.to_string().contains("expected <units>.<cents>"));
    }

    #[test]
    fn test_register_overrides_builtin() {
        let mut registry = ConverterRegistry::with_builtins();
        registry.register_fn(ValueType::Boolean, |s| {
            Ok(TypedValue::Boolean(matches!(s, "1" | "yes" | "true")))
        });

        assert_eq!(
            registry.convert(&ValueType::Boolean, "yes").unwrap(),
            TypedValue::Boolean(true)
        );
        // The shared built-in table is untouched
        assert_eq!(
            ConverterRegistry::with_builtins()
                .convert(&ValueType::Boolean, "yes")
                .unwrap(),
            TypedValue::Boolean(false)
        );
    }

    #[test]
    fn test_empty_registry() {
        let registry = ConverterRegistry::new();
        assert!(!registry.contains(&ValueType::Integer));
        assert!(registry.get(&ValueType::Integer).is_none());
        assert!(registry.convert(&ValueType::Integer, "1").is_err());
    }

    #[test]
    fn test_value_type_names() {
        assert_eq!("int".parse::<ValueType>().unwrap(), ValueType::Integer);
        assert_eq!("bool".parse::<ValueType>().unwrap(), ValueType::Boolean);
        assert_eq!(
            "zoned".parse::<ValueType>().unwrap(),
            ValueType::ZonedDateTime
        );
        assert_eq!(
            "Money".parse::<ValueType>().unwrap(),
            ValueType::custom("Money")
        );
        for value_type in ValueType::builtins() {
            assert_eq!(value_type.name().parse::<ValueType>().unwrap(), value_type);
        }
    }

    #[test]
    fn test_custom_values_compare_by_identity() {
        let a = TypedValue::custom(Money { cents: 1 });
        let b = TypedValue::custom(Money { cents: 1 });
        assert_eq!(a, a.clone());
        assert!(a != b);
        assert_eq!(a.clone().downcast::<Money>().map(|m| m.cents), Some(1));
    }
}
