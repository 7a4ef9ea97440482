//! Property resolution
//!
//! [`PropertyResolver`] answers lookup expressions against a
//! [`PropertyStore`], applying default fallback and, for typed access,
//! dispatching through a [`ConverterRegistry`].
//!
//! Resolution rules:
//! - `key` - store lookup; a found value has its fallback chain collapsed
//!   (`"x:y:z"` → `"z"`); a missing key is `None`
//! - `${key}` - like `key`, but a missing key is an error
//! - `${key:default}` - like `key`, but a missing key yields the collapsed default
//! - a stored value that is itself a whole placeholder (`a = ${b}`) is
//!   resolved in turn, with cycle detection

use std::any::Any;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

use crate::converter::{Converter, ConvertError, ConverterRegistry, TypedValue, ValueType};
use crate::error::{Error, Result};
use crate::expression::{self, Expression};
use crate::store::PropertyStore;

/// Default bound on transitive reference depth
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default bound on nested re-entries while resolving one expression
pub const DEFAULT_MAX_NESTING: usize = 128;

/// Options for property resolution
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Maximum number of stored values that may be followed while resolving a
    /// single expression (`a = ${b}`, `b = ${c}`, ...)
    pub max_depth: usize,

    /// Maximum number of nested lookups (placeholder unwraps plus stored-value
    /// follows) for a single expression, e.g. `${${${key}}}`
    pub max_nesting: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }
}

/// Resolves lookup expressions against an immutable property snapshot
#[derive(Debug, Clone)]
pub struct PropertyResolver {
    store: Arc<PropertyStore>,
    converters: Arc<ConverterRegistry>,
    options: ResolverOptions,
}

impl PropertyResolver {
    /// Create a resolver with the built-in converters
    pub fn new(store: PropertyStore) -> Self {
        Self::with_options(store, ResolverOptions::default())
    }

    /// Create a resolver with custom options
    pub fn with_options(store: PropertyStore, options: ResolverOptions) -> Self {
        Self {
            store: Arc::new(store),
            converters: Arc::new(ConverterRegistry::with_builtins()),
            options,
        }
    }

    /// Create a resolver with a custom converter registry
    pub fn with_converters(store: PropertyStore, converters: ConverterRegistry) -> Self {
        Self {
            store: Arc::new(store),
            converters: Arc::new(converters),
            options: ResolverOptions::default(),
        }
    }

    /// The underlying property snapshot
    pub fn store(&self) -> &PropertyStore {
        &self.store
    }

    /// The converters used for typed access
    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    /// Options this resolver was built with
    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Register a converter on this resolver.
    ///
    /// Clones of this resolver made earlier keep their own registry.
    pub fn register_converter(&mut self, value_type: ValueType, converter: Arc<dyn Converter>) {
        Arc::make_mut(&mut self.converters).register(value_type, converter);
    }

    /// Register a function as a converter on this resolver
    pub fn register_converter_fn<F>(&mut self, value_type: ValueType, func: F)
    where
        F: Fn(&str) -> std::result::Result<TypedValue, ConvertError> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.converters).register_fn(value_type, func);
    }

    /// Check if the literal key is present. No expression parsing.
    pub fn has(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }

    /// Resolve an expression to a string.
    ///
    /// Returns `Ok(None)` for blank expressions and for plain keys that are
    /// absent. A `${key}` placeholder whose key is absent is an error.
    pub fn get_string(&self, expr: &str) -> Result<Option<String>> {
        let mut resolution_stack = Vec::new();
        self.resolve(expr, &mut resolution_stack, 0)
    }

    /// Resolve an expression, failing if it yields no value
    pub fn get_required(&self, expr: &str) -> Result<String> {
        self.get_string(expr)?
            .ok_or_else(|| Error::required_missing(expr))
    }

    /// Resolve an expression and convert it to `value_type`
    pub fn get_typed(&self, expr: &str, value_type: &ValueType) -> Result<Option<TypedValue>> {
        match self.get_string(expr)? {
            Some(raw) => self.convert(expr, value_type, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Resolve and convert, failing if the expression yields no value
    pub fn get_required_typed(&self, expr: &str, value_type: &ValueType) -> Result<TypedValue> {
        self.get_typed(expr, value_type)?
            .ok_or_else(|| Error::required_missing(expr))
    }

    /// Resolve and convert to an integer
    pub fn get_i64(&self, expr: &str) -> Result<Option<i64>> {
        self.get_builtin(expr, ValueType::Integer, TypedValue::as_i64)
    }

    /// Resolve and convert to a boolean (`true`, ignoring case; anything else is `false`)
    pub fn get_bool(&self, expr: &str) -> Result<Option<bool>> {
        self.get_builtin(expr, ValueType::Boolean, TypedValue::as_bool)
    }

    /// Resolve and convert to a date (`YYYY-MM-DD`)
    pub fn get_date(&self, expr: &str) -> Result<Option<NaiveDate>> {
        self.get_builtin(expr, ValueType::Date, TypedValue::as_date)
    }

    /// Resolve and convert to a time of day
    pub fn get_time(&self, expr: &str) -> Result<Option<NaiveTime>> {
        self.get_builtin(expr, ValueType::Time, TypedValue::as_time)
    }

    /// Resolve and convert to a local date-time
    pub fn get_datetime(&self, expr: &str) -> Result<Option<NaiveDateTime>> {
        self.get_builtin(expr, ValueType::DateTime, TypedValue::as_datetime)
    }

    /// Resolve and convert to a date-time with a UTC offset
    pub fn get_zoned_datetime(&self, expr: &str) -> Result<Option<DateTime<FixedOffset>>> {
        self.get_builtin(expr, ValueType::ZonedDateTime, TypedValue::as_zoned_datetime)
    }

    /// Resolve, convert with the converter registered for `value_type`, and
    /// downcast the result to `T`.
    pub fn get_custom<T: Any + Send + Sync>(
        &self,
        expr: &str,
        value_type: &ValueType,
    ) -> Result<Option<Arc<T>>> {
        let Some(raw) = self.get_string(expr)? else {
            return Ok(None);
        };
        let value = self.convert(expr, value_type, &raw)?;
        let produced = value.type_name();
        value.downcast::<T>().map(Some).ok_or_else(|| {
            Error::conversion_failed(
                value_type.name(),
                &raw,
                format!(
                    "Converter produced a {} value, expected {}",
                    produced,
                    std::any::type_name::<T>()
                ),
            )
            .with_key(expr)
        })
    }

    /// Typed access through a built-in type. The registered converter may have
    /// been replaced, so a variant mismatch is reported, not assumed away.
    fn get_builtin<T>(
        &self,
        expr: &str,
        value_type: ValueType,
        extract: fn(&TypedValue) -> Option<T>,
    ) -> Result<Option<T>> {
        let Some(raw) = self.get_string(expr)? else {
            return Ok(None);
        };
        let value = self.convert(expr, &value_type, &raw)?;
        extract(&value).map(Some).ok_or_else(|| {
            Error::conversion_failed(
                value_type.name(),
                &raw,
                format!("Converter produced a {} value", value.type_name()),
            )
            .with_key(expr)
        })
    }

    fn convert(&self, expr: &str, value_type: &ValueType, raw: &str) -> Result<TypedValue> {
        self.converters
            .convert(value_type, raw)
            .map_err(|e| e.with_key(expr))
    }

    /// Resolve an expression with the keys currently being followed on the
    /// stack. `depth` counts the re-entries that led here.
    fn resolve(
        &self,
        expr: &str,
        resolution_stack: &mut Vec<String>,
        depth: usize,
    ) -> Result<Option<String>> {
        if expr.trim().is_empty() {
            return Ok(None);
        }

        if depth > self.options.max_nesting {
            let mut chain = resolution_stack.clone();
            chain.push(truncate(expr).to_string());
            log::warn!(
                "Resolution exceeded {} nested lookups: {}",
                self.options.max_nesting,
                chain.join(" → ")
            );
            return Err(Error::resolution_cycle(truncate(expr), chain)
                .with_help("Reduce the nesting of placeholders or raise ResolverOptions::max_nesting"));
        }

        log::trace!("Resolving '{}'", expr);

        match expression::parse(expr) {
            Expression::Placeholder {
                key,
                default: Some(default),
            } => match self.resolve(&key, resolution_stack, depth + 1)? {
                Some(value) => Ok(Some(value)),
                None => {
                    log::trace!("'{}' not found, falling back to default '{}'", key, default);
                    Ok(Some(expression::collapse(&default).to_string()))
                }
            },

            Expression::Placeholder { key, default: None } => {
                match self.resolve(&key, resolution_stack, depth + 1)? {
                    Some(value) => Ok(Some(value)),
                    None => Err(Error::required_missing(key)),
                }
            }

            Expression::Plain(key) => self.resolve_plain(&key, resolution_stack, depth),
        }
    }

    /// Look up a literal key
    fn resolve_plain(
        &self,
        key: &str,
        resolution_stack: &mut Vec<String>,
        depth: usize,
    ) -> Result<Option<String>> {
        let Some(value) = self.store.get(key) else {
            return Ok(None);
        };

        if !expression::is_placeholder(value) {
            return Ok(Some(expression::collapse(value).to_string()));
        }

        if resolution_stack.iter().any(|k| k == key)
            || resolution_stack.len() >= self.options.max_depth
        {
            let mut chain = resolution_stack.clone();
            chain.push(key.to_string());
            log::warn!("Resolution cycle detected: {}", chain.join(" → "));
            return Err(Error::resolution_cycle(key, chain));
        }

        resolution_stack.push(key.to_string());
        let result = self.resolve(value, resolution_stack, depth + 1);
        resolution_stack.pop();

        result
    }
}

/// Keep error messages readable for pathological expressions
fn truncate(expr: &str) -> &str {
    const LIMIT: usize = 64;
    match expr.char_indices().nth(LIMIT) {
        Some((idx, _)) => &expr[..idx],
        None => expr,
    }
}
