//! propconf-core: Property resolution with placeholder defaults and typed access
//!
//! This crate resolves lookup expressions (`key`, `${key}`, `${key:default}`)
//! against an immutable property table built from the process environment
//! overlaid with explicit sources, and converts the results to typed values
//! through a pluggable converter registry.
//!
//! # Example
//!
//! ```rust
//! use propconf_core::{PropertyResolver, PropertyStore};
//!
//! let store = PropertyStore::builder()
//!     .with_properties_str("app.properties", "timeout=42\napp.version=1.0.0\n")
//!     .try_build()
//!     .unwrap();
//! let resolver = PropertyResolver::new(store);
//!
//! assert_eq!(resolver.get_string("${app.version}").unwrap().as_deref(), Some("1.0.0"));
//! assert_eq!(resolver.get_string("${app.title:APP_NAME:xxxx}").unwrap().as_deref(), Some("xxxx"));
//! assert_eq!(resolver.get_i64("timeout").unwrap(), Some(42));
//! ```

pub mod converter;
pub mod error;
pub mod expression;
pub mod loader;
pub mod scan;

mod resolver;
mod store;

pub use converter::{ConvertError, Converter, ConverterRegistry, TypedValue, ValueType};
pub use error::{Error, ErrorKind, Result};
pub use expression::Expression;
pub use loader::{PropertyMap, SourceFormat};
pub use resolver::{PropertyResolver, ResolverOptions, DEFAULT_MAX_DEPTH, DEFAULT_MAX_NESTING};
pub use scan::Resource;
pub use store::{PropertyStore, PropertyStoreBuilder, ENV_SOURCE};
