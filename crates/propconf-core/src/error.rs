//! Error types for propconf
//!
//! Errors are structured: a kind, the property key involved, an optional
//! underlying cause and an actionable help message.

use std::fmt;

/// Result type alias for propconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for propconf operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Property key (or expression) the error relates to
    pub key: Option<String>,
    /// Source the failing input came from (file name, "env", ...)
    pub source_name: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required placeholder or accessor found no value
    RequiredPropertyMissing,
    /// No converter registered for the requested type
    UnsupportedType { type_name: String },
    /// The registered converter rejected the raw text
    ConversionFailed { type_name: String, raw: String },
    /// Self- or mutually-referential placeholder chain
    ResolutionCycle,
    /// Malformed properties or YAML input
    Parse,
    /// I/O error (file not found, unreadable directory, ...)
    Io,
}

impl Error {
    fn with_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            key: None,
            source_name: None,
            help: None,
            cause: None,
        }
    }

    /// Create a required-property-missing error
    pub fn required_missing(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            help: Some(format!(
                "Define '{}' in a property source or provide a default: ${{{}:default}}",
                key, key
            )),
            key: Some(key),
            ..Self::with_kind(ErrorKind::RequiredPropertyMissing)
        }
    }

    /// Create an unsupported type error
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            help: Some(format!(
                "Register a converter for '{}' before requesting typed values",
                type_name
            )),
            ..Self::with_kind(ErrorKind::UnsupportedType { type_name })
        }
    }

    /// Create a conversion failure error
    pub fn conversion_failed(
        type_name: impl Into<String>,
        raw: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        let type_name = type_name.into();
        Self {
            help: Some(format!("Ensure the value is a valid {}", type_name)),
            cause: Some(cause.into()),
            ..Self::with_kind(ErrorKind::ConversionFailed {
                type_name,
                raw: raw.into(),
            })
        }
    }

    /// Create a resolution cycle error
    pub fn resolution_cycle(key: impl Into<String>, chain: Vec<String>) -> Self {
        Self {
            key: Some(key.into()),
            help: Some("Break the cycle by replacing one of the references with a literal".into()),
            cause: Some(format!("Chain: {}", chain.join(" → "))),
            ..Self::with_kind(ErrorKind::ResolutionCycle)
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::with_kind(ErrorKind::Parse)
        }
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::with_kind(ErrorKind::Io)
        }
    }

    /// Add key context to the error
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Add the name of the source the input came from
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// True if this is a missing-property error
    pub fn is_missing(&self) -> bool {
        self.kind == ErrorKind::RequiredPropertyMissing
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::RequiredPropertyMissing => match &self.key {
                Some(key) => write!(f, "Required property not found: {}", key)?,
                None => write!(f, "Required property not found")?,
            },
            ErrorKind::UnsupportedType { type_name } => {
                write!(f, "Unsupported value type: {}", type_name)?
            }
            ErrorKind::ConversionFailed { type_name, raw } => {
                write!(f, "Cannot convert '{}' to {}", raw, type_name)?
            }
            ErrorKind::ResolutionCycle => write!(f, "Resolution cycle detected")?,
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::Io => write!(f, "I/O error")?,
        }

        if let Some(key) = &self.key {
            if self.kind != ErrorKind::RequiredPropertyMissing {
                write!(f, "\n  Key: {}", key)?;
            }
        }

        if let Some(source) = &self.source_name {
            write!(f, "\n  Source: {}", source)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_missing_display() {
        let err = Error::required_missing("app.title");
        let display = err.to_string();

        assert!(display.contains("Required property not found: app.title"));
        assert!(display.contains("${app.title:default}"));
        assert!(err.is_missing());
    }

    #[test]
    fn test_unsupported_type_display() {
        let err = Error::unsupported_type("Money");
        let display = err.to_string();

        assert!(display.contains("Unsupported value type: Money"));
        assert!(display.contains("Help: Register a converter for 'Money'"));
        assert!(!err.is_missing());
    }

    #[test]
    fn test_conversion_failed_display() {
        let err = Error::conversion_failed("integer", "abc", "invalid digit found in string")
            .with_key("timeout");
        let display = err.to_string();

        assert!(display.contains("Cannot convert 'abc' to integer"));
        assert!(display.contains("Key: timeout"));
        assert!(display.contains("invalid digit"));
        assert_eq!(
            err.kind,
            ErrorKind::ConversionFailed {
                type_name: "integer".into(),
                raw: "abc".into()
            }
        );
    }

    #[test]
    fn test_resolution_cycle_display() {
        let err = Error::resolution_cycle("a", vec!["a".into(), "b".into(), "a".into()]);
        let display = err.to_string();

        assert!(display.contains("Resolution cycle detected"));
        assert!(display.contains("a → b → a"));
        assert!(display.contains("Key: a"));
    }

    #[test]
    fn test_parse_error_with_source() {
        let err = Error::parse("unterminated escape").with_source_name("app.properties");
        let display = err.to_string();

        assert!(display.contains("Parse error"));
        assert!(display.contains("Source: app.properties"));
        assert!(display.contains("unterminated escape"));
    }

    #[test]
    fn test_with_help() {
        let err = Error::io("permission denied").with_help("Check file permissions");
        assert!(err.to_string().contains("Help: Check file permissions"));
    }
}
