//! Lookup expression parsing
//!
//! Parses lookup expressions like:
//! - `app.version` - plain key
//! - `${app.version}` - required placeholder
//! - `${app.version:1.0.0}` - placeholder with default
//! - `${app.title:APP_NAME:xxxx}` - default containing colons (collapsed on fallback)
//!
//! Only a single placeholder wrapping the whole expression is recognized.
//! Strings such as `${IP}:${PORT}` are not split; they are handled by the
//! same rules as any other text.

/// Opening marker of a placeholder
pub const PLACEHOLDER_PREFIX: &str = "${";
/// Closing marker of a placeholder
pub const PLACEHOLDER_SUFFIX: &str = "}";
/// Separator between key and default, and between fallback segments
pub const DEFAULT_SEPARATOR: char = ':';

/// A parsed lookup expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// A bare key: `app.version`
    Plain(String),
    /// A placeholder: `${key}` or `${key:default}`
    Placeholder {
        /// Key inside the braces, up to the first `:`
        key: String,
        /// Everything after the first `:`, if a `:` was present
        default: Option<String>,
    },
}

impl Expression {
    /// The key this expression looks up
    pub fn key(&self) -> &str {
        match self {
            Expression::Plain(key) => key,
            Expression::Placeholder { key, .. } => key,
        }
    }

    /// The default literal, if this is a placeholder with one
    pub fn default_value(&self) -> Option<&str> {
        match self {
            Expression::Plain(_) => None,
            Expression::Placeholder { default, .. } => default.as_deref(),
        }
    }

    /// Check if this is a placeholder expression
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Expression::Placeholder { .. })
    }
}

/// Parse a lookup expression. Never fails; degenerate input yields empty keys.
pub fn parse(raw: &str) -> Expression {
    let interior = raw
        .strip_prefix(PLACEHOLDER_PREFIX)
        .and_then(|rest| rest.strip_suffix(PLACEHOLDER_SUFFIX));

    match interior {
        Some(interior) => match interior.split_once(DEFAULT_SEPARATOR) {
            Some((key, default)) => Expression::Placeholder {
                key: key.to_string(),
                default: Some(default.to_string()),
            },
            None => Expression::Placeholder {
                key: interior.to_string(),
                default: None,
            },
        },
        None => Expression::Plain(raw.to_string()),
    }
}

/// Check if a string is a whole placeholder expression (`${...}`)
pub fn is_placeholder(raw: &str) -> bool {
    raw.strip_prefix(PLACEHOLDER_PREFIX)
        .is_some_and(|rest| rest.ends_with(PLACEHOLDER_SUFFIX))
}

/// Collapse a fallback chain: keep only the text after the last `:`.
///
/// `"x:y:z"` becomes `"z"`, `"lonely"` stays `"lonely"`, `"a:"` becomes `""`.
/// Applied to every plain-key value and every unresolved default, so ordinary
/// values containing colons (URLs, times) are truncated as well.
pub fn collapse(value: &str) -> &str {
    match value.rfind(DEFAULT_SEPARATOR) {
        Some(idx) => &value[idx + DEFAULT_SEPARATOR.len_utf8()..],
        None => value,
    }
}
