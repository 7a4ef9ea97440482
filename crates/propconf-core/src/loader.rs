//! Property source loaders
//!
//! Turn properties files and YAML documents into the flat key→string tables
//! a [`PropertyStore`](crate::PropertyStore) is built from. Nested YAML
//! mappings are flattened into dotted keys (`app.version`).

use std::path::Path;

use indexmap::IndexMap;
use serde_yaml::Value as YamlValue;

use crate::error::{Error, Result};

/// A flat, insertion-ordered key→string table
pub type PropertyMap = IndexMap<String, String>;

/// Format of a property source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// `key=value` lines
    Properties,
    /// YAML document, flattened to dotted keys
    Yaml,
}

impl SourceFormat {
    /// Pick a format from the file extension: `.yaml`/`.yml` are YAML,
    /// everything else is treated as a properties file.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                SourceFormat::Yaml
            }
            _ => SourceFormat::Properties,
        }
    }

    /// Parse source text in this format
    pub fn parse(self, text: &str) -> Result<PropertyMap> {
        match self {
            SourceFormat::Properties => parse_properties(text),
            SourceFormat::Yaml => flatten_yaml(text),
        }
    }
}

/// Load a file, choosing the format from its extension
pub fn load_file(path: impl AsRef<Path>) -> Result<PropertyMap> {
    let path = path.as_ref();
    let format = SourceFormat::from_path(path);
    let content = read_source(path)?;
    let props = format
        .parse(&content)
        .map_err(|e| e.with_source_name(display_name(path)))?;
    log::debug!(
        "Loaded {} properties from {} ({:?})",
        props.len(),
        path.display(),
        format
    );
    Ok(props)
}

/// Load a properties file
pub fn load_properties_file(path: impl AsRef<Path>) -> Result<PropertyMap> {
    let path = path.as_ref();
    let content = read_source(path)?;
    parse_properties(&content).map_err(|e| e.with_source_name(display_name(path)))
}

/// Load a YAML file and flatten it
pub fn load_yaml_file(path: impl AsRef<Path>) -> Result<PropertyMap> {
    let path = path.as_ref();
    let content = read_source(path)?;
    flatten_yaml(&content).map_err(|e| e.with_source_name(display_name(path)))
}

/// Name used to tag values loaded from `path`
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        Error::io(format!("Failed to read file '{}': {}", path.display(), e))
            .with_source_name(display_name(path))
    })
}

/// Parse properties-file text.
///
/// Supports `#`/`!` comments, `=`, `:` or whitespace separators, trailing
/// backslash line continuation and the usual escapes including `\uXXXX`.
/// Later duplicates of a key replace earlier ones.
pub fn parse_properties(text: &str) -> Result<PropertyMap> {
    let mut props = PropertyMap::new();
    let mut lines = text.lines().enumerate();

    while let Some((idx, line)) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = trimmed.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_key_value(&logical);
        let key = unescape(key).map_err(|e| Error::parse(format!("line {}: {}", idx + 1, e)))?;
        let value =
            unescape(value).map_err(|e| Error::parse(format!("line {}: {}", idx + 1, e)))?;
        props.insert(key, value);
    }

    Ok(props)
}

/// An odd number of trailing backslashes escapes the line break
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

const WHITESPACE: [char; 3] = [' ', '\t', '\x0c'];

fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches(WHITESPACE);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches(WHITESPACE);
    }
    (key, rest)
}

fn unescape(raw: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .ok_or_else(|| format!("Malformed \\uXXXX escape: \\u{}", hex))?;
                let ch = char::from_u32(code)
                    .ok_or_else(|| format!("Invalid unicode escape: \\u{}", hex))?;
                out.push(ch);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    Ok(out)
}

/// Parse a YAML document and flatten it into dotted keys.
///
/// - nested mappings: `app: {version: 1.0}` → `app.version = "1.0"`
/// - scalars are stringified, null becomes `""`
/// - sequences produce `key = "a,b"` plus one `key[i]` entry per item
pub fn flatten_yaml(text: &str) -> Result<PropertyMap> {
    let value: YamlValue = serde_yaml::from_str(text).map_err(|e| {
        let location = e
            .location()
            .map(|loc| format!(" at line {}, column {}", loc.line(), loc.column()))
            .unwrap_or_default();
        Error::parse(format!("Invalid YAML{}: {}", location, e))
    })?;

    let mut props = PropertyMap::new();
    match value {
        YamlValue::Null => {}
        YamlValue::Mapping(map) => {
            for (k, v) in &map {
                flatten_into(v, scalar_to_string(k), &mut props);
            }
        }
        other => {
            return Err(Error::parse(format!(
                "Expected a mapping at the document root, found {}",
                yaml_type_name(&other)
            )))
        }
    }

    Ok(props)
}

fn flatten_into(value: &YamlValue, key: String, props: &mut PropertyMap) {
    match value {
        YamlValue::Mapping(map) => {
            for (k, v) in map {
                flatten_into(v, format!("{}.{}", key, scalar_to_string(k)), props);
            }
        }
        YamlValue::Sequence(seq) => {
            let joined = seq.iter().map(render_item).collect::<Vec<_>>().join(",");
            props.insert(key.clone(), joined);
            for (i, item) in seq.iter().enumerate() {
                flatten_into(item, format!("{}[{}]", key, i), props);
            }
        }
        YamlValue::Tagged(tagged) => flatten_into(&tagged.value, key, props),
        scalar => {
            props.insert(key, scalar_to_string(scalar));
        }
    }
}

fn scalar_to_string(value: &YamlValue) -> String {
    match value {
        YamlValue::Null => String::new(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::String(s) => s.clone(),
        YamlValue::Tagged(tagged) => scalar_to_string(&tagged.value),
        other => render_item(other),
    }
}

/// Sequence items: scalars as-is, nested structures as compact JSON
fn render_item(value: &YamlValue) -> String {
    match value {
        YamlValue::Sequence(_) | YamlValue::Mapping(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
        scalar => scalar_to_string(scalar),
    }
}

fn yaml_type_name(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "null",
        YamlValue::Bool(_) => "boolean",
        YamlValue::Number(_) => "number",
        YamlValue::String(_) => "string",
        YamlValue::Sequence(_) => "sequence",
        YamlValue::Mapping(_) => "mapping",
        YamlValue::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_properties_basic() {
        let props = parse_properties(
            "# comment\n! also comment\n\nname=henryhe\napp.version = 1.0.0\ntimeout: 1722222222\nspaced value here\n",
        )
        .unwrap();

        assert_eq!(props.get("name").map(String::as_str), Some("henryhe"));
        assert_eq!(props.get("app.version").map(String::as_str), Some("1.0.0"));
        assert_eq!(props.get("timeout").map(String::as_str), Some("1722222222"));
        assert_eq!(props.get("spaced").map(String::as_str), Some("value here"));
        assert_eq!(props.len(), 4);
    }

    #[test]
    fn test_parse_properties_keeps_colons_in_value() {
        let props = parse_properties("db.url=jdbc:mysql://localhost:3306/app\n").unwrap();
        assert_eq!(
            props.get("db.url").map(String::as_str),
            Some("jdbc:mysql://localhost:3306/app")
        );
    }

    #[test]
    fn test_parse_properties_continuation() {
        let props = parse_properties("fruits = apple, \\\n    banana, \\\n    pear\nnext=1\n").unwrap();
        assert_eq!(
            props.get("fruits").map(String::as_str),
            Some("apple, banana, pear")
        );
        assert_eq!(props.get("next").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_parse_properties_escaped_backslash_is_not_continuation() {
        let props = parse_properties("path=C:\\\\\nother=x\n").unwrap();
        assert_eq!(props.get("path").map(String::as_str), Some("C:\\"));
        assert_eq!(props.get("other").map(String::as_str), Some("x"));
    }

    #[test]
    fn test_parse_properties_escapes() {
        let props =
            parse_properties("key\\=with\\:seps = tab\\there\ngreeting=\\u4f60\\u597d\n").unwrap();
        assert_eq!(
            props.get("key=with:seps").map(String::as_str),
            Some("tab\there")
        );
        assert_eq!(props.get("greeting").map(String::as_str), Some("你好"));
    }

    #[test]
    fn test_parse_properties_empty_value_and_duplicates() {
        let props = parse_properties("empty=\nempty2\nk=1\nk=2\n").unwrap();
        assert_eq!(props.get("empty").map(String::as_str), Some(""));
        assert_eq!(props.get("empty2").map(String::as_str), Some(""));
        assert_eq!(props.get("k").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_parse_properties_bad_unicode_escape() {
        let err = parse_properties("ok=1\nbad=\\u12\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_flatten_yaml_nested() {
        let props = flatten_yaml(
            r#"
app:
  name: demo
  version: 1.0.0
  debug: true
  port: 8080
  ratio: 1.5
  nothing: ~
server:
  tls:
    enabled: false
"#,
        )
        .unwrap();

        assert_eq!(props.get("app.name").map(String::as_str), Some("demo"));
        assert_eq!(props.get("app.version").map(String::as_str), Some("1.0.0"));
        assert_eq!(props.get("app.debug").map(String::as_str), Some("true"));
        assert_eq!(props.get("app.port").map(String::as_str), Some("8080"));
        assert_eq!(props.get("app.ratio").map(String::as_str), Some("1.5"));
        assert_eq!(props.get("app.nothing").map(String::as_str), Some(""));
        assert_eq!(
            props.get("server.tls.enabled").map(String::as_str),
            Some("false")
        );
        assert!(!props.contains_key("app"));
    }

    #[test]
    fn test_flatten_yaml_sequences() {
        let props = flatten_yaml(
            r#"
app:
  position:
    - home
    - office
"#,
        )
        .unwrap();

        assert_eq!(
            props.get("app.position").map(String::as_str),
            Some("home,office")
        );
        assert_eq!(props.get("app.position[0]").map(String::as_str), Some("home"));
        assert_eq!(
            props.get("app.position[1]").map(String::as_str),
            Some("office")
        );
    }

    #[test]
    fn test_flatten_yaml_sequence_of_mappings() {
        let props = flatten_yaml("servers:\n  - host: a\n    port: 1\n").unwrap();
        assert_eq!(
            props.get("servers[0].host").map(String::as_str),
            Some("a")
        );
        assert_eq!(
            props.get("servers").map(String::as_str),
            Some(r#"{"host":"a","port":1}"#)
        );
    }

    #[test]
    fn test_flatten_yaml_empty_document() {
        assert!(flatten_yaml("").unwrap().is_empty());
    }

    #[test]
    fn test_flatten_yaml_rejects_scalar_root() {
        let err = flatten_yaml("just a string").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert!(err.to_string().contains("found string"));
    }

    #[test]
    fn test_flatten_yaml_invalid() {
        let err = flatten_yaml("a: [unclosed").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert!(err.to_string().contains("Invalid YAML"));
    }

    #[test]
    fn test_source_format_from_path() {
        assert_eq!(
            SourceFormat::from_path(Path::new("application.yaml")),
            SourceFormat::Yaml
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("app.YML")),
            SourceFormat::Yaml
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("config.properties")),
            SourceFormat::Properties
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("noext")),
            SourceFormat::Properties
        );
    }

    #[test]
    fn test_load_files() {
        let temp_dir = std::env::temp_dir().join("propconf_test_loader");
        std::fs::create_dir_all(&temp_dir).unwrap();

        let props_path = temp_dir.join("config.properties");
        let yaml_path = temp_dir.join("application.yaml");
        std::fs::write(&props_path, "name=henryhe\n").unwrap();
        std::fs::write(&yaml_path, "app:\n  version: 1.0.0\n").unwrap();

        let props = load_file(&props_path).unwrap();
        assert_eq!(props.get("name").map(String::as_str), Some("henryhe"));
        let props = load_properties_file(&props_path).unwrap();
        assert_eq!(props.len(), 1);

        let yaml = load_file(&yaml_path).unwrap();
        assert_eq!(yaml.get("app.version").map(String::as_str), Some("1.0.0"));
        let yaml = load_yaml_file(&yaml_path).unwrap();
        assert_eq!(yaml.len(), 1);

        std::fs::remove_dir_all(&temp_dir).ok();
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_file("/nonexistent/propconf/missing.properties").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
        assert_eq!(err.source_name.as_deref(), Some("missing.properties"));
    }
}
