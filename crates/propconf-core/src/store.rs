//! Immutable property tables
//!
//! A [`PropertyStore`] is a flat key→string snapshot built once from the
//! process environment overlaid with explicit sources. Explicit values always
//! win over environment values for the same key.

use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::loader::{self, PropertyMap, SourceFormat};

/// Source name recorded for values taken from the environment
pub const ENV_SOURCE: &str = "env";

/// Immutable flat mapping from key to raw string value
#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    properties: HashMap<String, String>,
    /// Name of the source that supplied each key's winning value
    sources: HashMap<String, String>,
}

impl PropertyStore {
    /// Build a store from environment pairs overlaid with explicit pairs
    pub fn new<E, P, EK, EV, PK, PV>(env: E, explicit: P) -> Self
    where
        E: IntoIterator<Item = (EK, EV)>,
        P: IntoIterator<Item = (PK, PV)>,
        EK: Into<String>,
        EV: Into<String>,
        PK: Into<String>,
        PV: Into<String>,
    {
        Self::builder()
            .with_vars(env)
            .with_map("explicit", explicit)
            .build()
    }

    /// Capture the process environment only
    pub fn from_env() -> Self {
        Self::builder().with_env().build()
    }

    /// Start building a layered store
    pub fn builder() -> PropertyStoreBuilder {
        PropertyStoreBuilder::default()
    }

    /// Raw value for a literal key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Check if the literal key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Name of the source the key's value came from
    pub fn source_of(&self, key: &str) -> Option<&str> {
        self.sources.get(key).map(String::as_str)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// True if the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.properties.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Iterate over all key/value pairs in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A named layer of properties
#[derive(Debug, Clone)]
struct Layer {
    name: String,
    properties: PropertyMap,
}

/// Builder for a [`PropertyStore`].
///
/// Environment layers are applied first and explicit layers after them, each
/// group in call order, so explicit sources win regardless of the order the
/// builder methods were called in.
#[derive(Debug, Default)]
pub struct PropertyStoreBuilder {
    env_layers: Vec<Layer>,
    explicit_layers: Vec<Layer>,
    error: Option<crate::error::Error>,
}

impl PropertyStoreBuilder {
    /// Add the process environment. Variables whose name or value is not
    /// valid UTF-8 are skipped.
    pub fn with_env(self) -> Self {
        self.with_vars(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// Add environment pairs from an explicit iterator
    pub fn with_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_layers.push(Layer {
            name: ENV_SOURCE.to_string(),
            properties: collect(vars),
        });
        self
    }

    /// Add an explicit named source
    pub fn with_map<I, K, V>(mut self, name: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.explicit_layers.push(Layer {
            name: name.into(),
            properties: collect(properties),
        });
        self
    }

    /// Add properties-file text as an explicit source
    pub fn with_properties_str(self, name: impl Into<String>, text: &str) -> Self {
        let name = name.into();
        let parsed = loader::parse_properties(text).map_err(|e| e.with_source_name(&name));
        self.with_parsed(name, parsed)
    }

    /// Add YAML text as an explicit source
    pub fn with_yaml_str(self, name: impl Into<String>, text: &str) -> Self {
        let name = name.into();
        let parsed = loader::flatten_yaml(text).map_err(|e| e.with_source_name(&name));
        self.with_parsed(name, parsed)
    }

    /// Add a properties file as an explicit source
    pub fn with_properties_file(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.with_parsed(
            loader::display_name(path),
            loader::load_properties_file(path),
        )
    }

    /// Add a YAML file as an explicit source
    pub fn with_yaml_file(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.with_parsed(loader::display_name(path), loader::load_yaml_file(path))
    }

    /// Add a file as an explicit source, picking the format from its extension
    pub fn with_file(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let parsed = match SourceFormat::from_path(path) {
            SourceFormat::Yaml => loader::load_yaml_file(path),
            SourceFormat::Properties => loader::load_properties_file(path),
        };
        self.with_parsed(loader::display_name(path), parsed)
    }

    fn with_parsed(mut self, name: String, parsed: Result<PropertyMap>) -> Self {
        match parsed {
            Ok(properties) => self.explicit_layers.push(Layer { name, properties }),
            Err(e) => {
                // first failure wins
                if self.error.is_none() {
                    self.error = Some(e);
                }
            }
        }
        self
    }

    /// Build the store, failing if any file-backed layer could not be loaded
    pub fn try_build(mut self) -> Result<PropertyStore> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        Ok(self.build())
    }

    /// Build the store. Layers that failed to load are skipped; use
    /// [`try_build`](Self::try_build) to surface those failures.
    pub fn build(self) -> PropertyStore {
        if let Some(e) = &self.error {
            log::warn!("Skipping property source that failed to load: {}", e);
        }

        let mut store = PropertyStore::default();
        for layer in self.env_layers.into_iter().chain(self.explicit_layers) {
            log::debug!(
                "Applying property source '{}' ({} keys)",
                layer.name,
                layer.properties.len()
            );
            for (key, value) in layer.properties {
                store.sources.insert(key.clone(), layer.name.clone());
                store.properties.insert(key, value);
            }
        }
        store
    }
}

fn collect<I, K, V>(pairs: I) -> PropertyMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
