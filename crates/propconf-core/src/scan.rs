//! Resource scanning
//!
//! Walks a directory tree and hands every regular file to a caller-supplied
//! mapper, collecting whatever the mapper keeps. Typically used to discover
//! property files before feeding them to [`PropertyStore::builder`].
//!
//! [`PropertyStore::builder`]: crate::PropertyStore::builder

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// A file found below a scan root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Full path to the file
    pub path: PathBuf,
    /// Path relative to the scan root, `/`-separated
    pub name: String,
}

impl Resource {
    /// File extension, if any
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }
}

/// Walk every regular file below `root`, depth-first with entries sorted by
/// name, and collect the mapper's `Some` results.
///
/// Symbolic links are not followed, so link cycles cannot repeat a subtree.
pub fn scan<R, F>(root: impl AsRef<Path>, mut mapper: F) -> Result<Vec<R>>
where
    F: FnMut(&Resource) -> Option<R>,
{
    let root = root.as_ref();
    let mut results = Vec::new();

    let walk_dir = WalkDir::new(root).follow_links(false).sort_by_file_name();
    for entry in walk_dir.into_iter() {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let resource = Resource {
            name: relative_name(root, entry.path()),
            path: entry.into_path(),
        };
        log::trace!("Scanned resource '{}'", resource.name);
        if let Some(r) = mapper(&resource) {
            results.push(r);
        }
    }

    Ok(results)
}

/// Like [`scan`], but only visits files whose root-relative name matches a
/// glob pattern such as `config/**/*.properties`.
pub fn scan_glob<R, F>(root: impl AsRef<Path>, pattern: &str, mut mapper: F) -> Result<Vec<R>>
where
    F: FnMut(&Resource) -> Option<R>,
{
    let glob_pattern = glob::Pattern::new(pattern).map_err(|e| {
        Error::parse(format!("Invalid glob pattern '{}': {}", pattern, e))
            .with_help("Use glob syntax relative to the scan root, e.g. **/*.yaml")
    })?;
    let options = glob::MatchOptions {
        require_literal_separator: true,
        ..Default::default()
    };

    scan(root, |resource| {
        if glob_pattern.matches_with(&resource.name, options) {
            mapper(resource)
        } else {
            None
        }
    })
}

fn walk_error(root: &Path, e: walkdir::Error) -> Error {
    let location = e.path().unwrap_or(root).display().to_string();
    Error::io(format!("Failed to scan directory: {}", e)).with_source_name(location)
}

fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
