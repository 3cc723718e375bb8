//! Bucket loaders: read and write one physical localization file per locale
//! as a flat key/value map.

use std::path::{Path, PathBuf};

use thiserror::Error;

use locsync_core::KeyMap;
use locsync_patterns::BucketPathEntry;

mod json_file;
mod toml_file;

pub use json_file::JsonLoader;
pub use toml_file::TomlLoader;

/// Separator used when nested tables are flattened into keys.
pub const KEY_SEPARATOR: char = '/';

/// Escapes a literal separator (or itself) inside one key segment.
pub const KEY_ESCAPE: char = '\\';

pub const SUPPORTED_BUCKET_TYPES: &[&str] = &["json", "toml"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),
    #[error("malformed {format} in {path}: {reason}")]
    Malformed {
        path: PathBuf,
        format: &'static str,
        reason: String,
    },
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported bucket type `{0}`")]
    Unsupported(String),
}

impl LoadError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::NotFound(_))
    }

    pub(crate) fn from_io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound(path.to_path_buf())
        } else {
            LoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Reader/writer for one bucket file across locales.
///
/// `pull` on a locale whose file does not exist yields [`LoadError::NotFound`],
/// distinct from [`LoadError::Malformed`] for a file that exists but cannot be parsed.
pub trait BucketLoader: Send + Sync {
    fn bucket_type(&self) -> &'static str;

    /// Locale whose file supplies document structure for new target files.
    fn set_default_locale(&mut self, locale: &str);

    /// Checks that the default locale's file can be read.
    fn init(&mut self) -> Result<(), LoadError>;

    fn path_for(&self, locale: &str) -> PathBuf;

    fn pull(&self, locale: &str) -> Result<KeyMap, LoadError>;

    /// Replace the file's translatable content with `data`, written atomically.
    fn push(&self, locale: &str, data: &KeyMap) -> Result<(), LoadError>;
}

pub fn is_supported(bucket_type: &str) -> bool {
    SUPPORTED_BUCKET_TYPES.contains(&bucket_type)
}

pub fn create_loader(
    bucket_type: &str,
    root: &Path,
    entry: &BucketPathEntry,
) -> Result<Box<dyn BucketLoader>, LoadError> {
    match bucket_type {
        "json" => Ok(Box::new(JsonLoader::new(root, entry.clone()))),
        "toml" => Ok(Box::new(TomlLoader::new(root, entry.clone()))),
        other => Err(LoadError::Unsupported(other.to_string())),
    }
}

pub(crate) fn read_file(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|e| LoadError::from_io(path, e))
}

pub(crate) fn write_file(path: &Path, content: &str) -> Result<(), LoadError> {
    locsync_core::write_atomic(path, content.as_bytes()).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(event = "bucket_file_written", path = %path.display(), bytes = content.len());
    Ok(())
}

/// Append one document key to a flattened prefix. Separators and escapes
/// inside `segment` are escaped so [`split_key`] recovers it unchanged.
pub(crate) fn join_key(prefix: &str, segment: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + segment.len() + 1);
    if !prefix.is_empty() {
        out.push_str(prefix);
        out.push(KEY_SEPARATOR);
    }
    for c in segment.chars() {
        if c == KEY_SEPARATOR || c == KEY_ESCAPE {
            out.push(KEY_ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Document keys along the path of a flattened key.
pub(crate) fn split_key(key: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = key.chars();
    while let Some(c) = chars.next() {
        if c == KEY_ESCAPE {
            current.push(chars.next().unwrap_or(KEY_ESCAPE));
        } else if c == KEY_SEPARATOR {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_knows_supported_types() {
        let entry = BucketPathEntry {
            path_pattern: "locales/[locale].json".to_string(),
            delimiter: None,
        };
        for ty in SUPPORTED_BUCKET_TYPES {
            let loader = create_loader(ty, Path::new("."), &entry).expect("loader");
            assert_eq!(loader.bucket_type(), *ty);
        }
        assert!(matches!(
            create_loader("yaml", Path::new("."), &entry),
            Err(LoadError::Unsupported(t)) if t == "yaml"
        ));
        assert!(!is_supported("android"));
    }

    #[test]
    fn literal_separators_survive_flattening() {
        let key = join_key(&join_key("", "errors/404"), "a\\b");
        assert_eq!(key, "errors\\/404/a\\\\b");
        assert_eq!(split_key(&key), vec!["errors/404", "a\\b"]);
        assert_eq!(split_key("home/title"), vec!["home", "title"]);
        assert_eq!(split_key("/about"), vec!["", "about"]);
        assert_eq!(split_key(&join_key("", "/about")), vec!["/about"]);
    }
}
