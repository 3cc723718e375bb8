use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Workspace-wide result alias.
pub type Result<T> = color_eyre::eyre::Result<T>;

/// The reserved token in path templates that stands for a locale code.
pub const LOCALE_PLACEHOLDER: &str = "[locale]";

/// Flattened translatable content of one file: key -> source or translated value.
pub type KeyMap = BTreeMap<String, String>;

/// Key -> checksum of the source value at the last successful sync.
pub type ChecksumMap = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum LocSyncError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    Other(String),
}

/// Separator used when a locale code is composed into a path component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocaleDelimiter {
    #[serde(rename = "-")]
    Dash,
    #[serde(rename = "_")]
    Underscore,
}

impl LocaleDelimiter {
    pub fn as_char(self) -> char {
        match self {
            LocaleDelimiter::Dash => '-',
            LocaleDelimiter::Underscore => '_',
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "-" => Some(LocaleDelimiter::Dash),
            "_" => Some(LocaleDelimiter::Underscore),
            _ => None,
        }
    }
}

impl std::fmt::Display for LocaleDelimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Rewrite the first region separator of `locale` with `delimiter`.
/// `pt-BR` with `_` becomes `pt_BR`; codes without a region are returned as-is.
pub fn resolve_overridden_locale(locale: &str, delimiter: Option<LocaleDelimiter>) -> String {
    let Some(delimiter) = delimiter else {
        return locale.to_string();
    };
    match locale.find(['-', '_']) {
        Some(idx) => {
            let mut out = String::with_capacity(locale.len());
            out.push_str(&locale[..idx]);
            out.push(delimiter.as_char());
            out.push_str(&locale[idx + 1..]);
            out
        }
        None => locale.to_string(),
    }
}

/// Deterministic content hash (sha256, lowercase hex).
pub fn checksum(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Write `bytes` to `path` through a sibling temp file and rename, so readers
/// never observe a half-written file. Parent directories are created.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
