use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use locsync_core::{checksum, write_atomic, ChecksumMap, KeyMap};

pub const LOCKFILE_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum LockfileError {
    #[error("failed to read lockfile {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse lockfile {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unsupported lockfile version {0}")]
    UnsupportedVersion(u32),
    #[error("failed to serialize lockfile: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write lockfile {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Checksums of source values as of the last successful sync, per bucket file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    pub version: u32,
    #[serde(default)]
    pub checksums: BTreeMap<String, ChecksumMap>,
}

impl Default for Lockfile {
    fn default() -> Self {
        Self {
            version: LOCKFILE_VERSION,
            checksums: BTreeMap::new(),
        }
    }
}

impl Lockfile {
    /// A missing lockfile is an empty one.
    pub fn load(path: &Path) -> Result<Self, LockfileError> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(LockfileError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        let lock: Lockfile = toml::from_str(&text).map_err(|e| LockfileError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        if lock.version != LOCKFILE_VERSION {
            return Err(LockfileError::UnsupportedVersion(lock.version));
        }
        Ok(lock)
    }

    pub fn save(&self, path: &Path) -> Result<(), LockfileError> {
        let text = toml::to_string_pretty(self)?;
        write_atomic(path, text.as_bytes()).map_err(|e| LockfileError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn entry(&self, file: &str) -> Option<&ChecksumMap> {
        self.checksums.get(file)
    }

    /// Replace the entry for `file` with checksums of `source`. Returns whether it changed.
    pub fn record(&mut self, file: &str, source: &KeyMap) -> bool {
        let sums: ChecksumMap = source
            .iter()
            .map(|(k, v)| (k.clone(), checksum(v)))
            .collect();
        if self.checksums.get(file) == Some(&sums) {
            return false;
        }
        self.checksums.insert(file.to_string(), sums);
        true
    }
}
