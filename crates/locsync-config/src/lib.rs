use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use locsync_core::LocaleDelimiter;
use locsync_patterns::PathSpec;

pub const CONFIG_FILE: &str = "locsync.toml";
pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_DEBOUNCE_MS: u64 = 5000;
pub const DEFAULT_LOCKFILE: &str = "locsync.lock";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LocSyncConfig {
    pub version: Option<u32>,
    pub locale: Option<LocaleCfg>,
    #[serde(default)]
    pub buckets: BTreeMap<String, BucketCfg>,
    pub run: Option<RunCfg>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LocaleCfg {
    pub source: Option<String>,
    pub targets: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BucketCfg {
    #[serde(default)]
    pub include: Vec<PathEntry>,
    #[serde(default)]
    pub exclude: Vec<PathEntry>,
    #[serde(default)]
    pub locked_keys: Vec<String>,
    #[serde(default)]
    pub ignored_keys: Vec<String>,
    #[serde(default)]
    pub inject_locale: Vec<String>,
}

/// Include/exclude item: a bare template or a table with a delimiter override.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PathEntry {
    Plain(String),
    Detailed {
        path: String,
        #[serde(default)]
        delimiter: Option<LocaleDelimiter>,
    },
}

impl PathEntry {
    pub fn to_spec(&self) -> PathSpec {
        match self {
            PathEntry::Plain(path) => PathSpec::new(path.clone()),
            PathEntry::Detailed { path, delimiter } => PathSpec {
                path: path.clone(),
                delimiter: *delimiter,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunCfg {
    pub concurrency: Option<usize>,
    pub debounce_ms: Option<u64>,
    pub max_wait_ms: Option<u64>,
    pub lockfile: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unsupported config version {0} (expected {CONFIG_VERSION})")]
    UnsupportedVersion(u32),
    #[error("no buckets defined")]
    NoBuckets,
    #[error("unsupported bucket type `{0}`")]
    UnsupportedBucket(String),
    #[error("bucket `{0}` has no include patterns")]
    EmptyInclude(String),
    #[error("source locale is not set")]
    MissingSourceLocale,
    #[error("no target locales configured")]
    NoTargets,
    #[error("invalid locale code `{0}`")]
    InvalidLocale(String),
}

/// Validated project configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub source_locale: String,
    pub target_locales: Vec<String>,
    pub buckets: Vec<BucketConfig>,
    pub run: RunSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketConfig {
    pub bucket_type: String,
    pub include: Vec<PathSpec>,
    pub exclude: Vec<PathSpec>,
    pub locked_keys: Vec<String>,
    pub ignored_keys: Vec<String>,
    pub inject_locale: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// `None` leaves the executor default in place.
    pub concurrency: Option<usize>,
    pub debounce_ms: u64,
    pub max_wait_ms: Option<u64>,
    pub lockfile: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            concurrency: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            max_wait_ms: None,
            lockfile: DEFAULT_LOCKFILE.to_string(),
        }
    }
}

impl RunSettings {
    /// Command-line values win over anything loaded from files.
    pub fn with_overrides(
        mut self,
        concurrency: Option<usize>,
        debounce_ms: Option<u64>,
        max_wait_ms: Option<u64>,
    ) -> Self {
        if concurrency.is_some() {
            self.concurrency = concurrency;
        }
        if let Some(d) = debounce_ms {
            self.debounce_ms = d;
        }
        if max_wait_ms.is_some() {
            self.max_wait_ms = max_wait_ms;
        }
        self
    }
}

pub fn is_valid_locale(code: &str) -> bool {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z]{2,3}([-_][A-Za-z0-9]{2,8})*$").expect("valid locale regex")
    });
    re.is_match(code)
}

/// Project config at `explicit` (or `<root>/locsync.toml`), merged over the
/// user-level defaults in `<config_dir>/locsync/locsync.toml`.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> Result<LocSyncConfig, ConfigError> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.join(CONFIG_FILE));
    let project = read_config(&path)?;
    let user = match dirs::config_dir() {
        Some(base) => read_user_defaults(&base.join("locsync").join(CONFIG_FILE)),
        None => None,
    };
    Ok(match user {
        Some(user) => merge(project, user),
        None => project,
    })
}

pub fn read_config(path: &Path) -> Result<LocSyncConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;
    toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn read_user_defaults(path: &Path) -> Option<LocSyncConfig> {
    let text = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&text) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            tracing::warn!(event = "user_config_ignored", path = %path.display(), error = %e);
            None
        }
    }
}

/// Fill gaps in `a` from `b`. Buckets are project-only and never inherited.
pub fn merge(mut a: LocSyncConfig, b: LocSyncConfig) -> LocSyncConfig {
    if a.version.is_none() {
        a.version = b.version;
    }
    a.locale = merge_opt(a.locale, b.locale, merge_locale);
    a.run = merge_opt(a.run, b.run, merge_run);
    a
}

fn merge_opt<T: Default>(a: Option<T>, b: Option<T>, f: fn(T, T) -> T) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (None, Some(b)) => Some(b),
        (Some(a), None) => Some(a),
        (None, None) => None,
    }
}

fn merge_locale(mut a: LocaleCfg, b: LocaleCfg) -> LocaleCfg {
    if a.source.is_none() {
        a.source = b.source;
    }
    if a.targets.is_none() {
        a.targets = b.targets;
    }
    a
}

fn merge_run(mut a: RunCfg, b: RunCfg) -> RunCfg {
    if a.concurrency.is_none() {
        a.concurrency = b.concurrency;
    }
    if a.debounce_ms.is_none() {
        a.debounce_ms = b.debounce_ms;
    }
    if a.max_wait_ms.is_none() {
        a.max_wait_ms = b.max_wait_ms;
    }
    if a.lockfile.is_none() {
        a.lockfile = b.lockfile;
    }
    a
}

impl LocSyncConfig {
    /// Check the loaded config and turn it into a [`SyncConfig`].
    /// `supported_buckets` comes from the loader registry.
    pub fn validate(self, supported_buckets: &[&str]) -> Result<SyncConfig, ConfigError> {
        if let Some(v) = self.version {
            if v != CONFIG_VERSION {
                return Err(ConfigError::UnsupportedVersion(v));
            }
        }
        let locale = self.locale.unwrap_or_default();
        let source_locale = locale.source.ok_or(ConfigError::MissingSourceLocale)?;
        if !is_valid_locale(&source_locale) {
            return Err(ConfigError::InvalidLocale(source_locale));
        }
        let mut target_locales = Vec::new();
        for target in locale.targets.unwrap_or_default() {
            if !is_valid_locale(&target) {
                return Err(ConfigError::InvalidLocale(target));
            }
            if target == source_locale {
                tracing::warn!(event = "source_in_targets", locale = %target, "source locale listed as a target; dropping it");
                continue;
            }
            if !target_locales.contains(&target) {
                target_locales.push(target);
            }
        }
        if target_locales.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        if self.buckets.is_empty() {
            return Err(ConfigError::NoBuckets);
        }
        let mut buckets = Vec::with_capacity(self.buckets.len());
        for (bucket_type, cfg) in self.buckets {
            if !supported_buckets.contains(&bucket_type.as_str()) {
                return Err(ConfigError::UnsupportedBucket(bucket_type));
            }
            if cfg.include.is_empty() {
                return Err(ConfigError::EmptyInclude(bucket_type));
            }
            buckets.push(BucketConfig {
                bucket_type,
                include: cfg.include.iter().map(PathEntry::to_spec).collect(),
                exclude: cfg.exclude.iter().map(PathEntry::to_spec).collect(),
                locked_keys: cfg.locked_keys,
                ignored_keys: cfg.ignored_keys,
                inject_locale: cfg.inject_locale,
            });
        }

        let run = self.run.unwrap_or_default();
        let defaults = RunSettings::default();
        Ok(SyncConfig {
            source_locale,
            target_locales,
            buckets,
            run: RunSettings {
                concurrency: run.concurrency,
                debounce_ms: run.debounce_ms.unwrap_or(defaults.debounce_ms),
                max_wait_ms: run.max_wait_ms,
                lockfile: run.lockfile.unwrap_or(defaults.lockfile),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[locale]
source = "en"
targets = ["fr", "es", "pt-BR", "en"]

[buckets.json]
include = ["locales/[locale].json", { path = "src/**/[locale]/strings/*.json", delimiter = "_" }]
exclude = ["locales/legacy/[locale].json"]
locked_keys = ["brand/*"]
ignored_keys = ["internal/*"]
inject_locale = ["meta/locale"]

[run]
concurrency = 4
debounce_ms = 300
"#;

    #[test]
    fn parses_and_validates_sample() -> Result<(), Box<dyn std::error::Error>> {
        let cfg: LocSyncConfig = toml::from_str(SAMPLE)?;
        let sync = cfg.validate(&["json", "toml"])?;
        assert_eq!(sync.source_locale, "en");
        assert_eq!(sync.target_locales, vec!["fr", "es", "pt-BR"]);
        let bucket = &sync.buckets[0];
        assert_eq!(bucket.bucket_type, "json");
        assert_eq!(bucket.include.len(), 2);
        assert_eq!(bucket.include[1].delimiter, Some(LocaleDelimiter::Underscore));
        assert_eq!(bucket.exclude[0].path, "locales/legacy/[locale].json");
        assert_eq!(sync.run.concurrency, Some(4));
        assert_eq!(sync.run.debounce_ms, 300);
        assert_eq!(sync.run.lockfile, DEFAULT_LOCKFILE);
        Ok(())
    }

    #[test]
    fn validation_rejects_bad_configs() -> Result<(), Box<dyn std::error::Error>> {
        let no_buckets: LocSyncConfig = toml::from_str("[locale]\nsource = \"en\"\ntargets = [\"fr\"]\n")?;
        assert!(matches!(no_buckets.validate(&["json"]), Err(ConfigError::NoBuckets)));

        let unsupported: LocSyncConfig = toml::from_str(
            "[locale]\nsource = \"en\"\ntargets = [\"fr\"]\n[buckets.android]\ninclude = [\"res/[locale].xml\"]\n",
        )?;
        assert!(matches!(
            unsupported.validate(&["json"]),
            Err(ConfigError::UnsupportedBucket(t)) if t == "android"
        ));

        let bad_locale: LocSyncConfig = toml::from_str(
            "[locale]\nsource = \"en\"\ntargets = [\"f r\"]\n[buckets.json]\ninclude = [\"[locale].json\"]\n",
        )?;
        assert!(matches!(bad_locale.validate(&["json"]), Err(ConfigError::InvalidLocale(_))));

        let empty_include: LocSyncConfig =
            toml::from_str("[locale]\nsource = \"en\"\ntargets = [\"fr\"]\n[buckets.json]\n")?;
        assert!(matches!(empty_include.validate(&["json"]), Err(ConfigError::EmptyInclude(_))));
        Ok(())
    }

    #[test]
    fn project_values_win_over_user_defaults() {
        let project = LocSyncConfig {
            run: Some(RunCfg {
                debounce_ms: Some(100),
                ..Default::default()
            }),
            ..Default::default()
        };
        let user = LocSyncConfig {
            locale: Some(LocaleCfg {
                source: Some("en".into()),
                targets: Some(vec!["de".into()]),
            }),
            run: Some(RunCfg {
                debounce_ms: Some(9000),
                concurrency: Some(3),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(project, user);
        let run = merged.run.expect("run");
        assert_eq!(run.debounce_ms, Some(100));
        assert_eq!(run.concurrency, Some(3));
        assert_eq!(merged.locale.and_then(|l| l.source).as_deref(), Some("en"));

        let settings = RunSettings::default().with_overrides(Some(8), None, Some(2000));
        assert_eq!(settings.concurrency, Some(8));
        assert_eq!(settings.debounce_ms, DEFAULT_DEBOUNCE_MS);
        assert_eq!(settings.max_wait_ms, Some(2000));
    }

    #[test]
    fn missing_project_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_config(&dir.path().join(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn locale_codes() {
        for ok in ["en", "pt-BR", "zh_Hans", "es-419", "sr-Latn-RS"] {
            assert!(is_valid_locale(ok), "{ok}");
        }
        for bad in ["", "e", "english", "en-", "en/US"] {
            assert!(!is_valid_locale(bad), "{bad}");
        }
    }
}
