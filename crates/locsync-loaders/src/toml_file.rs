use std::path::{Path, PathBuf};

use toml::{Table, Value};

use locsync_core::{resolve_overridden_locale, KeyMap};
use locsync_patterns::{expand, BucketPathEntry};

use crate::{join_key, read_file, split_key, write_file, BucketLoader, LoadError};

/// TOML bucket, flattened the same way as JSON: tables nest, string values translate.
#[derive(Debug, Clone)]
pub struct TomlLoader {
    root: PathBuf,
    entry: BucketPathEntry,
    default_locale: Option<String>,
}

impl TomlLoader {
    pub fn new(root: &Path, entry: BucketPathEntry) -> Self {
        Self {
            root: root.to_path_buf(),
            entry,
            default_locale: None,
        }
    }

    fn read_table(&self, locale: &str) -> Result<Table, LoadError> {
        let path = self.path_for(locale);
        let text = read_file(&path)?;
        toml::from_str::<Table>(&text).map_err(|e| LoadError::Malformed {
            path,
            format: "toml",
            reason: e.to_string(),
        })
    }

    fn base_table(&self, locale: &str) -> Result<Table, LoadError> {
        match self.read_table(locale) {
            Ok(t) => return Ok(t),
            Err(LoadError::NotFound(_)) => {}
            Err(LoadError::Malformed { path, reason, .. }) => {
                tracing::warn!(event = "malformed_target_replaced", path = %path.display(), reason = %reason);
            }
            Err(e) => return Err(e),
        }
        match self.default_locale.as_deref() {
            Some(default) if default != locale => match self.read_table(default) {
                Ok(t) => Ok(t),
                Err(e) if e.is_not_found() => Ok(Table::new()),
                Err(e) => Err(e),
            },
            _ => Ok(Table::new()),
        }
    }
}

impl BucketLoader for TomlLoader {
    fn bucket_type(&self) -> &'static str {
        "toml"
    }

    fn set_default_locale(&mut self, locale: &str) {
        self.default_locale = Some(locale.to_string());
    }

    fn init(&mut self) -> Result<(), LoadError> {
        if let Some(locale) = self.default_locale.clone() {
            self.read_table(&locale)?;
        }
        Ok(())
    }

    fn path_for(&self, locale: &str) -> PathBuf {
        let locale = resolve_overridden_locale(locale, self.entry.delimiter);
        self.root.join(expand(&self.entry.path_pattern, &locale))
    }

    fn pull(&self, locale: &str) -> Result<KeyMap, LoadError> {
        let table = self.read_table(locale)?;
        let mut out = KeyMap::new();
        flatten("", &table, &mut out);
        Ok(out)
    }

    fn push(&self, locale: &str, data: &KeyMap) -> Result<(), LoadError> {
        let mut table = self.base_table(locale)?;
        strip_strings(&mut table);
        for (key, value) in data {
            insert(&mut table, key, value.clone());
        }
        let path = self.path_for(locale);
        let text = toml::to_string_pretty(&table).map_err(|e| LoadError::Malformed {
            path: path.clone(),
            format: "toml",
            reason: e.to_string(),
        })?;
        write_file(&path, &text)
    }
}

fn flatten(prefix: &str, table: &Table, out: &mut KeyMap) {
    for (k, v) in table {
        let key = join_key(prefix, k);
        match v {
            Value::Table(t) => flatten(&key, t, out),
            Value::String(s) => {
                out.insert(key, s.clone());
            }
            _ => {}
        }
    }
}

fn strip_strings(table: &mut Table) {
    let strings: Vec<String> = table
        .iter()
        .filter(|(_, v)| v.is_str())
        .map(|(k, _)| k.clone())
        .collect();
    for k in strings {
        table.remove(&k);
    }
    let mut emptied = Vec::new();
    for (k, v) in table.iter_mut() {
        if let Value::Table(t) = v {
            strip_strings(t);
            if t.is_empty() {
                emptied.push(k.clone());
            }
        }
    }
    for k in emptied {
        table.remove(&k);
    }
}

fn insert(table: &mut Table, key: &str, value: String) {
    let mut current = table;
    let mut parts = split_key(key).into_iter().peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            current.insert(part, Value::String(value));
            return;
        }
        let slot = current
            .entry(part)
            .or_insert(Value::Table(Table::new()));
        if !slot.is_table() {
            *slot = Value::Table(Table::new());
        }
        let Value::Table(next) = slot else {
            return;
        };
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn round_trips_nested_tables() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("i18n"))?;
        fs::write(
            dir.path().join("i18n/en.toml"),
            "title = \"Hello\"\nmax = 3\n\n[menu]\nopen = \"Open\"\n",
        )?;
        let mut l = TomlLoader::new(
            dir.path(),
            BucketPathEntry {
                path_pattern: "i18n/[locale].toml".to_string(),
                delimiter: None,
            },
        );
        l.set_default_locale("en");
        l.init()?;
        let source = l.pull("en")?;
        assert_eq!(source.len(), 2);
        assert_eq!(source["menu/open"], "Open");

        let mut fr = KeyMap::new();
        fr.insert("title".into(), "Bonjour".into());
        fr.insert("menu/open".into(), "Ouvrir".into());
        l.push("fr", &fr)?;
        assert_eq!(l.pull("fr")?, fr);
        let raw = fs::read_to_string(dir.path().join("i18n/fr.toml"))?;
        assert!(raw.contains("max = 3"));
        assert!(matches!(l.pull("de"), Err(LoadError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn corrupt_target_is_rebuilt_from_source_structure() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("i18n"))?;
        fs::write(dir.path().join("i18n/en.toml"), "max = 3\n\n[menu]\n\"a/b\" = \"AB\"\n")?;
        fs::write(dir.path().join("i18n/fr.toml"), "this is = = not toml")?;
        let mut l = TomlLoader::new(
            dir.path(),
            BucketPathEntry {
                path_pattern: "i18n/[locale].toml".to_string(),
                delimiter: None,
            },
        );
        l.set_default_locale("en");
        assert!(matches!(l.pull("fr"), Err(LoadError::Malformed { .. })));

        let mut fr = l.pull("en")?;
        assert!(fr.contains_key("menu/a\\/b"));
        fr.insert("menu/a\\/b".into(), "AB fr".into());
        l.push("fr", &fr)?;
        assert_eq!(l.pull("fr")?, fr);
        let raw = fs::read_to_string(dir.path().join("i18n/fr.toml"))?;
        assert!(raw.contains("max = 3"));
        Ok(())
    }
}
