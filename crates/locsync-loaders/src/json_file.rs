use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use locsync_core::{resolve_overridden_locale, KeyMap};
use locsync_patterns::{expand, BucketPathEntry};

use crate::{join_key, read_file, split_key, write_file, BucketLoader, LoadError};

/// JSON bucket: nested objects flatten to `a/b/c` keys; only string leaves are
/// translatable, every other value is carried through untouched on push.
#[derive(Debug, Clone)]
pub struct JsonLoader {
    root: PathBuf,
    entry: BucketPathEntry,
    default_locale: Option<String>,
}

impl JsonLoader {
    pub fn new(root: &Path, entry: BucketPathEntry) -> Self {
        Self {
            root: root.to_path_buf(),
            entry,
            default_locale: None,
        }
    }

    fn read_doc(&self, locale: &str) -> Result<Value, LoadError> {
        let path = self.path_for(locale);
        let text = read_file(&path)?;
        if text.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        let value: Value = serde_json::from_str(&text).map_err(|e| LoadError::Malformed {
            path: path.clone(),
            format: "json",
            reason: e.to_string(),
        })?;
        if !value.is_object() {
            return Err(LoadError::Malformed {
                path,
                format: "json",
                reason: "top-level value is not an object".to_string(),
            });
        }
        Ok(value)
    }

    /// Existing target document, else the default locale's, else an empty object.
    /// A target that cannot be parsed is replaced rather than preserved.
    fn base_doc(&self, locale: &str) -> Result<Value, LoadError> {
        match self.read_doc(locale) {
            Ok(doc) => return Ok(doc),
            Err(LoadError::NotFound(_)) => {}
            Err(LoadError::Malformed { path, reason, .. }) => {
                tracing::warn!(event = "malformed_target_replaced", path = %path.display(), reason = %reason);
            }
            Err(e) => return Err(e),
        }
        if let Some(default) = self.default_locale.as_deref() {
            if default != locale {
                match self.read_doc(default) {
                    Ok(doc) => return Ok(doc),
                    Err(e) if !e.is_not_found() => return Err(e),
                    Err(_) => {}
                }
            }
        }
        Ok(Value::Object(Map::new()))
    }
}

impl BucketLoader for JsonLoader {
    fn bucket_type(&self) -> &'static str {
        "json"
    }

    fn set_default_locale(&mut self, locale: &str) {
        self.default_locale = Some(locale.to_string());
    }

    fn init(&mut self) -> Result<(), LoadError> {
        if let Some(locale) = self.default_locale.clone() {
            self.read_doc(&locale)?;
        }
        Ok(())
    }

    fn path_for(&self, locale: &str) -> PathBuf {
        let locale = resolve_overridden_locale(locale, self.entry.delimiter);
        self.root.join(expand(&self.entry.path_pattern, &locale))
    }

    fn pull(&self, locale: &str) -> Result<KeyMap, LoadError> {
        let doc = self.read_doc(locale)?;
        let mut out = KeyMap::new();
        flatten("", &doc, &mut out);
        Ok(out)
    }

    fn push(&self, locale: &str, data: &KeyMap) -> Result<(), LoadError> {
        let mut doc = self.base_doc(locale)?;
        strip_strings(&mut doc);
        for (key, value) in data {
            insert(&mut doc, key, value.clone());
        }
        let path = self.path_for(locale);
        let mut text = serde_json::to_string_pretty(&doc).map_err(|e| LoadError::Malformed {
            path: path.clone(),
            format: "json",
            reason: e.to_string(),
        })?;
        text.push('\n');
        write_file(&path, &text)
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut KeyMap) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten(&join_key(prefix, k), v, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        _ => {}
    }
}

fn strip_strings(value: &mut Value) {
    if let Value::Object(map) = value {
        map.retain(|_, v| !v.is_string());
        for v in map.values_mut() {
            strip_strings(v);
        }
        map.retain(|_, v| !matches!(v, Value::Object(m) if m.is_empty()));
    }
}

fn insert(doc: &mut Value, key: &str, value: String) {
    let mut current = doc;
    let mut parts = split_key(key).into_iter().peekable();
    while let Some(part) = parts.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        if parts.peek().is_none() {
            map.insert(part, Value::String(value));
            return;
        }
        current = map
            .entry(part)
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn loader(root: &Path) -> JsonLoader {
        let mut l = JsonLoader::new(
            root,
            BucketPathEntry {
                path_pattern: "locales/[locale].json".to_string(),
                delimiter: None,
            },
        );
        l.set_default_locale("en");
        l
    }

    #[test]
    fn pull_flattens_nested_strings() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("locales"))?;
        fs::write(
            dir.path().join("locales/en.json"),
            r#"{"home":{"title":"Home","count":3},"ok":"OK","flags":[1,2]}"#,
        )?;
        let mut l = loader(dir.path());
        l.init()?;
        let data = l.pull("en")?;
        assert_eq!(data.len(), 2);
        assert_eq!(data["home/title"], "Home");
        assert_eq!(data["ok"], "OK");
        Ok(())
    }

    #[test]
    fn missing_and_malformed_are_distinguished() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("locales"))?;
        fs::write(dir.path().join("locales/fr.json"), "{ not json")?;
        let l = loader(dir.path());
        assert!(matches!(l.pull("es"), Err(LoadError::NotFound(_))));
        assert!(matches!(l.pull("fr"), Err(LoadError::Malformed { .. })));
        Ok(())
    }

    #[test]
    fn push_uses_source_structure_for_new_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("locales"))?;
        fs::write(
            dir.path().join("locales/en.json"),
            r#"{"home":{"title":"Home","count":3},"ok":"OK"}"#,
        )?;
        let l = loader(dir.path());
        let mut data = KeyMap::new();
        data.insert("home/title".into(), "Accueil".into());
        l.push("fr", &data)?;

        let written: Value = serde_json::from_str(&fs::read_to_string(dir.path().join("locales/fr.json"))?)?;
        assert_eq!(written["home"]["title"], "Accueil");
        assert_eq!(written["home"]["count"], 3);
        assert!(written.get("ok").is_none());
        assert_eq!(l.pull("fr")?, data);
        Ok(())
    }

    #[test]
    fn keys_containing_the_separator_keep_their_shape() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("locales"))?;
        fs::write(
            dir.path().join("locales/en.json"),
            r#"{"/about":"About","errors/404":"Not found","nav":{"a/b":"AB"}}"#,
        )?;
        let l = loader(dir.path());
        let source = l.pull("en")?;
        assert_eq!(source.len(), 3);

        let fr: KeyMap = source.iter().map(|(k, v)| (k.clone(), format!("{v} fr"))).collect();
        l.push("fr", &fr)?;
        let written: Value = serde_json::from_str(&fs::read_to_string(dir.path().join("locales/fr.json"))?)?;
        assert_eq!(written["/about"], "About fr");
        assert_eq!(written["errors/404"], "Not found fr");
        assert_eq!(written["nav"]["a/b"], "AB fr");
        assert!(written.get("").is_none());
        assert!(written.get("errors").is_none());
        assert_eq!(l.pull("fr")?, fr);
        Ok(())
    }

    #[test]
    fn push_replaces_a_malformed_target() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("locales"))?;
        fs::write(dir.path().join("locales/en.json"), r#"{"a":"A","n":1}"#)?;
        fs::write(dir.path().join("locales/fr.json"), "{ not json")?;
        let l = loader(dir.path());
        let mut data = KeyMap::new();
        data.insert("a".into(), "A fr".into());
        l.push("fr", &data)?;

        let written: Value = serde_json::from_str(&fs::read_to_string(dir.path().join("locales/fr.json"))?)?;
        assert_eq!(written["a"], "A fr");
        assert_eq!(written["n"], 1);
        Ok(())
    }
}
