#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use tempfile::TempDir;

pub const CONFIG: &str = r#"
version = 1

[locale]
source = "en"
targets = ["fr", "es"]

[buckets.json]
include = ["locales/[locale].json"]
locked_keys = ["brand/*"]
"#;

pub const SOURCE: &str = r#"{
  "greeting": "Hello {name}",
  "farewell": "Goodbye",
  "brand": { "name": "Acme" }
}"#;

/// Temp project with a config and an English source file.
pub fn project() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "locsync.toml", CONFIG);
    write(dir.path(), "locales/en.json", SOURCE);
    dir
}

pub fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dirs");
    }
    fs::write(path, body).expect("write fixture");
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let text = fs::read_to_string(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()));
    serde_json::from_str(&text).expect("valid json")
}

/// The binary, isolated from the caller's environment and user-level config.
pub fn locsync(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("locsync").expect("binary built");
    cmd.current_dir(root)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .env("XDG_CONFIG_HOME", root.join(".config"))
        .arg("--root")
        .arg(root);
    cmd
}

/// Strip ANSI escapes, for assertions against human output.
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for n in chars.by_ref() {
                if n.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}
