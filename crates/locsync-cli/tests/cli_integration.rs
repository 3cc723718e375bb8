use std::fs;

use assert_cmd::prelude::*;
use predicates::prelude::*;

mod helpers;
use helpers::*;

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    let text = String::from_utf8_lossy(&output.stdout);
    let line = text.lines().last().unwrap_or_default();
    serde_json::from_str(line).unwrap_or_else(|e| panic!("stdout is not json ({e}):\n{text}"))
}

#[test]
fn plan_lists_one_task_per_target_locale() {
    let dir = project();
    let output = locsync(dir.path())
        .args(["plan", "--format", "json"])
        .output()
        .expect("run plan");
    assert!(output.status.success(), "{output:?}");

    let report = stdout_json(&output);
    assert_eq!(report["source_locale"], "en");
    assert_eq!(report["files"], 1);
    assert_eq!(report["tasks"], 2);
    let locales: Vec<&str> = report["locales"]
        .as_array()
        .expect("locales")
        .iter()
        .filter_map(|g| g["locale"].as_str())
        .collect();
    assert_eq!(locales, vec!["fr", "es"]);
    assert_eq!(report["locales"][0]["tasks"][0]["file"], "locales/[locale].json");
    assert_eq!(report["locales"][0]["tasks"][0]["target_missing"], true);

    assert!(!dir.path().join("locales/fr.json").exists());
}

#[test]
fn plan_text_output_groups_by_locale() {
    let dir = project();
    let output = locsync(dir.path()).arg("plan").output().expect("run plan");
    assert!(output.status.success());
    let stdout = strip_ansi(&String::from_utf8_lossy(&output.stdout));
    assert!(stdout.contains("2 task(s) across 1 file(s)"), "{stdout}");
    assert!(stdout.contains("[json] locales/[locale].json"), "{stdout}");
    assert!(stdout.contains("(target missing)"), "{stdout}");
}

#[test]
fn run_writes_targets_and_lockfile_then_settles() {
    let dir = project();
    locsync(dir.path()).arg("run").assert().success();

    let fr = read_json(&dir.path().join("locales/fr.json"));
    let greeting = fr["greeting"].as_str().expect("greeting");
    assert!(greeting.starts_with('['), "{greeting}");
    assert!(greeting.contains("{name}"), "{greeting}");
    assert_eq!(fr["brand"]["name"], "Acme");
    assert!(dir.path().join("locales/es.json").exists());

    let lock = fs::read_to_string(dir.path().join("locsync.lock")).expect("lockfile");
    assert!(lock.contains("version = 1"));
    assert!(lock.contains("locales/[locale].json"));

    locsync(dir.path())
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("everything is up to date"));
}

#[test]
fn run_json_summary_counts_tasks() {
    let dir = project();
    let output = locsync(dir.path())
        .args(["run", "--format", "json"])
        .output()
        .expect("run");
    assert!(output.status.success(), "{output:?}");
    let summary = stdout_json(&output);
    assert_eq!(summary["total"], 2);
    assert_eq!(summary["succeeded"], 2);
    assert_eq!(summary["failed"], 0);
    assert_eq!(summary["lockfile_updated"], 1);
}

#[test]
fn source_edit_only_relocalizes_changed_key() {
    let dir = project();
    locsync(dir.path()).arg("run").assert().success();

    let fr_path = dir.path().join("locales/fr.json");
    let mut fr = read_json(&fr_path);
    fr["farewell"] = serde_json::Value::String("Au revoir".into());
    fs::write(&fr_path, serde_json::to_string_pretty(&fr).expect("json")).expect("write");

    write(
        dir.path(),
        "locales/en.json",
        r#"{ "greeting": "Hi {name}", "farewell": "Goodbye", "brand": { "name": "Acme" } }"#,
    );
    let output = locsync(dir.path())
        .args(["plan", "--format", "json", "--locale", "fr"])
        .output()
        .expect("plan");
    let report = stdout_json(&output);
    assert_eq!(report["locales"][0]["tasks"][0]["keys"], serde_json::json!(["greeting"]));

    locsync(dir.path()).arg("run").assert().success();
    let fr = read_json(&fr_path);
    assert_eq!(fr["farewell"], "Au revoir");
    assert!(fr["greeting"].as_str().expect("greeting").contains("{name}"));
}

#[test]
fn locale_filter_leaves_other_targets_and_lockfile_alone() {
    let dir = project();
    locsync(dir.path())
        .args(["run", "--locale", "fr"])
        .assert()
        .success();
    assert!(dir.path().join("locales/fr.json").exists());
    assert!(!dir.path().join("locales/es.json").exists());
    assert!(!dir.path().join("locsync.lock").exists());
}

#[test]
fn failed_task_exits_non_zero_after_summary() {
    let dir = project();
    // a directory where the target file belongs cannot be read or replaced
    fs::create_dir_all(dir.path().join("locales/fr.json")).expect("create dir");
    let output = locsync(dir.path()).arg("run").output().expect("run");
    assert!(!output.status.success());

    let stdout = strip_ansi(&String::from_utf8_lossy(&output.stdout));
    let stderr = strip_ansi(&String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("fr: 1 task(s), 0 succeeded, 1 failed"), "{stdout}");
    assert!(stdout.contains("es: 1 task(s), 1 succeeded, 0 failed"), "{stdout}");
    assert!(stderr.contains("[fr]"), "{stderr}");
    assert!(stderr.contains("1 of 2 task(s) failed"), "{stderr}");
    assert!(dir.path().join("locales/es.json").is_file());
    assert!(!dir.path().join("locsync.lock").exists());
}

#[test]
fn narrowed_run_says_lockfile_is_untouched() {
    let dir = project();
    locsync(dir.path())
        .args(["run", "--locale", "es"])
        .assert()
        .success()
        .stderr(predicate::str::contains("lockfile left unchanged"));
}

#[test]
fn unknown_locale_filter_warns() {
    let dir = project();
    locsync(dir.path())
        .args(["plan", "--locale", "de"])
        .assert()
        .success()
        .stderr(predicate::str::contains("unknown_locale_filter"))
        .stdout(predicate::str::contains("nothing to do"));
}

#[test]
fn missing_config_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    locsync(dir.path())
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn invalid_config_is_rejected_before_planning() {
    let dir = project();
    write(
        dir.path(),
        "locsync.toml",
        "version = 1\n[locale]\nsource = \"en\"\ntargets = [\"fr\"]\n[buckets.yaml]\ninclude = [\"a/[locale].yml\"]\n",
    );
    locsync(dir.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported bucket type `yaml`"));
    assert!(!dir.path().join("locales/fr.json").exists());
}

#[test]
fn watch_flags_require_watch() {
    let dir = project();
    locsync(dir.path())
        .args(["run", "--debounce", "100"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn schema_dumps_report_types() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("schemas");
    locsync(dir.path())
        .arg("schema")
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("schemas written to"));
    for name in [
        "run_summary.schema.json",
        "task_report.schema.json",
        "plan_report.schema.json",
        "watch_pattern_report.schema.json",
    ] {
        let schema = read_json(&out.join(name));
        assert!(schema.get("title").is_some(), "{name} has no title");
    }
}
