//! CLI E2E tests for pl-core.
//!
//! Validates:
//! - `check` accepts valid configs and lists every problem of invalid ones
//! - `render-sql` prints the build instructions
//! - `run --dry-run` builds with a mock builder and publishes in memory
//! - `run` publishes to a local directory
//! - Exit codes follow the failure taxonomy
#![cfg(unix)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

// ============================================================================
// Helpers
// ============================================================================

fn pl_core() -> Command {
    let mut cmd = cargo_bin_cmd!("pl-core");
    cmd.timeout(Duration::from_secs(60));
    cmd.env_remove("PL_CONFIG");
    cmd.env("RUST_LOG", "warn");
    cmd
}

const BUILDER: &str = r#"#!/bin/sh
set -e
d=clickhouse_data/data/data/analytics/events
mkdir -p "$d/all_1_1_0"
cat pipe_file > "$d/all_1_1_0/data.csv"
"#;

const ROWS: &str = r#"{"id":1,"name":"Alice","amount":"10.50"}
{"id":2,"amount":20.00}
{"id":3,"name":"Carol","amount":"30.25"}
"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(builder: Option<&str>) -> Self {
        let dir = tempdir().unwrap();
        let bin = dir.path().join("bin");
        fs::create_dir(&bin).unwrap();
        if let Some(body) = builder {
            let script = bin.join("build.sh");
            fs::write(&script, body).unwrap();
            let mut perms = fs::metadata(&script).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&script, perms).unwrap();
        }
        fs::create_dir(dir.path().join("work")).unwrap();
        fs::write(dir.path().join("rows.jsonl"), ROWS).unwrap();
        Self { dir }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn write_config(&self, extra: &str) -> PathBuf {
        let config = format!(
            r#"
database = "analytics"
table = "events"
upload_root = '{upload}'
remote_user = "hdfs"
work_dir = '{work}'
fields = ["id", "name", "amount"]
create_table_sql = "CREATE TABLE analytics.events (id UInt64, name String, amount Decimal(10,2)) ENGINE = Distributed(c, analytics, events_local)"
{extra}

[builder]
binary_dir = '{bin}'

[schema]
id = "UInt64"
name = "Nullable(String)"
amount = "Decimal(10, 2)"

[default_values]
name = '"unknown"'
"#,
            upload = self.path("published").display(),
            work = self.path("work").display(),
            bin = self.path("bin").display(),
            extra = extra,
        );
        let path = self.path("loader.toml");
        fs::write(&path, config).unwrap();
        path
    }

    fn workdirs_left(&self) -> usize {
        fs::read_dir(self.path("work")).unwrap().count()
    }
}

fn as_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

// ============================================================================
// check
// ============================================================================

#[test]
fn check_accepts_valid_config() {
    let ws = Workspace::new(None);
    let config = ws.write_config("");
    pl_core()
        .args(["--config", as_str(&config), "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "configuration for analytics.events is valid",
        ));
}

#[test]
fn check_reports_every_problem() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("loader.toml");
    fs::write(&config, "username = \"u\"\n").unwrap();
    pl_core()
        .args(["--config", as_str(&config), "check"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("option database is required"))
        .stderr(predicate::str::contains("option table is required"))
        .stderr(predicate::str::contains(
            "please specify username and password at the same time",
        ));
}

#[test]
fn config_from_env_var() {
    let ws = Workspace::new(None);
    let config = ws.write_config("");
    pl_core()
        .env("PL_CONFIG", &config)
        .arg("check")
        .assert()
        .success();
}

#[test]
fn missing_config_file_is_exit_10() {
    pl_core()
        .args(["--config", "/nonexistent/loader.toml", "check"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("/nonexistent/loader.toml"));
}

// ============================================================================
// render-sql
// ============================================================================

#[test]
fn render_sql_prints_all_statements() {
    let ws = Workspace::new(None);
    let config = ws.write_config("");
    pl_core()
        .args(["--config", as_str(&config), "render-sql"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "CREATE TABLE input (\n`id` UInt64,\n`name` Nullable(String),\n`amount` Decimal(10, 2)\n) ENGINE = File(CSV, stdin);\n",
        ))
        .stdout(predicate::str::contains("create database if not exists analytics;\n"))
        .stdout(predicate::str::contains("ENGINE = MergeTree()"))
        .stdout(predicate::str::contains(
            "insert into analytics.events (`id`,`name`,`amount`) select * from input;\n",
        ))
        .stdout(predicate::str::contains("optimize table analytics.events final"));
}

// ============================================================================
// run
// ============================================================================

#[test]
fn dry_run_reports_json() {
    let ws = Workspace::new(Some(BUILDER));
    let config = ws.write_config("");
    let output = pl_core()
        .args([
            "--config",
            as_str(&config),
            "run",
            "--rows",
            as_str(&ws.path("rows.jsonl")),
            "--dry-run",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: Value = serde_json::from_slice(&output).expect("parse JSON");
    assert_eq!(report["table"], "analytics.events");
    assert_eq!(report["rows_written"], 3);
    assert_eq!(report["fragments"], 1);
    assert!(!ws.path("published").exists());
    assert_eq!(ws.workdirs_left(), 0);
}

#[test]
fn run_publishes_to_local_root() {
    let ws = Workspace::new(Some(BUILDER));
    let config = ws.write_config("");
    pl_core()
        .args([
            "--config",
            as_str(&config),
            "--log-format",
            "json",
            "run",
            "--rows",
            as_str(&ws.path("rows.jsonl")),
        ])
        .assert()
        .success();

    let published: Vec<String> = fs::read_dir(ws.path("published"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".zip"))
        .collect();
    assert_eq!(published.len(), 1);
    assert!(published[0].ends_with("__all_1_1_0.zip"));

    // Staging directory is left empty.
    let staged = fs::read_dir(ws.path("published").join("tmp")).unwrap().count();
    assert_eq!(staged, 0);
}

#[test]
fn missing_builder_is_exit_31() {
    let ws = Workspace::new(None);
    let config = ws.write_config("");
    pl_core()
        .args([
            "--config",
            as_str(&config),
            "run",
            "--rows",
            as_str(&ws.path("rows.jsonl")),
            "--dry-run",
        ])
        .assert()
        .code(31)
        .stderr(predicate::str::contains("build script not found"));
    assert_eq!(ws.workdirs_left(), 0);
}

#[test]
fn failing_builder_is_exit_32() {
    let ws = Workspace::new(Some("#!/bin/sh\ncat pipe_file > /dev/null\nexit 5\n"));
    let config = ws.write_config("");
    pl_core()
        .args([
            "--config",
            as_str(&config),
            "run",
            "--rows",
            as_str(&ws.path("rows.jsonl")),
            "--dry-run",
        ])
        .assert()
        .code(32)
        .stderr(predicate::str::contains("builder exited with status 5"));
}

#[test]
fn malformed_rows_are_exit_60() {
    let ws = Workspace::new(Some(BUILDER));
    let config = ws.write_config("");
    fs::write(ws.path("rows.jsonl"), "{\"id\":1}\nnot json\n").unwrap();
    pl_core()
        .args([
            "--config",
            as_str(&config),
            "run",
            "--rows",
            as_str(&ws.path("rows.jsonl")),
            "--dry-run",
        ])
        .assert()
        .code(60)
        .stderr(predicate::str::contains("line 2"));
}
