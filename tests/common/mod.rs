//! Shared test infrastructure for integration tests.

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Artifact directory written into a temp dir.
pub struct ArtifactFixture {
    pub dir: TempDir,
}

impl Default for ArtifactFixture {
    fn default() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }
}

impl ArtifactFixture {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn reports(&self) -> PathBuf {
        self.root().join("reports")
    }

    pub fn write_json(&self, name: &str, value: &Value) {
        let text = serde_json::to_string_pretty(value).expect("serialize fixture");
        fs::write(self.root().join(name), text).expect("write fixture");
    }

    pub fn write_raw(&self, name: &str, text: &str) {
        fs::write(self.root().join(name), text).expect("write fixture");
    }

    /// Four viewpoints with a user story in the wrapper metadata.
    pub fn write_viewpoints(&self) {
        self.write_json(
            "viewpoints.json",
            &json!({
                "metadata": {"user_story": "User Story 5: 会員登録"},
                "points": [
                    {"No": 1, "観点": "メールアドレスを入力できる"},
                    {"No": 2, "観点": "パスワードを入力できる"},
                    {"No": 3, "観点": "登録ボタンを押すと送信される"},
                    {"No": 4, "観点": "完了画面が表示される"}
                ]
            }),
        );
    }

    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_trace-report"))
            .args(args)
            .env_remove("TRACE_REPORT_LOG")
            .output()
            .expect("run trace-report")
    }

    pub fn run_report(&self, extra: &[&str]) -> Output {
        let root = self.root().to_string_lossy().to_string();
        let mut args = vec!["report", "--artifacts", root.as_str()];
        args.extend_from_slice(extra);
        self.run(&args)
    }

    /// Newest report output named `{prefix}<stamp>.{extension}`.
    pub fn latest_output(&self, prefix: &str, extension: &str) -> PathBuf {
        let mut matches: Vec<PathBuf> = fs::read_dir(self.reports())
            .expect("list reports")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| {
                        name.starts_with(prefix) && name.ends_with(&format!(".{extension}"))
                    })
            })
            .collect();
        matches.sort();
        matches.pop().expect("report output present")
    }

    pub fn report_records(&self) -> Vec<Vec<String>> {
        let bytes = fs::read(self.latest_output("test_report_", "csv")).expect("read report CSV");
        assert!(bytes.starts_with(UTF8_BOM), "report CSV starts with a BOM");
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(&bytes[UTF8_BOM.len()..]);
        reader
            .records()
            .map(|record| {
                record
                    .expect("parse CSV record")
                    .iter()
                    .map(str::to_string)
                    .collect()
            })
            .collect()
    }

    pub fn report_document(&self) -> Value {
        let bytes = fs::read(self.latest_output("coverage_", "json"))
            .expect("read coverage JSON");
        serde_json::from_slice(&bytes).expect("parse coverage JSON")
    }
}

/// Execution result JSON with one step per `(label, action, target, status)`.
pub fn result(route_id: &str, timestamp: &str, steps: &[(&str, &str, &str, &str)]) -> Value {
    let steps: Vec<Value> = steps
        .iter()
        .map(|(label, action, target, status)| {
            let mut step = json!({
                "label": label,
                "action": action,
                "target": target,
                "status": status,
            });
            if *status == "failed" {
                step["error"] = json!("Timeout 5000ms exceeded");
            }
            step
        })
        .collect();
    json!({
        "route_id": route_id,
        "timestamp": timestamp,
        "steps": steps,
    })
}
