//! Typed paths into an artifact directory and its report output.
//!
//! Centralizing path construction keeps the report, history, and staging
//! locations consistent across commands.
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "trace_report.json";
const HISTORY_FILE_NAME: &str = "run_history.json";

/// Convenience wrapper for locating artifact-directory files.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    root: PathBuf,
}

impl ArtifactPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Return the artifact directory root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the `trace_report.json` path.
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Return the output directory, honoring an explicit override.
    pub fn output_paths(&self, configured: &str, explicit: Option<&Path>) -> OutputPaths {
        let root = match explicit {
            Some(path) => path.to_path_buf(),
            None => self.root.join(configured),
        };
        OutputPaths { root }
    }
}

/// Locations inside the report output directory.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    root: PathBuf,
}

impl OutputPaths {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the duplicate-run history path.
    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILE_NAME)
    }

    /// Return the `.txns` directory holding staged outputs.
    pub fn txns_root(&self) -> PathBuf {
        self.root.join(".txns")
    }

    /// Return the per-run transaction directory.
    pub fn txn_root(&self, stamp: &str) -> PathBuf {
        self.txns_root().join(stamp)
    }

    pub fn report_csv_name(stamp: &str) -> String {
        format!("test_report_{stamp}.csv")
    }

    pub fn coverage_csv_name(stamp: &str) -> String {
        format!("coverage_{stamp}.csv")
    }

    pub fn coverage_json_name(stamp: &str) -> String {
        format!("coverage_{stamp}.json")
    }

    pub fn html_name(stamp: &str) -> String {
        format!("report_{stamp}.html")
    }
}
