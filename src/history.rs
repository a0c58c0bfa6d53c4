//! Duplicate-run history and the opt-in remediation hook.
//!
//! The history is a TTL advisory, not a lock: a run for the same route
//! identity inside the debounce window is flagged, never blocked.
use crate::artifacts::{ExecutionResult, LoadedRoute};
use crate::util::{display_path, write_atomic};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::process::Command;

pub const HISTORY_SCHEMA_VERSION: u32 = 1;

/// Persisted last-run record per route identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHistory {
    pub schema_version: u32,
    #[serde(default)]
    pub entries: BTreeMap<String, HistoryEntry>,
}

impl Default for RunHistory {
    fn default() -> Self {
        Self {
            schema_version: HISTORY_SCHEMA_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub route_id: String,
    pub last_run_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub succeeded: usize,
    pub failed: usize,
}

/// Non-blocking warning that a run looks like a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateAdvisory {
    pub identity: String,
    pub route_id: String,
    pub previous_run_at: DateTime<Utc>,
    pub current_run_at: DateTime<Utc>,
    pub minutes_apart: i64,
    pub has_failures: bool,
    pub message: String,
}

/// Route identity: the route file relative to the artifact root, or
/// `route:{id}` when no route file defines the route.
pub fn route_identities(artifact_root: &Path, routes: &[LoadedRoute]) -> HashMap<String, String> {
    routes
        .iter()
        .map(|loaded| {
            (
                loaded.route.id().to_string(),
                display_path(&loaded.path, Some(artifact_root)),
            )
        })
        .collect()
}

fn identity_for(identities: &HashMap<String, String>, route_id: &str) -> String {
    identities
        .get(route_id)
        .cloned()
        .unwrap_or_else(|| format!("route:{route_id}"))
}

/// Load the history; a missing file is an empty history.
pub fn load_history(path: &Path) -> Result<RunHistory> {
    if !path.is_file() {
        return Ok(RunHistory::default());
    }
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let history: RunHistory = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse run history {}", path.display()))?;
    if history.schema_version != HISTORY_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported run history schema_version {}",
            history.schema_version
        ));
    }
    Ok(history)
}

/// Persist the history with a temp file and atomic rename.
pub fn write_history(path: &Path, history: &RunHistory) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(history).context("serialize run history")?;
    write_atomic(path, &bytes)
}

impl RunHistory {
    /// Flag canonical results whose identity last ran within `debounce`.
    ///
    /// Entries recorded more than `debounce` before `now` have expired, so
    /// re-reporting the same artifacts later is not flagged.
    pub fn detect_duplicates(
        &self,
        results: &[ExecutionResult],
        identities: &HashMap<String, String>,
        debounce: Duration,
        now: DateTime<Utc>,
    ) -> Vec<DuplicateAdvisory> {
        let mut advisories = Vec::new();
        for result in results {
            let identity = identity_for(identities, result.id());
            let Some(entry) = self.entries.get(&identity) else {
                continue;
            };
            if now - entry.recorded_at >= debounce {
                continue;
            }
            let current = result.timestamp.unwrap_or(now);
            let apart = (current - entry.last_run_at).abs();
            if apart >= debounce {
                continue;
            }
            let minutes_apart = apart.num_minutes();
            let has_failures = result.step_counts().failed > 0;
            advisories.push(DuplicateAdvisory {
                message: format!(
                    "route {} ({identity}) already ran at {}, {minutes_apart} minute(s) from this run; treating it as a likely duplicate",
                    result.id(),
                    entry.last_run_at.to_rfc3339()
                ),
                identity,
                route_id: result.id().to_string(),
                previous_run_at: entry.last_run_at,
                current_run_at: current,
                minutes_apart,
                has_failures,
            });
        }
        advisories
    }

    /// Record the canonical results of this run.
    pub fn record(
        &mut self,
        results: &[ExecutionResult],
        identities: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) {
        for result in results {
            let counts = result.step_counts();
            let outcome = if counts.failed == 0 {
                RunOutcome::Passed
            } else {
                RunOutcome::Failed
            };
            self.entries.insert(
                identity_for(identities, result.id()),
                HistoryEntry {
                    route_id: result.id().to_string(),
                    last_run_at: result.timestamp.unwrap_or(now),
                    recorded_at: now,
                    outcome,
                    succeeded: counts.succeeded,
                    failed: counts.failed,
                },
            );
        }
    }
}

/// Run the remediation command once per advisory whose route failed, with
/// the route id appended. Returns warnings; never fails the run.
pub fn run_remediation(command: &str, advisories: &[DuplicateAdvisory]) -> Vec<String> {
    let mut warnings = Vec::new();
    let argv = match shell_words::split(command) {
        Ok(argv) if !argv.is_empty() => argv,
        Ok(_) => {
            warnings.push("remediation_command is empty".to_string());
            return warnings;
        }
        Err(err) => {
            warnings.push(format!("parse remediation_command: {err}"));
            return warnings;
        }
    };
    let program = match which::which(&argv[0]) {
        Ok(path) => path,
        Err(err) => {
            let warning = format!("remediation program {} not found: {err}", argv[0]);
            tracing::warn!(program = argv[0].as_str(), "remediation program not found");
            warnings.push(warning);
            return warnings;
        }
    };
    for advisory in advisories.iter().filter(|advisory| advisory.has_failures) {
        tracing::info!(route_id = advisory.route_id.as_str(), "running remediation hook");
        let status = Command::new(&program)
            .args(&argv[1..])
            .arg(&advisory.route_id)
            .status();
        match status {
            Ok(status) if status.success() => {}
            Ok(status) => {
                tracing::warn!(route_id = advisory.route_id.as_str(), %status, "remediation hook failed");
                warnings.push(format!(
                    "remediation hook for {} exited with {status}",
                    advisory.route_id
                ));
            }
            Err(err) => {
                tracing::warn!(route_id = advisory.route_id.as_str(), error = %err, "remediation hook did not start");
                warnings.push(format!(
                    "spawn remediation hook for {}: {err}",
                    advisory.route_id
                ));
            }
        }
    }
    warnings
}
