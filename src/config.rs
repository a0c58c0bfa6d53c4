//! Report configuration helpers.
//!
//! The config lives next to the artifacts (`trace_report.json`) and is
//! optional; every field has a default so a bare artifact directory works.
use crate::paths::ArtifactPaths;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Upper bound for the unmapped-step window size.
const MAX_BUCKET_SIZE: usize = 10;

/// Engine tunables read from `trace_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub schema_version: u32,
    pub debounce_minutes: i64,
    pub unmapped_bucket_size: usize,
    pub feasible_threshold: f64,
    pub low_feasibility_threshold: f64,
    pub route_success_threshold: f64,
    pub keyword_refinement: bool,
    pub extended_columns: bool,
    pub output_dir: String,
    pub custom_categories: Vec<CustomCategory>,
    /// Shell-style command line of the opt-in remediation hook.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation_command: Option<String>,
    pub file_patterns: FilePatterns,
}

impl Default for ReportConfig {
    fn default() -> Self {
        default_config()
    }
}

/// Extra functional category matched after the built-in keyword rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomCategory {
    pub name: String,
    pub keywords: Vec<String>,
}

/// Filename prefixes used to recognize each artifact kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilePatterns {
    pub viewpoints: Vec<String>,
    pub test_cases: Vec<String>,
    pub routes: Vec<String>,
    pub results: Vec<String>,
}

impl Default for FilePatterns {
    fn default() -> Self {
        Self {
            viewpoints: vec!["viewpoints".to_string(), "test_points".to_string()],
            test_cases: vec!["testcases".to_string(), "test_cases".to_string()],
            routes: vec!["route".to_string()],
            results: vec!["result".to_string()],
        }
    }
}

/// Build the default config used when no config file exists.
pub fn default_config() -> ReportConfig {
    ReportConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        debounce_minutes: 30,
        unmapped_bucket_size: 3,
        feasible_threshold: 0.7,
        low_feasibility_threshold: 0.3,
        route_success_threshold: 0.9,
        keyword_refinement: false,
        extended_columns: false,
        output_dir: "reports".to_string(),
        custom_categories: Vec::new(),
        remediation_command: None,
        file_patterns: FilePatterns::default(),
    }
}

/// Load the config at `path`.
pub fn load_config(path: &Path) -> Result<ReportConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: ReportConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    Ok(config)
}

/// Resolve the effective config: an explicit path must exist, the
/// artifact-local config is optional.
pub fn resolve_config(paths: &ArtifactPaths, explicit: Option<&Path>) -> Result<ReportConfig> {
    let config = match explicit {
        Some(path) => load_config(path)?,
        None => {
            let path = paths.config_path();
            if path.is_file() {
                load_config(&path)?
            } else {
                default_config()
            }
        }
    };
    validate_config(&config)?;
    Ok(config)
}

/// Persist a config to disk in a stable JSON format.
pub fn write_config(path: &Path, config: &ReportConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(config).context("serialize report config")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Validate schema version, thresholds, and user-provided rules.
pub fn validate_config(config: &ReportConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.debounce_minutes < 0 {
        return Err(anyhow!("debounce_minutes must be >= 0"));
    }
    if !(1..=MAX_BUCKET_SIZE).contains(&config.unmapped_bucket_size) {
        return Err(anyhow!(
            "unmapped_bucket_size must be between 1 and {MAX_BUCKET_SIZE} (got {})",
            config.unmapped_bucket_size
        ));
    }
    for (label, value) in [
        ("feasible_threshold", config.feasible_threshold),
        ("low_feasibility_threshold", config.low_feasibility_threshold),
        ("route_success_threshold", config.route_success_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(anyhow!("{label} must be within [0, 1] (got {value})"));
        }
    }
    if config.low_feasibility_threshold > config.feasible_threshold {
        return Err(anyhow!(
            "low_feasibility_threshold must not exceed feasible_threshold"
        ));
    }
    for category in &config.custom_categories {
        if category.name.trim().is_empty() {
            return Err(anyhow!("custom category names must be non-empty"));
        }
        if category.keywords.iter().all(|kw| kw.trim().is_empty()) {
            return Err(anyhow!(
                "custom category {:?} needs at least one keyword",
                category.name
            ));
        }
    }
    if let Some(command) = config.remediation_command.as_deref() {
        let argv = shell_words::split(command)
            .with_context(|| format!("parse remediation_command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("remediation_command must not be empty"));
        }
    }
    let patterns = &config.file_patterns;
    for (label, prefixes) in [
        ("viewpoints", &patterns.viewpoints),
        ("test_cases", &patterns.test_cases),
        ("routes", &patterns.routes),
        ("results", &patterns.results),
    ] {
        if prefixes.iter().all(|prefix| prefix.trim().is_empty()) {
            return Err(anyhow!("file_patterns.{label} must list at least one prefix"));
        }
    }
    validate_relative_path(&config.output_dir, "output_dir")?;
    Ok(())
}

fn validate_relative_path(rel: &str, label: &str) -> Result<()> {
    let path = Path::new(rel);
    if rel.trim().is_empty() || path.is_absolute() || has_parent_components(path) {
        return Err(anyhow!(
            "{label} must be a relative path without '..' (got {rel:?})"
        ));
    }
    Ok(())
}

fn has_parent_components(path: &Path) -> bool {
    path.components()
        .any(|component| matches!(component, std::path::Component::ParentDir))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
