//! Typed records for generation and execution artifacts.
//!
//! Field names accept both the snake_case and camelCase spellings emitted by
//! the upstream producers.
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single testable concern, the root of traceability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Viewpoint {
    pub index: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

/// A generated test case derived from a viewpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCase {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_viewpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Execution status of a step once the driver has run it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[serde(alias = "passed", alias = "pass", alias = "ok")]
    Success,
    #[serde(alias = "fail", alias = "failure", alias = "error")]
    Failed,
    #[serde(alias = "skip")]
    Skipped,
    #[serde(other)]
    Unknown,
}

impl StepStatus {
    /// Label used in the `実行結果` report column.
    pub fn report_label(self) -> &'static str {
        match self {
            StepStatus::Success => "成功",
            StepStatus::Failed => "失敗",
            StepStatus::Skipped => "スキップ",
            StepStatus::Unknown => "未実行",
        }
    }
}

/// Coarse grouping of the closed action vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Load,
    Click,
    Fill,
    Select,
    Check,
    Wait,
    Assert,
    Other,
}

impl ActionKind {
    pub fn parse(action: &str) -> Self {
        let lowered = action.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "load" | "goto" | "navigate" | "open" => ActionKind::Load,
            "click" | "dblclick" | "tap" => ActionKind::Click,
            "fill" | "type" | "press" => ActionKind::Fill,
            "select" | "selectoption" | "select_option" => ActionKind::Select,
            "check" | "uncheck" => ActionKind::Check,
            other if other.starts_with("wait") => ActionKind::Wait,
            other if other.starts_with("assert") || other.starts_with("expect") => {
                ActionKind::Assert
            }
            _ => ActionKind::Other,
        }
    }
}

/// One action of a route, optionally carrying its execution outcome.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Step {
    #[serde(default, deserialize_with = "lenient_string")]
    pub label: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub action: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub target: String,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StepStatus>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
}

impl Step {
    pub fn action_kind(&self) -> ActionKind {
        ActionKind::parse(&self.action)
    }

    /// Human-readable step text used in the `テスト手順` column.
    pub fn steps_text(&self) -> String {
        let mut text = String::new();
        if !self.label.trim().is_empty() {
            text.push_str(self.label.trim());
            text.push_str(": ");
        }
        text.push_str(self.action.trim());
        if !self.target.trim().is_empty() {
            text.push(' ');
            text.push_str(self.target.trim());
        }
        if let Some(value) = self.value.as_deref().filter(|v| !v.is_empty()) {
            text.push_str(" = ");
            text.push_str(value);
        }
        text
    }
}

/// A generated, executable route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(
        default,
        alias = "routeId",
        alias = "id",
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub route_id: Option<String>,
    pub steps: Vec<Step>,
    #[serde(
        default,
        alias = "feasibilityScore",
        skip_serializing_if = "Option::is_none"
    )]
    pub feasibility_score: Option<f64>,
}

impl Route {
    pub fn id(&self) -> &str {
        self.route_id.as_deref().unwrap_or(UNKNOWN_KEY)
    }
}

/// One execution of a route by the external driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(
        default,
        alias = "routeId",
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub route_id: Option<String>,
    #[serde(
        default,
        alias = "executedAt",
        alias = "executed_at",
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    pub steps: Vec<Step>,
    #[serde(default, alias = "successCount")]
    pub success_count: usize,
    #[serde(default, alias = "failedCount")]
    pub failed_count: usize,
    #[serde(default, alias = "isFixedRoute")]
    pub is_fixed_route: bool,
    #[serde(
        default,
        alias = "originalRouteId",
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_route_id: Option<String>,
}

impl ExecutionResult {
    pub fn id(&self) -> &str {
        self.route_id.as_deref().unwrap_or(UNKNOWN_KEY)
    }

    /// Step outcome counts, preferring per-step statuses over the summary
    /// counters when the driver recorded any.
    pub fn step_counts(&self) -> StepCounts {
        let has_status = self.steps.iter().any(|step| step.status.is_some());
        if !has_status {
            return StepCounts {
                total: self.success_count + self.failed_count,
                succeeded: self.success_count,
                failed: self.failed_count,
                skipped: 0,
            };
        }
        let mut counts = StepCounts {
            total: self.steps.len(),
            ..StepCounts::default()
        };
        for step in &self.steps {
            match step.status {
                Some(StepStatus::Success) => counts.succeeded += 1,
                Some(StepStatus::Failed) => counts.failed += 1,
                Some(StepStatus::Skipped) => counts.skipped += 1,
                Some(StepStatus::Unknown) | None => {}
            }
        }
        counts
    }
}

/// Step outcome counters for one execution result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl StepCounts {
    /// Share of successful steps in `[0, 1]`; zero when nothing ran.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64
    }
}

/// Key used when a record carries no identifier.
pub const UNKNOWN_KEY: &str = "unknown";

/// Parse the timestamp spellings seen in execution artifacts.
///
/// Naive timestamps are interpreted as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y%m%d_%H%M%S",
        "%Y%m%d%H%M%S",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }
    if trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
        return trimmed.parse::<i64>().ok().and_then(from_epoch_ms);
    }
    None
}

fn from_epoch_ms(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Render a JSON scalar as a string; objects and arrays are rejected.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        Value::Array(_) | Value::Object(_) => Err(de::Error::custom(UnexpectedShape(
            "expected a string, number, or boolean",
        ))),
        other => Ok(scalar_to_string(&other)),
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => Ok(number.as_i64().and_then(from_epoch_ms)),
        Value::String(text) => Ok(parse_timestamp(&text)),
        _ => Err(de::Error::custom(UnexpectedShape(
            "expected a timestamp string or epoch milliseconds",
        ))),
    }
}

struct UnexpectedShape(&'static str);

impl fmt::Display for UnexpectedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
