//! Report rows and the emitted report documents.
//!
//! Rows are the unit of traceability: one row per executed step, keyed by its
//! traceable id. The CSV, JSON, and HTML outputs are all rendered from the
//! same [`ReportDocument`] and row list.
mod csv;
mod html;
mod rows;

pub use self::csv::{coverage_csv, report_csv};
pub use html::render_html;
pub use rows::{build_rows, RowInputs};

use crate::artifacts::StepStatus;
use crate::coverage::{CoverageSnapshot, StepOutcome};
use crate::failures::{ErrorCategory, FailureDetail};
use crate::history::DuplicateAdvisory;
use crate::mapping::UserStory;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const REPORT_SCHEMA_VERSION: u32 = 1;
pub const UNMAPPED_FUNCTION: &str = "未分類";
pub const UNMAPPED_VIEWPOINT: &str = "(対応する観点なし)";

/// How a result relates to earlier runs of the same route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    Initial,
    Rerun,
    FixedRouteRerun,
}

impl ExecutionType {
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionType::Initial => "初回実行",
            ExecutionType::Rerun => "再実行",
            ExecutionType::FixedRouteRerun => "修正ルート再実行",
        }
    }
}

/// One report line: an executed step traced back to its viewpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub executed_at: Option<DateTime<Utc>>,
    pub traceable_id: String,
    pub user_story: String,
    pub function: String,
    pub viewpoint: String,
    pub test_steps: String,
    pub status: Option<StepStatus>,
    pub error_detail: String,
    pub url: String,
    pub execution_type: ExecutionType,
    pub route_id: String,
    pub original_route_id: Option<String>,
    pub error_category: Option<ErrorCategory>,
    /// Step label, used to match retried steps of fixed routes.
    pub label: String,
    /// `(function_id, viewpoint position)` for mapped rows.
    pub viewpoint_key: Option<(String, usize)>,
}

impl ReportRow {
    pub fn result_label(&self) -> &'static str {
        self.status.unwrap_or(StepStatus::Unknown).report_label()
    }

    pub fn is_unmapped(&self) -> bool {
        self.viewpoint_key.is_none()
    }

    /// Coverage input for mapped rows.
    pub fn outcome(&self) -> Option<StepOutcome> {
        self.viewpoint_key
            .as_ref()
            .map(|(function_id, position)| StepOutcome {
                function_id: function_id.clone(),
                viewpoint_in_function: *position,
                status: self.status,
            })
    }
}

/// Structured run summary written as `coverage_<stamp>.json`.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    pub schema_version: u32,
    pub run_stamp: String,
    pub generated_at: DateTime<Utc>,
    pub artifacts: String,
    pub inputs_hash: String,
    pub user_story: UserStory,
    pub row_count: usize,
    pub unmapped_rows: usize,
    pub fallback: bool,
    pub coverage: CoverageSnapshot,
    pub failures: Vec<FailureDetail>,
    pub advisories: Vec<DuplicateAdvisory>,
    pub warnings: Vec<String>,
}
