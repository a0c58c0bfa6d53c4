//! Failure taxonomy for failed execution steps.
//!
//! `ERROR_RULES` is evaluated top to bottom and the first match wins; the
//! order is part of the contract (a timeout waiting for visibility is a
//! visibility problem, not a timeout).
mod advisor;

pub use advisor::{suggest, Suggestion};

use crate::artifacts::{ExecutionResult, StepStatus};
use crate::dedup::{failure_key, keep_latest, RecordKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Error categories, in rule order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    ElementNotVisible,
    ElementDisabled,
    TimeoutError,
    ElementNotFound,
    CheckboxMisuse,
    NumericInputValidation,
    UnknownError,
}

/// Lowercase substring rules, evaluated in order.
pub const ERROR_RULES: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::ElementNotVisible,
        &["not visible", "is hidden", "to be visible"],
    ),
    (ErrorCategory::ElementDisabled, &["disabled", "not enabled"]),
    (ErrorCategory::TimeoutError, &["timeout", "timed out"]),
    (
        ErrorCategory::ElementNotFound,
        &[
            "resolved to 0 elements",
            "not found",
            "no element",
            "unable to find",
        ],
    ),
    (ErrorCategory::CheckboxMisuse, &["checkbox", "radio"]),
    (
        ErrorCategory::NumericInputValidation,
        &[
            "type=number",
            "cannot type text into input",
            "malformed value",
            "not a number",
        ],
    ),
];

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::ElementNotVisible => "element_not_visible",
            ErrorCategory::ElementDisabled => "element_disabled",
            ErrorCategory::TimeoutError => "timeout_error",
            ErrorCategory::ElementNotFound => "element_not_found",
            ErrorCategory::CheckboxMisuse => "checkbox_misuse",
            ErrorCategory::NumericInputValidation => "numeric_input_validation",
            ErrorCategory::UnknownError => "unknown_error",
        }
    }

    /// Heading used in the HTML report.
    pub fn title(&self) -> &'static str {
        match self {
            ErrorCategory::ElementNotVisible => "要素が表示されていない",
            ErrorCategory::ElementDisabled => "要素が無効化されている",
            ErrorCategory::TimeoutError => "タイムアウト",
            ErrorCategory::ElementNotFound => "要素が見つからない",
            ErrorCategory::CheckboxMisuse => "チェックボックス操作の誤り",
            ErrorCategory::NumericInputValidation => "数値入力の検証エラー",
            ErrorCategory::UnknownError => "不明なエラー",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an error message; empty or unmatched text is `UnknownError`.
pub fn classify_error(text: &str) -> ErrorCategory {
    let lowered = text.to_lowercase();
    ERROR_RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|needle| lowered.contains(needle)))
        .map(|(category, _)| *category)
        .unwrap_or(ErrorCategory::UnknownError)
}

/// A failed step with its classification and ranked suggestions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureDetail {
    pub label: String,
    pub action: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub error: String,
    pub error_category: ErrorCategory,
    pub fix_suggestions: Vec<Suggestion>,
    pub route_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl FailureDetail {
    pub fn key(&self) -> String {
        failure_key(
            &self.label,
            &self.action,
            &self.target,
            self.value.as_deref().unwrap_or_default(),
            &self.error,
        )
    }
}

/// Collect failed steps from canonical results, one record per
/// `(label, action, target, value, error)`.
pub fn collect_failures(results: &[ExecutionResult]) -> Vec<FailureDetail> {
    let mut details = Vec::new();
    for result in results {
        for step in &result.steps {
            if step.status != Some(StepStatus::Failed) {
                continue;
            }
            let error = step.error.clone().unwrap_or_default();
            let error_category = classify_error(&error);
            details.push(FailureDetail {
                label: step.label.clone(),
                action: step.action.clone(),
                target: step.target.clone(),
                value: step.value.clone(),
                fix_suggestions: suggest(step, error_category),
                error,
                error_category,
                route_id: result.id().to_string(),
                timestamp: result.timestamp,
            });
        }
    }
    keep_latest(
        details,
        RecordKind::Failures,
        |detail| Some(detail.key()),
        |detail| detail.timestamp,
    )
}

/// Group failures by category in rule order; groups are never empty.
pub fn group_by_category(failures: &[FailureDetail]) -> Vec<(ErrorCategory, Vec<&FailureDetail>)> {
    let mut groups: Vec<(ErrorCategory, Vec<&FailureDetail>)> = Vec::new();
    for failure in failures {
        match groups
            .iter_mut()
            .find(|(category, _)| *category == failure.error_category)
        {
            Some((_, members)) => members.push(failure),
            None => groups.push((failure.error_category, vec![failure])),
        }
    }
    groups.sort_by_key(|(category, _)| *category);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::Step;
    use chrono::TimeZone;

    #[test]
    fn timeout_waiting_for_selector_is_a_timeout() {
        let category = classify_error("Timeout 5000ms exceeded waiting for selector");
        assert_eq!(category, ErrorCategory::TimeoutError);
        assert_eq!(category.as_str(), "timeout_error");
    }

    #[test]
    fn zero_matching_elements_is_not_found() {
        let category = classify_error("locator resolved to 0 elements, selector: [name=\"email\"]");
        assert_eq!(category, ErrorCategory::ElementNotFound);
    }

    #[test]
    fn rule_order_decides_overlapping_messages() {
        assert_eq!(
            classify_error("Timeout 30000ms exceeded waiting for locator to be visible"),
            ErrorCategory::ElementNotVisible
        );
        assert_eq!(
            classify_error("element is disabled; timed out"),
            ErrorCategory::ElementDisabled
        );
        assert_eq!(
            classify_error("Error: Not a checkbox or radio button"),
            ErrorCategory::CheckboxMisuse
        );
        assert_eq!(
            classify_error("Cannot type text into input[type=number]"),
            ErrorCategory::NumericInputValidation
        );
        assert_eq!(classify_error(""), ErrorCategory::UnknownError);
        assert_eq!(classify_error("segfault"), ErrorCategory::UnknownError);
    }

    #[test]
    fn classification_is_deterministic() {
        let text = "waiting for element: no element matches";
        let first = classify_error(text);
        for _ in 0..5 {
            assert_eq!(classify_error(text), first);
        }
    }

    fn failed_step(label: &str, error: &str) -> Step {
        Step {
            label: label.to_string(),
            action: "click".to_string(),
            target: "#submit".to_string(),
            status: Some(StepStatus::Failed),
            error: Some(error.to_string()),
            ..Step::default()
        }
    }

    fn result(route_id: &str, at: i64, steps: Vec<Step>) -> ExecutionResult {
        ExecutionResult {
            route_id: Some(route_id.to_string()),
            timestamp: Utc.timestamp_opt(at, 0).single(),
            steps,
            success_count: 0,
            failed_count: 1,
            is_fixed_route: false,
            original_route_id: None,
        }
    }

    #[test]
    fn identical_failures_collapse_to_the_latest() {
        let results = vec![
            result("route_1", 100, vec![failed_step("送信", "Timeout 5000ms exceeded")]),
            result("route_2", 200, vec![failed_step("送信", "Timeout 5000ms exceeded")]),
            result("route_2", 200, vec![failed_step("送信", "element is not visible")]),
        ];
        let failures = collect_failures(&results);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].route_id, "route_2");
        assert_eq!(failures[0].error_category, ErrorCategory::TimeoutError);
        assert_eq!(failures[1].error_category, ErrorCategory::ElementNotVisible);

        let groups = group_by_category(&failures);
        let order: Vec<ErrorCategory> = groups.iter().map(|(category, _)| *category).collect();
        assert_eq!(
            order,
            vec![ErrorCategory::ElementNotVisible, ErrorCategory::TimeoutError]
        );
    }

    #[test]
    fn non_failed_steps_are_ignored() {
        let mut ok = failed_step("ok", "");
        ok.status = Some(StepStatus::Success);
        let failures = collect_failures(&[result("r", 1, vec![ok])]);
        assert!(failures.is_empty());
    }
}
