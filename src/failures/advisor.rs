use super::ErrorCategory;
use crate::artifacts::Step;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Kind of remediation a suggestion proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    IncreaseTimeout,
    UpdateSelector,
    AlternativeSelector,
    WaitForVisible,
    ScrollIntoView,
    EnablePrerequisites,
    ChangeAction,
    FixInputValue,
    ManualReview,
}

impl SuggestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionKind::IncreaseTimeout => "increase_timeout",
            SuggestionKind::UpdateSelector => "update_selector",
            SuggestionKind::AlternativeSelector => "alternative_selector",
            SuggestionKind::WaitForVisible => "wait_for_visible",
            SuggestionKind::ScrollIntoView => "scroll_into_view",
            SuggestionKind::EnablePrerequisites => "enable_prerequisites",
            SuggestionKind::ChangeAction => "change_action",
            SuggestionKind::FixInputValue => "fix_input_value",
            SuggestionKind::ManualReview => "manual_review",
        }
    }
}

/// A ranked remediation proposal for one failed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub message: String,
    pub confidence: f64,
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_action: Option<String>,
}

impl Suggestion {
    fn new(kind: SuggestionKind, confidence: f64, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            confidence,
            kind,
            new_target: None,
            new_action: None,
        }
    }
}

fn name_attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"\[\s*name\s*=\s*["']?([A-Za-z0-9_\-]+)["']?\s*\]"#)
            .expect("name attribute pattern")
    })
}

/// Extract `x` from a `[name="x"]` selector.
fn name_attribute(text: &str) -> Option<String> {
    name_attribute_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|name| name.as_str().to_string())
}

/// Deterministic suggestions for a failed step, highest confidence first.
pub fn suggest(step: &Step, category: ErrorCategory) -> Vec<Suggestion> {
    let target = step.target.trim();
    let mut suggestions = match category {
        ErrorCategory::TimeoutError => vec![Suggestion::new(
            SuggestionKind::IncreaseTimeout,
            0.7,
            "Increase the wait timeout or wait for the page to finish loading",
        )],
        ErrorCategory::ElementNotFound => {
            let mut found = vec![Suggestion::new(
                SuggestionKind::UpdateSelector,
                0.8,
                format!("Update the selector {target:?}; no element matched it"),
            )];
            let name = name_attribute(target)
                .or_else(|| step.error.as_deref().and_then(name_attribute));
            if let Some(name) = name {
                let mut alternative = Suggestion::new(
                    SuggestionKind::AlternativeSelector,
                    0.6,
                    format!("Try the id selector #{name} instead of the name attribute"),
                );
                alternative.new_target = Some(format!("#{name}"));
                found.push(alternative);
            }
            found
        }
        ErrorCategory::ElementNotVisible => vec![
            Suggestion::new(
                SuggestionKind::WaitForVisible,
                0.6,
                "Wait for the element to become visible before interacting",
            ),
            Suggestion::new(
                SuggestionKind::ScrollIntoView,
                0.4,
                "Scroll the element into view or close overlapping dialogs",
            ),
        ],
        ErrorCategory::ElementDisabled => vec![Suggestion::new(
            SuggestionKind::EnablePrerequisites,
            0.6,
            "Complete the prerequisite inputs that enable this element",
        )],
        ErrorCategory::CheckboxMisuse => {
            let uncheck = step.value.as_deref().is_some_and(|value| {
                matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "false" | "0" | "off" | "no" | "unchecked"
                )
            });
            let action = if uncheck { "uncheck" } else { "check" };
            let mut change = Suggestion::new(
                SuggestionKind::ChangeAction,
                0.9,
                format!("Use the {action} action for checkboxes and radio buttons"),
            );
            change.new_action = Some(action.to_string());
            vec![change]
        }
        ErrorCategory::NumericInputValidation => vec![Suggestion::new(
            SuggestionKind::FixInputValue,
            0.8,
            "Provide a numeric value for this number input",
        )],
        ErrorCategory::UnknownError => vec![Suggestion::new(
            SuggestionKind::ManualReview,
            0.3,
            "Review the failure manually",
        )],
    };
    suggestions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    suggestions
}
