//! Traceable ids: `{userStory}.{function}.{viewpoint}-{step}`.
use super::MappedStep;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

pub const DEFAULT_USER_STORY_ID: &str = "1";

/// Resolved user story for a report run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStory {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Default for UserStory {
    fn default() -> Self {
        Self {
            id: DEFAULT_USER_STORY_ID.to_string(),
            text: None,
        }
    }
}

fn user_story_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)user\s*story\s*[#:：]?\s*(\d+)",
            r"(?i)\bUS[-_\s#:]*(\d+)",
            r"ユーザーストーリー\s*[#:：]?\s*(\d+)",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("user story pattern"))
        .collect()
    })
}

/// Extract a numeric user story id from free text.
pub fn extract_user_story_id(text: &str) -> Option<String> {
    user_story_patterns().iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|id| id.as_str().to_string())
    })
}

/// Resolve the user story: explicit override, then viewpoint metadata, then
/// the default id.
pub fn resolve_user_story(explicit: Option<&str>, metadata: Option<&str>) -> UserStory {
    for source in [explicit, metadata].into_iter().flatten() {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.chars().all(|ch| ch.is_ascii_digit()) {
            return UserStory {
                id: trimmed.to_string(),
                text: None,
            };
        }
        if let Some(id) = extract_user_story_id(trimmed) {
            return UserStory {
                id,
                text: Some(trimmed.to_string()),
            };
        }
        return UserStory {
            id: DEFAULT_USER_STORY_ID.to_string(),
            text: Some(trimmed.to_string()),
        };
    }
    UserStory::default()
}

pub fn mapped_id(user_story_id: &str, step: &MappedStep) -> String {
    format!(
        "{user_story_id}.{}.{}-{}",
        step.function_id, step.viewpoint_in_function, step.step_in_viewpoint
    )
}

/// 1-based `(bucket, position)` for the `ordinal`-th unmapped step.
pub fn unmapped_slot(ordinal: usize, bucket_size: usize) -> (usize, usize) {
    let size = bucket_size.max(1);
    (ordinal / size + 1, ordinal % size + 1)
}

pub fn unmapped_id(user_story_id: &str, ordinal: usize, bucket_size: usize) -> String {
    let (bucket, position) = unmapped_slot(ordinal, bucket_size);
    format!("{user_story_id}.X.{bucket}-{position}")
}
