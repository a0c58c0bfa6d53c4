use super::{ExecutionType, ReportRow, UNMAPPED_FUNCTION, UNMAPPED_VIEWPOINT};
use crate::artifacts::{ActionKind, ExecutionResult, Step, StepStatus};
use crate::dedup::{keep_latest, RecordKind};
use crate::failures::classify_error;
use crate::mapping::{
    mapped_id, unmapped_id, ClassifiedViewpoint, StepAssignment, StepViewpointMapper, UserStory,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Shared inputs for row construction.
pub struct RowInputs<'a> {
    pub viewpoints: &'a [ClassifiedViewpoint],
    pub mapper: &'a dyn StepViewpointMapper,
    pub user_story: &'a UserStory,
    pub bucket_size: usize,
    /// Number of results seen per route id, reruns included.
    pub runs_per_route: &'a HashMap<String, usize>,
}

/// Build deduplicated report rows from canonical results.
///
/// Steps of every canonical result are mapped together so traceable ids stay
/// unique across routes. A fixed route whose original is present inherits
/// the original's ids by step label and supersedes those rows, unless the
/// retry is older than the row it would replace. Its other steps become
/// unmapped rows numbered after the ones already used.
pub fn build_rows(inputs: &RowInputs<'_>, canonical: &[ExecutionResult]) -> Vec<ReportRow> {
    let known: HashSet<&str> = canonical.iter().map(ExecutionResult::id).collect();
    let is_retry_of_known = |result: &ExecutionResult| {
        result.is_fixed_route
            && result
                .original_route_id
                .as_deref()
                .is_some_and(|original| original != result.id() && known.contains(original))
    };
    let (mut retries, primary): (Vec<&ExecutionResult>, Vec<&ExecutionResult>) =
        canonical.iter().partition(|result| is_retry_of_known(*result));

    let flat_steps: Vec<Step> = primary
        .iter()
        .flat_map(|result| result.steps.iter().cloned())
        .collect();
    let mapping = inputs.mapper.map(inputs.viewpoints, &flat_steps);
    let mut unmapped_used = mapping.unmapped_count();

    let mut rows = Vec::with_capacity(flat_steps.len());
    let mut assignments = mapping.assignments.into_iter();
    for result in &primary {
        let mut url = UrlTracker::default();
        for step in &result.steps {
            let assignment = assignments
                .next()
                .unwrap_or(StepAssignment::Unmapped { ordinal: 0 });
            let mut row = base_row(inputs, result, step, url.observe(step));
            match assignment {
                StepAssignment::Mapped(mapped) => {
                    row.traceable_id = mapped_id(&inputs.user_story.id, &mapped);
                    row.function = mapped.function_name.clone();
                    row.viewpoint = mapped.viewpoint_text.clone();
                    row.viewpoint_key =
                        Some((mapped.function_id.clone(), mapped.viewpoint_in_function));
                }
                StepAssignment::Unmapped { ordinal } => {
                    row.traceable_id =
                        unmapped_id(&inputs.user_story.id, ordinal, inputs.bucket_size);
                }
            }
            rows.push(row);
        }
    }

    // Root route of every row, so a later retry can supersede an earlier one.
    let mut origins: Vec<String> = rows.iter().map(|row| row.route_id.clone()).collect();
    retries.sort_by_key(|result| result.timestamp.unwrap_or(DateTime::<Utc>::UNIX_EPOCH));
    for result in retries {
        let original = result.original_route_id.as_deref().unwrap_or_default();
        let executed_at = result.timestamp.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let mut pool: Vec<usize> = (0..rows.len())
            .filter(|idx| origins[*idx] == original)
            .collect();
        let mut url = UrlTracker::default();
        let mut extra = Vec::new();
        for step in &result.steps {
            let mut row = base_row(inputs, result, step, url.observe(step));
            // An older retry never displaces a newer row.
            let inherited = (!step.label.trim().is_empty())
                .then(|| {
                    pool.iter().position(|idx| {
                        let candidate = &rows[*idx];
                        candidate.label == step.label
                            && candidate.executed_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
                                <= executed_at
                    })
                })
                .flatten()
                .map(|pos| pool.remove(pos));
            match inherited {
                Some(idx) => {
                    let source = &rows[idx];
                    row.traceable_id = source.traceable_id.clone();
                    row.function = source.function.clone();
                    row.viewpoint = source.viewpoint.clone();
                    row.viewpoint_key = source.viewpoint_key.clone();
                    rows[idx] = row;
                }
                None => {
                    row.traceable_id =
                        unmapped_id(&inputs.user_story.id, unmapped_used, inputs.bucket_size);
                    unmapped_used += 1;
                    extra.push(row);
                }
            }
        }
        origins.extend(extra.iter().map(|_| original.to_string()));
        rows.extend(extra);
    }

    keep_latest(
        rows,
        RecordKind::ReportRows,
        |row| Some(row.traceable_id.clone()),
        |row| row.executed_at,
    )
}

fn base_row(
    inputs: &RowInputs<'_>,
    result: &ExecutionResult,
    step: &Step,
    url: String,
) -> ReportRow {
    let execution_type = if result.is_fixed_route {
        ExecutionType::FixedRouteRerun
    } else if inputs.runs_per_route.get(result.id()).copied().unwrap_or(0) > 1 {
        ExecutionType::Rerun
    } else {
        ExecutionType::Initial
    };
    let error_detail = step.error.clone().unwrap_or_default();
    let error_category = (step.status == Some(StepStatus::Failed))
        .then(|| classify_error(&error_detail));
    ReportRow {
        executed_at: result.timestamp,
        traceable_id: String::new(),
        user_story: inputs
            .user_story
            .text
            .clone()
            .unwrap_or_else(|| inputs.user_story.id.clone()),
        function: UNMAPPED_FUNCTION.to_string(),
        viewpoint: UNMAPPED_VIEWPOINT.to_string(),
        test_steps: step.steps_text(),
        status: step.status,
        error_detail,
        url,
        execution_type,
        route_id: result.id().to_string(),
        original_route_id: result.original_route_id.clone(),
        error_category,
        label: step.label.clone(),
        viewpoint_key: None,
    }
}

/// Tracks the page a step runs on: the target of the latest load step.
#[derive(Debug, Default)]
struct UrlTracker {
    current: String,
}

impl UrlTracker {
    fn observe(&mut self, step: &Step) -> String {
        if step.action_kind() == ActionKind::Load && !step.target.trim().is_empty() {
            self.current = step.target.trim().to_string();
        }
        self.current.clone()
    }
}

#[cfg(test)]
#[path = "rows_tests.rs"]
mod tests;
