//! Multi-denominator coverage metrics.
//!
//! Each rate measures a different funnel stage (generation, automation,
//! feasibility, execution) and keeps its own denominator. Percentages are
//! rounded to one decimal, clamped to `[0, 100]`, and zero on an empty
//! denominator.
mod rows;

pub use rows::{coverage_rows, CoverageRow};

use crate::artifacts::{ExecutionResult, Route, StepStatus, TestCase};
use crate::config::ReportConfig;
use crate::mapping::ClassifiedViewpoint;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

pub const COVERAGE_SCHEMA_VERSION: u32 = 1;

/// Score and success thresholds used by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageThresholds {
    pub feasible: f64,
    pub low_feasibility: f64,
    pub route_success: f64,
}

impl Default for CoverageThresholds {
    fn default() -> Self {
        Self {
            feasible: 0.7,
            low_feasibility: 0.3,
            route_success: 0.9,
        }
    }
}

impl From<&ReportConfig> for CoverageThresholds {
    fn from(config: &ReportConfig) -> Self {
        Self {
            feasible: config.feasible_threshold,
            low_feasibility: config.low_feasibility_threshold,
            route_success: config.route_success_threshold,
        }
    }
}

/// Outcome of one mapped report row, keyed by its viewpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub function_id: String,
    pub viewpoint_in_function: usize,
    pub status: Option<StepStatus>,
}

/// Everything the aggregator reads. `results` must already be canonical
/// (one per route id).
#[derive(Debug, Clone, Copy)]
pub struct CoverageInputs<'a> {
    pub viewpoints: &'a [ClassifiedViewpoint],
    pub test_cases: Option<&'a [TestCase]>,
    pub routes: &'a [Route],
    pub results: &'a [ExecutionResult],
    pub outcomes: &'a [StepOutcome],
}

/// Immutable coverage snapshot for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageSnapshot {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub total_viewpoints: usize,
    pub generated_test_cases: usize,
    pub total_test_cases: usize,
    pub test_case_source: String,
    pub automated_routes: usize,
    pub route_source: String,
    pub feasible_routes: usize,
    pub low_feasibility_routes: usize,
    pub unscored_routes: usize,
    pub executed_routes: usize,
    pub successful_routes: usize,
    pub total_executed_steps: usize,
    pub successful_steps: usize,
    pub failed_steps: usize,
    pub skipped_steps: usize,
    pub successful_viewpoints: usize,
    pub successful_test_cases: usize,
    pub generation_efficiency: f64,
    pub automation_rate: f64,
    pub feasibility_rate: f64,
    pub step_success_rate: f64,
    pub route_success_rate: f64,
    pub success_coverage: f64,
    pub coverage_gap: f64,
    pub quality_score: f64,
    pub functions: Vec<FunctionCoverage>,
}

/// Per-function breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCoverage {
    pub function_id: String,
    pub function_name: String,
    pub viewpoints: usize,
    pub successful_viewpoints: usize,
    pub mapped_steps: usize,
    pub successful_steps: usize,
    pub failed_steps: usize,
    pub success_rate: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct ViewpointTally {
    mapped: usize,
    succeeded: usize,
    failed: usize,
}

impl ViewpointTally {
    fn is_successful(&self) -> bool {
        self.succeeded > 0 && self.failed == 0
    }
}

/// Compute the coverage snapshot.
pub fn aggregate(
    inputs: CoverageInputs<'_>,
    thresholds: CoverageThresholds,
    generated_at: DateTime<Utc>,
) -> CoverageSnapshot {
    let total_viewpoints = inputs.viewpoints.len();

    let (generated_test_cases, total_test_cases, test_case_source) = match inputs.test_cases {
        Some(cases) => (cases.len(), cases.len(), "test_cases"),
        None => (0, total_viewpoints, "fallback:viewpoints"),
    };

    let routes = route_counts(inputs.routes, inputs.results, thresholds);

    let mut steps = StepTotals::default();
    let mut successful_routes = 0;
    for result in inputs.results {
        let counts = result.step_counts();
        steps.total += counts.total;
        steps.succeeded += counts.succeeded;
        steps.failed += counts.failed;
        steps.skipped += counts.skipped;
        if counts.failed == 0 || counts.success_rate() >= thresholds.route_success {
            successful_routes += 1;
        }
    }
    let executed_routes = inputs.results.len();

    let tallies = tally_viewpoints(inputs.outcomes);
    let successful_texts: HashSet<&str> = inputs
        .viewpoints
        .iter()
        .filter(|vp| tally_for(&tallies, vp).is_successful())
        .map(|vp| vp.viewpoint.text.trim())
        .collect();
    let successful_viewpoints = inputs
        .viewpoints
        .iter()
        .filter(|vp| tally_for(&tallies, vp).is_successful())
        .count();

    let successful_test_cases = match inputs.test_cases {
        Some(cases) => {
            let known_texts: HashSet<&str> = inputs
                .viewpoints
                .iter()
                .map(|vp| vp.viewpoint.text.trim())
                .collect();
            let mut linked_successes = 0;
            let mut unlinked = 0;
            for case in cases {
                match case.original_viewpoint.as_deref().map(str::trim) {
                    Some(text) if known_texts.contains(text) => {
                        if successful_texts.contains(text) {
                            linked_successes += 1;
                        }
                    }
                    _ => unlinked += 1,
                }
            }
            let inferred = if total_viewpoints == 0 {
                0
            } else {
                unlinked * successful_viewpoints / total_viewpoints
            };
            linked_successes + inferred
        }
        None => successful_viewpoints,
    };

    let generation_efficiency = percentage(generated_test_cases, total_viewpoints);
    let automation_rate = percentage(routes.automated, total_test_cases);
    let feasibility_rate = percentage(routes.feasible, routes.automated);
    let step_success_rate = percentage(steps.succeeded, steps.total);
    let route_success_rate = percentage(successful_routes, executed_routes);
    let success_coverage = percentage(successful_test_cases, total_test_cases);
    let coverage_gap = round_to(100.0 - success_coverage, 1);
    let quality_score = round_to(
        (0.2 * generation_efficiency
            + 0.3 * automation_rate
            + 0.3 * feasibility_rate
            + 0.2 * route_success_rate)
            .clamp(0.0, 100.0),
        2,
    );

    CoverageSnapshot {
        schema_version: COVERAGE_SCHEMA_VERSION,
        generated_at,
        total_viewpoints,
        generated_test_cases,
        total_test_cases,
        test_case_source: test_case_source.to_string(),
        automated_routes: routes.automated,
        route_source: routes.source.to_string(),
        feasible_routes: routes.feasible,
        low_feasibility_routes: routes.low_feasibility,
        unscored_routes: routes.unscored,
        executed_routes,
        successful_routes,
        total_executed_steps: steps.total,
        successful_steps: steps.succeeded,
        failed_steps: steps.failed,
        skipped_steps: steps.skipped,
        successful_viewpoints,
        successful_test_cases,
        generation_efficiency,
        automation_rate,
        feasibility_rate,
        step_success_rate,
        route_success_rate,
        success_coverage,
        coverage_gap,
        quality_score,
        functions: function_breakdown(inputs.viewpoints, &tallies),
    }
}

#[derive(Debug, Default)]
struct StepTotals {
    total: usize,
    succeeded: usize,
    failed: usize,
    skipped: usize,
}

struct RouteCounts {
    automated: usize,
    feasible: usize,
    low_feasibility: usize,
    unscored: usize,
    source: &'static str,
}

fn route_counts(
    routes: &[Route],
    results: &[ExecutionResult],
    thresholds: CoverageThresholds,
) -> RouteCounts {
    if routes.is_empty() {
        // Without route files, every executed route with steps counts as an
        // unscored automated route.
        let executed: BTreeSet<&str> = results
            .iter()
            .filter(|result| !result.steps.is_empty() || result.step_counts().total > 0)
            .map(ExecutionResult::id)
            .collect();
        return RouteCounts {
            automated: executed.len(),
            feasible: executed.len(),
            low_feasibility: 0,
            unscored: executed.len(),
            source: "fallback:results",
        };
    }
    let mut counts = RouteCounts {
        automated: 0,
        feasible: 0,
        low_feasibility: 0,
        unscored: 0,
        source: "routes",
    };
    for route in routes.iter().filter(|route| !route.steps.is_empty()) {
        counts.automated += 1;
        match route.feasibility_score {
            None => {
                counts.unscored += 1;
                counts.feasible += 1;
            }
            Some(score) if score >= thresholds.feasible => counts.feasible += 1,
            Some(score) if score >= thresholds.low_feasibility => counts.low_feasibility += 1,
            Some(_) => {}
        }
    }
    counts
}

fn tally_viewpoints(outcomes: &[StepOutcome]) -> HashMap<(String, usize), ViewpointTally> {
    let mut tallies: HashMap<(String, usize), ViewpointTally> = HashMap::new();
    for outcome in outcomes {
        let tally = tallies
            .entry((outcome.function_id.clone(), outcome.viewpoint_in_function))
            .or_default();
        tally.mapped += 1;
        match outcome.status {
            Some(StepStatus::Success) => tally.succeeded += 1,
            Some(StepStatus::Failed) => tally.failed += 1,
            _ => {}
        }
    }
    tallies
}

fn tally_for(
    tallies: &HashMap<(String, usize), ViewpointTally>,
    viewpoint: &ClassifiedViewpoint,
) -> ViewpointTally {
    tallies
        .get(&(viewpoint.function_id.clone(), viewpoint.position))
        .copied()
        .unwrap_or_default()
}

fn function_breakdown(
    viewpoints: &[ClassifiedViewpoint],
    tallies: &HashMap<(String, usize), ViewpointTally>,
) -> Vec<FunctionCoverage> {
    let mut ordered: Vec<&ClassifiedViewpoint> = viewpoints.iter().collect();
    ordered.sort_by_key(|vp| vp.order);
    let mut functions: Vec<FunctionCoverage> = Vec::new();
    for viewpoint in ordered {
        let tally = tally_for(tallies, viewpoint);
        if !matches!(functions.last(), Some(last) if last.function_id == viewpoint.function_id) {
            functions.push(FunctionCoverage {
                function_id: viewpoint.function_id.clone(),
                function_name: viewpoint.category.display_name().to_string(),
                viewpoints: 0,
                successful_viewpoints: 0,
                mapped_steps: 0,
                successful_steps: 0,
                failed_steps: 0,
                success_rate: 0.0,
            });
        }
        if let Some(entry) = functions.last_mut() {
            entry.viewpoints += 1;
            entry.successful_viewpoints += usize::from(tally.is_successful());
            entry.mapped_steps += tally.mapped;
            entry.successful_steps += tally.succeeded;
            entry.failed_steps += tally.failed;
        }
    }
    for entry in &mut functions {
        entry.success_rate = percentage(entry.successful_steps, entry.mapped_steps);
    }
    functions
}

/// `numerator / denominator × 100`, rounded to one decimal and clamped.
pub fn percentage(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let raw = numerator as f64 / denominator as f64 * 100.0;
    round_to(raw.clamp(0.0, 100.0), 1)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
#[path = "coverage_tests.rs"]
mod tests;
