//! The report pipeline over a loaded artifact set.
//!
//! Pure with respect to the filesystem: everything here works on parsed
//! artifacts so `report` and `coverage` share one code path.
use crate::artifacts::{ArtifactSet, ExecutionResult, Route};
use crate::config::ReportConfig;
use crate::coverage::{aggregate, CoverageInputs, CoverageSnapshot, CoverageThresholds, StepOutcome};
use crate::dedup::{keep_latest, RecordKind};
use crate::failures::{collect_failures, FailureDetail};
use crate::functions::{FunctionClassifier, FunctionRegistry};
use crate::mapping::{
    classify_viewpoints, resolve_user_story, KeywordRefinedMapper, PositionalMapper,
    StepViewpointMapper, UserStory,
};
use crate::report::{build_rows, ReportRow, RowInputs};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Result of one engine pass.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub user_story: UserStory,
    pub rows: Vec<ReportRow>,
    pub coverage: CoverageSnapshot,
    pub failures: Vec<FailureDetail>,
    /// One result per route id, the latest run of each.
    pub canonical: Vec<ExecutionResult>,
    /// True when no viewpoints were available and every row is unmapped.
    pub fallback: bool,
    pub warnings: Vec<String>,
}

impl EngineOutput {
    pub fn unmapped_rows(&self) -> usize {
        self.rows.iter().filter(|row| row.is_unmapped()).count()
    }
}

/// Run dedup, mapping, row building, coverage, and failure analysis.
pub fn run_engine(
    set: &ArtifactSet,
    config: &ReportConfig,
    user_story_override: Option<&str>,
    now: DateTime<Utc>,
) -> Result<EngineOutput> {
    if set.results.is_empty() {
        return Err(anyhow!("no execution result files found"));
    }
    let mut warnings = set.warnings.clone();

    let raw_viewpoints = set
        .viewpoints
        .as_ref()
        .map(|file| file.viewpoints.as_slice())
        .unwrap_or_default();
    let fallback = raw_viewpoints.is_empty();
    if fallback {
        let warning = match set.viewpoints_path {
            Some(_) => "viewpoint file lists no viewpoints; every step is reported as unmapped",
            None => "no usable viewpoint file; every step is reported as unmapped",
        };
        tracing::warn!("{warning}");
        warnings.push(warning.to_string());
    }
    if set.test_cases.is_none() {
        tracing::debug!("no test case file; total test cases fall back to viewpoints");
    }
    if set.routes.is_empty() {
        tracing::debug!("no route file; automated routes fall back to executed results");
    }

    let classifier = FunctionClassifier::new(&config.custom_categories);
    let mut registry = FunctionRegistry::default();
    let viewpoints = classify_viewpoints(raw_viewpoints, &classifier, &mut registry);

    let user_story = resolve_user_story(
        user_story_override,
        set.viewpoints
            .as_ref()
            .and_then(|file| file.user_story.as_deref()),
    );

    let all_results: Vec<ExecutionResult> = set.results.clone();
    let mut runs_per_route: HashMap<String, usize> = HashMap::new();
    for result in &all_results {
        *runs_per_route.entry(result.id().to_string()).or_default() += 1;
    }
    let canonical = keep_latest(
        all_results,
        RecordKind::ExecutionResults,
        |result| result.route_id.clone(),
        |result| result.timestamp,
    );

    let mapper: &dyn StepViewpointMapper = if config.keyword_refinement {
        &KeywordRefinedMapper
    } else {
        &PositionalMapper
    };
    let inputs = RowInputs {
        viewpoints: &viewpoints,
        mapper,
        user_story: &user_story,
        bucket_size: config.unmapped_bucket_size,
        runs_per_route: &runs_per_route,
    };
    let rows = build_rows(&inputs, &canonical);
    let outcomes: Vec<StepOutcome> = rows.iter().filter_map(ReportRow::outcome).collect();

    let routes: Vec<Route> = set.routes.iter().map(|loaded| loaded.route.clone()).collect();
    let coverage = aggregate(
        CoverageInputs {
            viewpoints: &viewpoints,
            test_cases: set.test_cases.as_deref(),
            routes: &routes,
            results: &canonical,
            outcomes: &outcomes,
        },
        CoverageThresholds::from(config),
        now,
    );
    let failures = collect_failures(&canonical);

    tracing::info!(
        rows = rows.len(),
        failures = failures.len(),
        routes = canonical.len(),
        "built report"
    );
    Ok(EngineOutput {
        user_story,
        rows,
        coverage,
        failures,
        canonical,
        fallback,
        warnings,
    })
}
