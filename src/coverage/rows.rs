use super::CoverageSnapshot;
use serde::Serialize;

/// Flat coverage record for CSV consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageRow {
    pub category: String,
    pub metric: String,
    pub value: Option<usize>,
    pub percentage: Option<f64>,
    pub note: String,
}

fn row(
    category: &str,
    metric: &str,
    value: Option<usize>,
    percentage: Option<f64>,
    note: impl Into<String>,
) -> CoverageRow {
    CoverageRow {
        category: category.to_string(),
        metric: metric.to_string(),
        value,
        percentage,
        note: note.into(),
    }
}

/// Flatten a snapshot into `{category, metric, value, percentage, note}` rows.
pub fn coverage_rows(snapshot: &CoverageSnapshot) -> Vec<CoverageRow> {
    let mut rows = vec![
        row(
            "generation",
            "total_viewpoints",
            Some(snapshot.total_viewpoints),
            None,
            "",
        ),
        row(
            "generation",
            "generation_efficiency",
            Some(snapshot.generated_test_cases),
            Some(snapshot.generation_efficiency),
            "generated_test_cases / total_viewpoints",
        ),
        row(
            "automation",
            "automation_rate",
            Some(snapshot.automated_routes),
            Some(snapshot.automation_rate),
            format!(
                "automated_routes / total_test_cases ({}; routes from {})",
                snapshot.test_case_source, snapshot.route_source
            ),
        ),
        row(
            "automation",
            "feasibility_rate",
            Some(snapshot.feasible_routes),
            Some(snapshot.feasibility_rate),
            format!(
                "feasible_routes / automated_routes (unscored={})",
                snapshot.unscored_routes
            ),
        ),
        row(
            "automation",
            "low_feasibility_routes",
            Some(snapshot.low_feasibility_routes),
            None,
            "",
        ),
        row(
            "execution",
            "step_success_rate",
            Some(snapshot.successful_steps),
            Some(snapshot.step_success_rate),
            format!(
                "successful_steps / total_executed_steps ({} of {}; failed={} skipped={})",
                snapshot.successful_steps,
                snapshot.total_executed_steps,
                snapshot.failed_steps,
                snapshot.skipped_steps
            ),
        ),
        row(
            "execution",
            "route_success_rate",
            Some(snapshot.successful_routes),
            Some(snapshot.route_success_rate),
            format!(
                "successful_routes / executed_routes ({} of {})",
                snapshot.successful_routes, snapshot.executed_routes
            ),
        ),
        row(
            "coverage",
            "success_coverage",
            Some(snapshot.successful_test_cases),
            Some(snapshot.success_coverage),
            format!(
                "successful_test_cases / total_test_cases ({})",
                snapshot.test_case_source
            ),
        ),
        row(
            "coverage",
            "coverage_gap",
            Some(
                snapshot
                    .total_test_cases
                    .saturating_sub(snapshot.successful_test_cases),
            ),
            Some(snapshot.coverage_gap),
            "100 - success_coverage",
        ),
        row(
            "quality",
            "quality_score",
            None,
            Some(snapshot.quality_score),
            "0.2*generation + 0.3*automation + 0.3*feasibility + 0.2*route_success",
        ),
    ];
    for function in &snapshot.functions {
        rows.push(row(
            &format!("function:{}", function.function_id),
            "step_success_rate",
            Some(function.successful_steps),
            Some(function.success_rate),
            format!(
                "{} viewpoints={} successful_viewpoints={} mapped_steps={} failed_steps={}",
                function.function_name,
                function.viewpoints,
                function.successful_viewpoints,
                function.mapped_steps,
                function.failed_steps
            ),
        ));
    }
    rows
}
