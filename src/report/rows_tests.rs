use super::{build_rows, RowInputs};
use crate::artifacts::{ExecutionResult, Step, StepStatus, Viewpoint};
use crate::dedup::{keep_latest, RecordKind};
use crate::failures::ErrorCategory;
use crate::functions::{FunctionClassifier, FunctionRegistry};
use crate::mapping::{classify_viewpoints, ClassifiedViewpoint, PositionalMapper, UserStory};
use crate::report::{ExecutionType, UNMAPPED_FUNCTION, UNMAPPED_VIEWPOINT};
use chrono::{TimeZone, Utc};
use std::collections::HashMap;

fn step(label: &str, action: &str, target: &str, status: StepStatus) -> Step {
    Step {
        label: label.to_string(),
        action: action.to_string(),
        target: target.to_string(),
        status: Some(status),
        error: (status == StepStatus::Failed).then(|| "Timeout 5000ms exceeded".to_string()),
        ..Step::default()
    }
}

fn result(route_id: &str, at: i64, steps: Vec<Step>) -> ExecutionResult {
    ExecutionResult {
        route_id: Some(route_id.to_string()),
        timestamp: Utc.timestamp_opt(at, 0).single(),
        steps,
        success_count: 0,
        failed_count: 0,
        is_fixed_route: false,
        original_route_id: None,
    }
}

fn classified(count: usize) -> Vec<ClassifiedViewpoint> {
    let raw: Vec<Viewpoint> = (1..=count)
        .map(|n| Viewpoint {
            index: n,
            text: format!("項目{n}を入力できる"),
            category: None,
            priority: None,
        })
        .collect();
    classify_viewpoints(
        &raw,
        &FunctionClassifier::default(),
        &mut FunctionRegistry::default(),
    )
}

fn runs(results: &[ExecutionResult]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for result in results {
        *counts.entry(result.id().to_string()).or_insert(0) += 1;
    }
    counts
}

fn canonical(results: Vec<ExecutionResult>) -> Vec<ExecutionResult> {
    keep_latest(
        results,
        RecordKind::ExecutionResults,
        |r| r.route_id.clone(),
        |r| r.timestamp,
    )
}

#[test]
fn only_the_latest_run_of_a_route_reaches_the_report() {
    let first: Vec<Step> = (0..10)
        .map(|n| step(&format!("s{n}"), "click", "#b", StepStatus::Success))
        .collect();
    let mut second = first.clone();
    second[9] = step("s9", "click", "#b", StepStatus::Failed);
    let all = vec![result("route_1", 100, first), result("route_1", 200, second)];
    let counts = runs(&all);
    let viewpoints = classified(10);
    let story = UserStory::default();
    let inputs = RowInputs {
        viewpoints: &viewpoints,
        mapper: &PositionalMapper,
        user_story: &story,
        bucket_size: 3,
        runs_per_route: &counts,
    };
    let rows = build_rows(&inputs, &canonical(all));
    assert_eq!(rows.len(), 10);
    let t2 = Utc.timestamp_opt(200, 0).single();
    assert!(rows.iter().all(|row| row.executed_at == t2));
    assert!(rows
        .iter()
        .all(|row| row.execution_type == ExecutionType::Rerun));
    assert_eq!(rows[0].traceable_id, "1.B.1-1");
    assert_eq!(rows[9].result_label(), "失敗");
    assert_eq!(rows[9].error_category, Some(ErrorCategory::TimeoutError));
    assert_eq!(rows[0].error_category, None);
}

#[test]
fn fixed_route_supersedes_matching_original_rows() {
    let original = result(
        "route_1",
        100,
        vec![
            step("open", "goto", "https://example.test/form", StepStatus::Success),
            step("name", "fill", "#name", StepStatus::Failed),
            step("send", "click", "#send", StepStatus::Skipped),
        ],
    );
    let mut fixed = result(
        "route_1_fixed",
        300,
        vec![
            step("name", "fill", "#full-name", StepStatus::Success),
            step("confirm", "click", "#confirm", StepStatus::Success),
        ],
    );
    fixed.is_fixed_route = true;
    fixed.original_route_id = Some("route_1".to_string());
    let all = vec![original, fixed];
    let counts = runs(&all);
    let viewpoints = classified(3);
    let story = UserStory {
        id: "4".to_string(),
        text: None,
    };
    let inputs = RowInputs {
        viewpoints: &viewpoints,
        mapper: &PositionalMapper,
        user_story: &story,
        bucket_size: 3,
        runs_per_route: &counts,
    };
    let rows = build_rows(&inputs, &canonical(all));
    let ids: Vec<&str> = rows.iter().map(|row| row.traceable_id.as_str()).collect();
    assert_eq!(ids, vec!["4.B.1-1", "4.B.2-1", "4.B.3-1", "4.X.1-1"]);

    let retried = &rows[1];
    assert_eq!(retried.route_id, "route_1_fixed");
    assert_eq!(retried.status, Some(StepStatus::Success));
    assert_eq!(retried.execution_type, ExecutionType::FixedRouteRerun);
    assert_eq!(retried.viewpoint, "項目2を入力できる");
    assert_eq!(retried.original_route_id.as_deref(), Some("route_1"));

    let extra = &rows[3];
    assert_eq!(extra.function, UNMAPPED_FUNCTION);
    assert_eq!(extra.viewpoint, UNMAPPED_VIEWPOINT);
    assert!(extra.is_unmapped());
    assert_eq!(rows[0].execution_type, ExecutionType::Initial);
}

#[test]
fn older_fixed_route_keeps_its_steps_as_unmapped_rows() {
    let original = result(
        "route_1",
        100,
        vec![
            step("open", "goto", "https://example.test/form", StepStatus::Success),
            step("name", "fill", "#name", StepStatus::Failed),
        ],
    );
    let mut fixed = result(
        "route_1_fixed",
        0,
        vec![step("name", "fill", "#name", StepStatus::Success)],
    );
    fixed.timestamp = None;
    fixed.is_fixed_route = true;
    fixed.original_route_id = Some("route_1".to_string());
    let all = vec![original, fixed];
    let counts = runs(&all);
    let viewpoints = classified(2);
    let story = UserStory {
        id: "1".to_string(),
        text: None,
    };
    let inputs = RowInputs {
        viewpoints: &viewpoints,
        mapper: &PositionalMapper,
        user_story: &story,
        bucket_size: 3,
        runs_per_route: &counts,
    };
    let rows = build_rows(&inputs, &canonical(all));
    let pairs: Vec<(&str, &str)> = rows
        .iter()
        .map(|row| (row.traceable_id.as_str(), row.route_id.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("1.B.1-1", "route_1"),
            ("1.B.2-1", "route_1"),
            ("1.X.1-1", "route_1_fixed"),
        ]
    );
    assert_eq!(rows[1].status, Some(StepStatus::Failed));
}

#[test]
fn later_fixed_route_supersedes_an_earlier_one() {
    let original = result(
        "route_1",
        100,
        vec![step("name", "fill", "#name", StepStatus::Failed)],
    );
    let mut first_fix = result(
        "route_1_fixed",
        200,
        vec![step("name", "fill", "#name", StepStatus::Failed)],
    );
    first_fix.is_fixed_route = true;
    first_fix.original_route_id = Some("route_1".to_string());
    let mut second_fix = result(
        "route_1_fixed_2",
        300,
        vec![step("name", "fill", "#full-name", StepStatus::Success)],
    );
    second_fix.is_fixed_route = true;
    second_fix.original_route_id = Some("route_1".to_string());
    let all = vec![original, second_fix, first_fix];
    let counts = runs(&all);
    let viewpoints = classified(1);
    let story = UserStory {
        id: "3".to_string(),
        text: None,
    };
    let inputs = RowInputs {
        viewpoints: &viewpoints,
        mapper: &PositionalMapper,
        user_story: &story,
        bucket_size: 3,
        runs_per_route: &counts,
    };
    let rows = build_rows(&inputs, &canonical(all));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].traceable_id, "3.B.1-1");
    assert_eq!(rows[0].route_id, "route_1_fixed_2");
    assert_eq!(rows[0].status, Some(StepStatus::Success));
}

#[test]
fn without_viewpoints_every_step_is_an_unmapped_row_with_its_page() {
    let all = vec![
        result(
            "a",
            1,
            vec![
                step("open", "load", "https://example.test/", StepStatus::Success),
                step("click", "click", "#go", StepStatus::Success),
                step("next", "goto", "https://example.test/next", StepStatus::Success),
                step("check", "assertVisible", "h1", StepStatus::Success),
            ],
        ),
        result("b", 2, vec![step("x", "click", "#x", StepStatus::Success)]),
    ];
    let counts = runs(&all);
    let story = UserStory {
        id: "2".to_string(),
        text: Some("User Story 2: 予約".to_string()),
    };
    let inputs = RowInputs {
        viewpoints: &[],
        mapper: &PositionalMapper,
        user_story: &story,
        bucket_size: 3,
        runs_per_route: &counts,
    };
    let rows = build_rows(&inputs, &canonical(all));
    assert_eq!(rows.len(), 5);
    let ids: Vec<&str> = rows.iter().map(|row| row.traceable_id.as_str()).collect();
    assert_eq!(ids, vec!["2.X.1-1", "2.X.1-2", "2.X.1-3", "2.X.2-1", "2.X.2-2"]);
    assert_eq!(rows[1].url, "https://example.test/");
    assert_eq!(rows[3].url, "https://example.test/next");
    assert_eq!(rows[4].url, "");
    assert_eq!(rows[0].user_story, "User Story 2: 予約");
    assert!(rows.iter().all(|row| row.function == UNMAPPED_FUNCTION));
}

#[test]
fn every_canonical_step_becomes_exactly_one_row() {
    for viewpoint_count in 0..5 {
        let all: Vec<ExecutionResult> = (0..3)
            .map(|route| {
                let steps = (0..route + 2)
                    .map(|n| step(&format!("r{route}s{n}"), "click", "#b", StepStatus::Success))
                    .collect();
                result(&format!("route_{route}"), route as i64, steps)
            })
            .collect();
        let total_steps: usize = all.iter().map(|r| r.steps.len()).sum();
        let counts = runs(&all);
        let viewpoints = classified(viewpoint_count);
        let story = UserStory::default();
        let inputs = RowInputs {
            viewpoints: &viewpoints,
            mapper: &PositionalMapper,
            user_story: &story,
            bucket_size: 2,
            runs_per_route: &counts,
        };
        let rows = build_rows(&inputs, &canonical(all));
        assert_eq!(rows.len(), total_steps, "{viewpoint_count} viewpoints");
    }
}
