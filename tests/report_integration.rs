mod common;

use common::{result, ArtifactFixture};
use std::collections::HashSet;

const HEADER: [&str; 10] = [
    "実行日時",
    "ID",
    "ユーザーストーリー",
    "機能",
    "観点",
    "テスト手順",
    "実行結果",
    "エラー詳細",
    "URL",
    "実行種別",
];

fn seeded_fixture() -> ArtifactFixture {
    let fixture = ArtifactFixture::default();
    fixture.write_viewpoints();
    fixture.write_json(
        "result_route_1_a.json",
        &result(
            "route_1",
            "2024-05-01T10:00:00Z",
            &[
                ("open", "goto", "https://example.test/signup", "success"),
                ("email", "fill", "#email", "success"),
                ("password", "fill", "#password", "failed"),
                ("submit", "click", "#submit", "skipped"),
            ],
        ),
    );
    fixture.write_json(
        "result_route_1_b.json",
        &result(
            "route_1",
            "2024-05-01T10:10:00Z",
            &[
                ("open", "goto", "https://example.test/signup", "success"),
                ("email", "fill", "#email", "success"),
                ("password", "fill", "#password", "success"),
                ("submit", "click", "#submit", "success"),
            ],
        ),
    );
    fixture.write_json(
        "result_route_2.json",
        &result(
            "route_2",
            "2024-05-01T10:05:00Z",
            &[
                ("open", "goto", "https://example.test/done", "success"),
                ("check", "assertVisible", "h1.done", "failed"),
            ],
        ),
    );
    fixture
}

#[test]
fn report_writes_deduplicated_traceable_csv() {
    let fixture = seeded_fixture();
    let output = fixture.run_report(&[]);
    assert!(
        output.status.success(),
        "failed steps still exit 0: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let records = fixture.report_records();
    assert_eq!(records[0], HEADER);
    let rows = &records[1..];
    assert_eq!(rows.len(), 6, "latest route_1 run plus route_2");

    let ids: HashSet<&str> = rows.iter().map(|row| row[1].as_str()).collect();
    assert_eq!(ids.len(), rows.len(), "traceable ids are unique");
    assert!(rows.iter().all(|row| row[1].starts_with("5.")));
    assert!(rows.iter().all(|row| row[2] == "User Story 5: 会員登録"));

    let route_1: Vec<&Vec<String>> = rows
        .iter()
        .filter(|row| row[0] == "2024-05-01 10:10:00")
        .collect();
    assert_eq!(route_1.len(), 4);
    assert!(route_1.iter().all(|row| row[6] == "成功" && row[9] == "再実行"));
    assert!(rows.iter().all(|row| row[0] != "2024-05-01 10:00:00"));

    let failed: Vec<&Vec<String>> = rows.iter().filter(|row| row[6] == "失敗").collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0][7], "Timeout 5000ms exceeded");
    assert_eq!(failed[0][8], "https://example.test/done");
    assert_eq!(failed[0][9], "初回実行");

    let document = fixture.report_document();
    assert_eq!(document["user_story"]["id"], "5");
    assert_eq!(document["row_count"], 6);
    assert_eq!(document["fallback"], false);
    let coverage = &document["coverage"];
    assert_eq!(coverage["total_viewpoints"], 4);
    assert_eq!(coverage["executed_routes"], 2);
    assert_eq!(coverage["successful_routes"], 1);
    let success = coverage["success_coverage"].as_f64().expect("success coverage");
    let gap = coverage["coverage_gap"].as_f64().expect("coverage gap");
    assert!((success + gap - 100.0).abs() < 1e-9);
    let failures = document["failures"].as_array().expect("failures array");
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["error_category"], "timeout_error");

    assert!(fixture.latest_output("coverage_", "csv").is_file());
    assert!(fixture.latest_output("report_", "html").is_file());
    assert!(fixture.reports().join("run_history.json").is_file());
    assert!(!fixture.reports().join(".txns").exists());
}

#[test]
fn second_run_within_window_raises_advisory() {
    let fixture = seeded_fixture();
    let first = fixture.run_report(&[]);
    assert!(first.status.success());
    assert!(!String::from_utf8_lossy(&first.stderr).contains("likely duplicate"));

    let second = fixture.run_report(&[]);
    assert!(second.status.success(), "advisories are never fatal");
    assert!(String::from_utf8_lossy(&second.stderr).contains("likely duplicate"));
    let document = fixture.report_document();
    let advisories = document["advisories"].as_array().expect("advisories");
    assert_eq!(advisories.len(), 2);

    let skipped = fixture.run_report(&["--skip-duplicate-check"]);
    assert!(skipped.status.success());
    let document = fixture.report_document();
    assert!(document["advisories"]
        .as_array()
        .expect("advisories")
        .is_empty());
}

#[test]
fn missing_results_fail_without_output() {
    let fixture = ArtifactFixture::default();
    fixture.write_viewpoints();
    let output = fixture.run_report(&[]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no execution result files"));
    assert!(!fixture.reports().exists());
}

#[test]
fn malformed_result_aborts_the_request() {
    let fixture = seeded_fixture();
    fixture.write_raw("result_broken.json", "{\"route_id\": \"route_9\", \"steps\": [");
    let output = fixture.run_report(&[]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("parse execution result"));
    assert!(!fixture.reports().exists());
}

#[test]
fn malformed_viewpoints_degrade_to_a_fallback_report() {
    let fixture = seeded_fixture();
    fixture.write_raw("viewpoints.json", "{\"points\": [");
    let output = fixture.run_report(&[]);
    assert!(
        output.status.success(),
        "optional artifacts never abort: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("viewpoints.json"));

    let records = fixture.report_records();
    assert_eq!(records.len(), 7);
    assert!(records[1..].iter().all(|row| row[1].contains(".X.")));

    let document = fixture.report_document();
    assert_eq!(document["fallback"], true);
    let warnings = document["warnings"].as_array().expect("warnings");
    assert!(warnings
        .iter()
        .any(|warning| warning.as_str().is_some_and(|text| text.contains("viewpoints.json"))));
}

#[test]
fn report_without_viewpoints_falls_back_to_unmapped_rows() {
    let fixture = ArtifactFixture::default();
    fixture.write_json(
        "result_route_1.json",
        &result(
            "route_1",
            "2024-05-01T10:00:00Z",
            &[
                ("open", "goto", "https://example.test/", "success"),
                ("go", "click", "#go", "success"),
                ("done", "assertVisible", "h1", "success"),
                ("more", "click", "#more", "success"),
            ],
        ),
    );
    let output = fixture.run_report(&["--user-story", "8"]);
    assert!(output.status.success());

    let records = fixture.report_records();
    let ids: Vec<&str> = records[1..].iter().map(|row| row[1].as_str()).collect();
    assert_eq!(ids, vec!["8.X.1-1", "8.X.1-2", "8.X.1-3", "8.X.2-1"]);
    assert!(records[1..].iter().all(|row| row[3] == "未分類"));

    let document = fixture.report_document();
    assert_eq!(document["fallback"], true);
    assert_eq!(document["unmapped_rows"], 4);
    assert_eq!(document["coverage"]["route_source"], "fallback:results");
    assert!(!document["warnings"]
        .as_array()
        .expect("warnings")
        .is_empty());
}

#[test]
fn coverage_prints_snapshot_without_writing() {
    let fixture = seeded_fixture();
    let root = fixture.root().to_string_lossy().to_string();
    let output = fixture.run(&["coverage", "--artifacts", root.as_str(), "--json"]);
    assert!(output.status.success());
    let snapshot: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("parse coverage JSON");
    assert_eq!(snapshot["total_viewpoints"], 4);
    assert_eq!(snapshot["test_case_source"], "fallback:viewpoints");
    assert!(!fixture.reports().exists());
}

#[test]
fn init_writes_config_once() {
    let fixture = ArtifactFixture::default();
    let root = fixture.root().to_string_lossy().to_string();
    let first = fixture.run(&["init", "--artifacts", root.as_str()]);
    assert!(first.status.success());
    let config_path = fixture.root().join("trace_report.json");
    let config: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&config_path).expect("read config"))
            .expect("parse config");
    assert_eq!(config["debounce_minutes"], 30);
    assert_eq!(config["unmapped_bucket_size"], 3);

    let again = fixture.run(&["init", "--artifacts", root.as_str()]);
    assert!(!again.status.success());
    let forced = fixture.run(&["init", "--artifacts", root.as_str(), "--force"]);
    assert!(forced.status.success());
}

#[test]
fn triage_ranks_suggestions_for_one_error() {
    let fixture = ArtifactFixture::default();
    let output = fixture.run(&[
        "triage",
        "--error",
        "Timeout 30000ms exceeded waiting for selector",
        "--target",
        "#submit",
        "--json",
    ]);
    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("parse triage JSON");
    assert_eq!(value["error_category"], "timeout_error");
    let suggestions = value["suggestions"].as_array().expect("suggestions");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0]["type"], "increase_timeout");
}
