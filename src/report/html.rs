use super::ReportDocument;
use crate::failures::group_by_category;
use std::fmt::Write;

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

const STYLE: &str = "body{font-family:sans-serif;margin:2em;color:#222}\
table{border-collapse:collapse;margin-bottom:1.5em}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:left;vertical-align:top}\
th{background:#f3f3f3}.advisory{background:#fff6d6;padding:8px;margin:4px 0}\
.confidence{color:#666}";

/// Render the static HTML report: coverage summary, per-function breakdown,
/// duplicate-run advisories, and failures grouped by category.
pub fn render_html(document: &ReportDocument) -> String {
    let coverage = &document.coverage;
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"ja\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(
        html,
        "<title>テスト実行レポート {}</title>\n<style>{STYLE}</style>\n</head>\n<body>",
        escape_html(&document.run_stamp)
    );
    let _ = writeln!(
        html,
        "<h1>テスト実行レポート</h1>\n<p>生成日時: {} / ユーザーストーリー: {} / 行数: {} (未対応 {})</p>",
        document.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        escape_html(document.user_story.text.as_deref().unwrap_or(&document.user_story.id)),
        document.row_count,
        document.unmapped_rows
    );
    if document.fallback {
        html.push_str("<p class=\"advisory\">観点ファイルがないため、全ステップを未対応として出力しました。</p>\n");
    }

    html.push_str("<h2>カバレッジ</h2>\n<table>\n<tr><th>指標</th><th>値</th></tr>\n");
    let metrics = [
        ("生成効率", coverage.generation_efficiency, "%"),
        ("自動化率", coverage.automation_rate, "%"),
        ("実行可能率", coverage.feasibility_rate, "%"),
        ("ステップ成功率", coverage.step_success_rate, "%"),
        ("ルート成功率", coverage.route_success_rate, "%"),
        ("成功カバレッジ", coverage.success_coverage, "%"),
        ("カバレッジギャップ", coverage.coverage_gap, "%"),
        ("品質スコア", coverage.quality_score, ""),
    ];
    for (label, value, unit) in metrics {
        let _ = writeln!(html, "<tr><td>{label}</td><td>{value}{unit}</td></tr>");
    }
    html.push_str("</table>\n");

    if !coverage.functions.is_empty() {
        html.push_str(
            "<h2>機能別</h2>\n<table>\n<tr><th>ID</th><th>機能</th><th>観点数</th>\
             <th>成功観点</th><th>ステップ</th><th>失敗</th><th>成功率</th></tr>\n",
        );
        for function in &coverage.functions {
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}%</td></tr>",
                escape_html(&function.function_id),
                escape_html(&function.function_name),
                function.viewpoints,
                function.successful_viewpoints,
                function.mapped_steps,
                function.failed_steps,
                function.success_rate
            );
        }
        html.push_str("</table>\n");
    }

    if !document.advisories.is_empty() {
        html.push_str("<h2>重複実行の警告</h2>\n");
        for advisory in &document.advisories {
            let _ = writeln!(
                html,
                "<p class=\"advisory\">{}</p>",
                escape_html(&advisory.message)
            );
        }
    }
    if !document.warnings.is_empty() {
        html.push_str("<h2>警告</h2>\n<ul>\n");
        for warning in &document.warnings {
            let _ = writeln!(html, "<li>{}</li>", escape_html(warning));
        }
        html.push_str("</ul>\n");
    }

    html.push_str("<h2>失敗分析</h2>\n");
    let groups = group_by_category(&document.failures);
    if groups.is_empty() {
        html.push_str("<p>失敗したステップはありません。</p>\n");
    }
    for (category, failures) in groups {
        let _ = writeln!(
            html,
            "<h3 id=\"{}\">{} ({})</h3>\n<table>\n<tr><th>ルート</th><th>ステップ</th><th>エラー</th><th>修正候補</th></tr>",
            category.as_str(),
            escape_html(category.title()),
            failures.len()
        );
        for failure in failures {
            let mut suggestions = String::from("<ol>");
            for suggestion in &failure.fix_suggestions {
                let _ = write!(
                    suggestions,
                    "<li>{} <span class=\"confidence\">[{} {:.2}]</span>",
                    escape_html(&suggestion.message),
                    suggestion.kind.as_str(),
                    suggestion.confidence
                );
                if let Some(target) = suggestion.new_target.as_deref() {
                    let _ = write!(suggestions, " → <code>{}</code>", escape_html(target));
                }
                if let Some(action) = suggestion.new_action.as_deref() {
                    let _ = write!(suggestions, " → <code>{}</code>", escape_html(action));
                }
                suggestions.push_str("</li>");
            }
            suggestions.push_str("</ol>");
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}: {} {}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&failure.route_id),
                escape_html(&failure.label),
                escape_html(&failure.action),
                escape_html(&failure.target),
                escape_html(&failure.error),
                suggestions
            );
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{aggregate, CoverageInputs, CoverageThresholds};
    use crate::failures::{classify_error, suggest, FailureDetail};
    use crate::artifacts::Step;
    use crate::mapping::UserStory;
    use chrono::{TimeZone, Utc};

    fn document(failures: Vec<FailureDetail>) -> ReportDocument {
        let generated_at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let coverage = aggregate(
            CoverageInputs {
                viewpoints: &[],
                test_cases: None,
                routes: &[],
                results: &[],
                outcomes: &[],
            },
            CoverageThresholds::default(),
            generated_at,
        );
        ReportDocument {
            schema_version: 1,
            run_stamp: "20240501_000000".to_string(),
            generated_at,
            artifacts: "artifacts".to_string(),
            inputs_hash: "abc".to_string(),
            user_story: UserStory::default(),
            row_count: 0,
            unmapped_rows: 0,
            fallback: false,
            coverage,
            failures,
            advisories: Vec::new(),
            warnings: vec!["<script>alert(1)</script>".to_string()],
        }
    }

    fn failure(error: &str, target: &str) -> FailureDetail {
        let step = Step {
            label: "email".to_string(),
            action: "fill".to_string(),
            target: target.to_string(),
            error: Some(error.to_string()),
            ..Step::default()
        };
        let category = classify_error(error);
        FailureDetail {
            label: step.label.clone(),
            action: step.action.clone(),
            target: step.target.clone(),
            value: None,
            error: error.to_string(),
            error_category: category,
            fix_suggestions: suggest(&step, category),
            route_id: "route_1".to_string(),
            timestamp: None,
        }
    }

    #[test]
    fn escape_html_replaces_markup_characters() {
        assert_eq!(
            escape_html("<a href=\"x\">Tom & 'Jerry'</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn failures_are_grouped_with_ranked_suggestions() {
        let html = render_html(&document(vec![
            failure("Timeout 5000ms exceeded", "#email"),
            failure("locator resolved to 0 elements", "[name=\"email\"]"),
        ]));
        assert!(html.contains("id=\"timeout_error\""));
        assert!(html.contains("id=\"element_not_found\""));
        let timeout = html.find("id=\"timeout_error\"").expect("timeout group");
        let not_found = html.find("id=\"element_not_found\"").expect("not found group");
        assert!(timeout < not_found);
        assert!(html.contains("<code>#email</code>"));
        assert!(html.contains("update_selector 0.80"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn empty_failures_render_placeholder() {
        let html = render_html(&document(Vec::new()));
        assert!(html.contains("失敗したステップはありません"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }
}
