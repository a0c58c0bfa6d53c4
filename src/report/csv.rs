use super::ReportRow;
use crate::coverage::CoverageRow;
use anyhow::{Context, Result};
use csv::{QuoteStyle, Terminator, WriterBuilder};

pub const REPORT_HEADER: &[&str] = &[
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
pub const EXTENDED_HEADER: &[&str] = &["ルートID", "元ルートID", "エラー分類"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const EXECUTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn writer() -> csv::Writer<Vec<u8>> {
    WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::CRLF)
        .from_writer(UTF8_BOM.to_vec())
}

/// Render the report CSV (UTF-8 with BOM, CRLF line endings).
pub fn report_csv(rows: &[ReportRow], extended: bool) -> Result<Vec<u8>> {
    let mut writer = writer();
    let mut header: Vec<&str> = REPORT_HEADER.to_vec();
    if extended {
        header.extend_from_slice(EXTENDED_HEADER);
    }
    writer.write_record(&header).context("write report header")?;
    for row in rows {
        let mut record = vec![
            row.executed_at
                .map(|at| at.format(EXECUTED_AT_FORMAT).to_string())
                .unwrap_or_default(),
            row.traceable_id.clone(),
            row.user_story.clone(),
            row.function.clone(),
            row.viewpoint.clone(),
            row.test_steps.clone(),
            row.result_label().to_string(),
            row.error_detail.clone(),
            row.url.clone(),
            row.execution_type.label().to_string(),
        ];
        if extended {
            record.push(row.route_id.clone());
            record.push(row.original_route_id.clone().unwrap_or_default());
            record.push(
                row.error_category
                    .map(|category| category.as_str().to_string())
                    .unwrap_or_default(),
            );
        }
        writer
            .write_record(&record)
            .with_context(|| format!("write report row {}", row.traceable_id))?;
    }
    writer
        .into_inner()
        .map_err(|err| err.into_error())
        .context("flush report CSV")
}

/// Render the flat coverage CSV.
pub fn coverage_csv(rows: &[CoverageRow]) -> Result<Vec<u8>> {
    let mut writer = writer();
    writer
        .write_record(["category", "metric", "value", "percentage", "note"])
        .context("write coverage header")?;
    for row in rows {
        writer
            .write_record([
                row.category.clone(),
                row.metric.clone(),
                row.value.map(|value| value.to_string()).unwrap_or_default(),
                row.percentage
                    .map(|percentage| format!("{percentage:.1}"))
                    .unwrap_or_default(),
                row.note.clone(),
            ])
            .with_context(|| format!("write coverage row {}", row.metric))?;
    }
    writer
        .into_inner()
        .map_err(|err| err.into_error())
        .context("flush coverage CSV")
}
