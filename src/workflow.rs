use crate::artifacts::{discover_artifacts, load_artifacts, ArtifactSet, DiscoveredArtifacts, Step};
use crate::cli::{CoverageArgs, InitArgs, ReportArgs, TriageArgs};
use crate::config::{default_config, resolve_config, write_config, ReportConfig};
use crate::coverage::coverage_rows;
use crate::engine::{run_engine, EngineOutput};
use crate::failures::{classify_error, suggest};
use crate::history::{
    load_history, route_identities, run_remediation, write_history, DuplicateAdvisory, RunHistory,
};
use crate::paths::{ArtifactPaths, OutputPaths};
use crate::report::{coverage_csv, render_html, report_csv, ReportDocument, REPORT_SCHEMA_VERSION};
use crate::staging::{ensure_output_root, Staging};
use crate::util::{display_path, hash_files, run_stamp};
use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use std::path::{Path, PathBuf};

pub fn run_init(args: InitArgs) -> Result<()> {
    let root = artifact_root(&args.artifacts)?;
    let paths = ArtifactPaths::new(root);
    let config_path = paths.config_path();
    if config_path.is_file() && !args.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            config_path.display()
        ));
    }
    write_config(&config_path, &default_config())?;
    println!("wrote {}", config_path.display());
    Ok(())
}

/// Build and publish the report for one artifact directory.
///
/// Nothing is written unless every input parsed; the run history is
/// updated after the outputs are published.
pub fn run_report(args: ReportArgs) -> Result<()> {
    let root = artifact_root(&args.artifacts)?;
    let paths = ArtifactPaths::new(root);
    let config = resolve_config(&paths, args.config.as_deref())?;
    let (discovered, set) = load_inputs(&paths, &config)?;
    let now = Utc::now();
    let output = run_engine(&set, &config, args.user_story.as_deref(), now)?;

    let out = paths.output_paths(&config.output_dir, args.out.as_deref());
    ensure_output_root(out.root())?;
    let history_path = out.history_path();
    let identities = route_identities(paths.root(), &set.routes);
    let mut warnings = output.warnings.clone();
    let mut history = match load_history(&history_path) {
        Ok(history) => history,
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "ignoring unreadable run history");
            warnings.push(format!("ignoring unreadable run history: {err:#}"));
            RunHistory::default()
        }
    };

    let advisories = if args.skip_duplicate_check {
        tracing::info!("duplicate-run check skipped");
        Vec::new()
    } else {
        history.detect_duplicates(
            &output.canonical,
            &identities,
            Duration::minutes(config.debounce_minutes),
            now,
        )
    };
    for advisory in &advisories {
        tracing::warn!(
            route_id = advisory.route_id.as_str(),
            minutes_apart = advisory.minutes_apart,
            "likely duplicate run"
        );
    }
    if args.auto_remediate {
        match config.remediation_command.as_deref() {
            Some(command) => warnings.extend(run_remediation(command, &advisories)),
            None => {
                tracing::warn!("--auto-remediate given without remediation_command");
                warnings.push("--auto-remediate given but remediation_command is not configured".to_string());
            }
        }
    }

    let stamp = run_stamp(now);
    let document = ReportDocument {
        schema_version: REPORT_SCHEMA_VERSION,
        run_stamp: stamp.clone(),
        generated_at: now,
        artifacts: paths.root().display().to_string(),
        inputs_hash: hash_files(paths.root(), &discovered.all_paths())?,
        user_story: output.user_story.clone(),
        row_count: output.rows.len(),
        unmapped_rows: output.unmapped_rows(),
        fallback: output.fallback,
        coverage: output.coverage.clone(),
        failures: output.failures.clone(),
        advisories: advisories.clone(),
        warnings,
    };

    let published = publish_outputs(&out, &stamp, &config, &output, &document)?;
    history.record(&output.canonical, &identities, now);
    write_history(&history_path, &history)?;

    print_report_summary(&document, &advisories, &published, paths.root());
    Ok(())
}

/// Compute and print coverage without touching the output directory.
pub fn run_coverage(args: CoverageArgs) -> Result<()> {
    let root = artifact_root(&args.artifacts)?;
    let paths = ArtifactPaths::new(root);
    let config = resolve_config(&paths, args.config.as_deref())?;
    let (_, set) = load_inputs(&paths, &config)?;
    let output = run_engine(&set, &config, None, Utc::now())?;
    if args.json {
        let text =
            serde_json::to_string_pretty(&output.coverage).context("serialize coverage")?;
        println!("{text}");
        return Ok(());
    }
    for row in coverage_rows(&output.coverage) {
        let value = row.value.map(|value| value.to_string()).unwrap_or_default();
        let percentage = row
            .percentage
            .map(|percentage| format!("{percentage:.1}%"))
            .unwrap_or_default();
        println!(
            "{:<10} {:<28} {:>6} {:>7}  {}",
            row.category, row.metric, value, percentage, row.note
        );
    }
    for warning in &output.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

/// Classify a single error and print ranked suggestions.
pub fn run_triage(args: TriageArgs) -> Result<()> {
    let step = Step {
        action: args.action,
        target: args.target,
        error: Some(args.error.clone()),
        ..Step::default()
    };
    let category = classify_error(&args.error);
    let suggestions = suggest(&step, category);
    if args.json {
        let value = serde_json::json!({
            "error_category": category.as_str(),
            "title": category.title(),
            "suggestions": suggestions,
        });
        let text = serde_json::to_string_pretty(&value).context("serialize triage")?;
        println!("{text}");
        return Ok(());
    }
    println!("{} ({})", category.title(), category.as_str());
    for (rank, suggestion) in suggestions.iter().enumerate() {
        println!(
            "{}. [{} {:.2}] {}",
            rank + 1,
            suggestion.kind.as_str(),
            suggestion.confidence,
            suggestion.message
        );
        if let Some(target) = suggestion.new_target.as_deref() {
            println!("   target: {target}");
        }
        if let Some(action) = suggestion.new_action.as_deref() {
            println!("   action: {action}");
        }
    }
    Ok(())
}

fn artifact_root(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        return Err(anyhow!("artifact directory {} not found", path.display()));
    }
    Ok(path.to_path_buf())
}

fn load_inputs(
    paths: &ArtifactPaths,
    config: &ReportConfig,
) -> Result<(DiscoveredArtifacts, ArtifactSet)> {
    let discovered = discover_artifacts(paths.root(), &config.file_patterns)?;
    if discovered.results.is_empty() {
        return Err(anyhow!(
            "no execution result files found in {}",
            paths.root().display()
        ));
    }
    let set = load_artifacts(&discovered)?;
    Ok((discovered, set))
}

fn publish_outputs(
    out: &OutputPaths,
    stamp: &str,
    config: &ReportConfig,
    output: &EngineOutput,
    document: &ReportDocument,
) -> Result<Vec<PathBuf>> {
    let mut staging = Staging::begin(out.txn_root(stamp))?;
    staging.write_bytes(
        &OutputPaths::report_csv_name(stamp),
        &report_csv(&output.rows, config.extended_columns)?,
    )?;
    staging.write_bytes(
        &OutputPaths::coverage_csv_name(stamp),
        &coverage_csv(&coverage_rows(&output.coverage))?,
    )?;
    staging.write_json(&OutputPaths::coverage_json_name(stamp), document)?;
    staging.write_bytes(
        &OutputPaths::html_name(stamp),
        render_html(document).as_bytes(),
    )?;
    let published = staging.publish(out.root())?;
    for path in &published {
        tracing::info!(path = %path.display(), "published");
    }
    Ok(published)
}

fn print_report_summary(
    document: &ReportDocument,
    advisories: &[DuplicateAdvisory],
    published: &[PathBuf],
    root: &Path,
) {
    for path in published {
        println!("wrote {}", display_path(path, Some(root)));
    }
    let coverage = &document.coverage;
    println!(
        "rows: {} (unmapped {}), failures: {}, routes: {}/{} succeeded",
        document.row_count,
        document.unmapped_rows,
        document.failures.len(),
        coverage.successful_routes,
        coverage.executed_routes
    );
    println!(
        "success coverage: {:.1}% (gap {:.1}%), quality score: {:.2}",
        coverage.success_coverage, coverage.coverage_gap, coverage.quality_score
    );
    for advisory in advisories {
        eprintln!("warning: {}", advisory.message);
    }
    for warning in &document.warnings {
        eprintln!("warning: {warning}");
    }
}
