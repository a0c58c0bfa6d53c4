//! Artifact discovery inside a single artifact directory.
use crate::config::FilePatterns;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// Artifact kinds recognized by filename prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Viewpoints,
    TestCases,
    Route,
    Result,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Viewpoints => "viewpoints",
            ArtifactKind::TestCases => "test_cases",
            ArtifactKind::Route => "route",
            ArtifactKind::Result => "result",
        }
    }
}

/// A discovered artifact file and its modification time.
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    pub path: PathBuf,
    pub modified: Option<DateTime<Utc>>,
}

/// Artifact files grouped by kind, each list sorted by file name.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredArtifacts {
    pub viewpoints: Vec<ArtifactFile>,
    pub test_cases: Vec<ArtifactFile>,
    pub routes: Vec<ArtifactFile>,
    pub results: Vec<ArtifactFile>,
}

impl DiscoveredArtifacts {
    /// All discovered files in a stable order, for input hashing.
    pub fn all_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .viewpoints
            .iter()
            .chain(&self.test_cases)
            .chain(&self.routes)
            .chain(&self.results)
            .map(|file| file.path.clone())
            .collect();
        paths.sort();
        paths
    }
}

/// Classify the JSON files of `root` (non-recursive) by filename prefix.
pub fn discover_artifacts(root: &Path, patterns: &FilePatterns) -> Result<DiscoveredArtifacts> {
    if !root.is_dir() {
        return Err(anyhow!("artifact directory {} not found", root.display()));
    }
    let mut entries: Vec<PathBuf> = fs::read_dir(root)
        .with_context(|| format!("read {}", root.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    let mut discovered = DiscoveredArtifacts::default();
    for path in entries {
        let Some(kind) = classify_file(&path, patterns) else {
            continue;
        };
        let modified = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        tracing::trace!(kind = kind.as_str(), path = %path.display(), "classified artifact");
        let file = ArtifactFile { path, modified };
        match kind {
            ArtifactKind::Viewpoints => discovered.viewpoints.push(file),
            ArtifactKind::TestCases => discovered.test_cases.push(file),
            ArtifactKind::Route => discovered.routes.push(file),
            ArtifactKind::Result => discovered.results.push(file),
        }
    }
    tracing::debug!(
        viewpoints = discovered.viewpoints.len(),
        test_cases = discovered.test_cases.len(),
        routes = discovered.routes.len(),
        results = discovered.results.len(),
        "discovered artifact files"
    );
    Ok(discovered)
}

/// Match a file name against the configured prefixes.
///
/// Kinds are checked in declaration order so that `test_cases` wins over a
/// shorter `test` prefix configured for another kind.
pub fn classify_file(path: &Path, patterns: &FilePatterns) -> Option<ArtifactKind> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    if !name.ends_with(".json") {
        return None;
    }
    let kinds = [
        (ArtifactKind::TestCases, &patterns.test_cases),
        (ArtifactKind::Viewpoints, &patterns.viewpoints),
        (ArtifactKind::Result, &patterns.results),
        (ArtifactKind::Route, &patterns.routes),
    ];
    kinds.into_iter().find_map(|(kind, prefixes)| {
        prefixes
            .iter()
            .any(|prefix| name.starts_with(&prefix.to_ascii_lowercase()))
            .then_some(kind)
    })
}
