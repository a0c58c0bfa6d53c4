//! Parsers for the artifact file shapes written by the generation pipeline.
//!
//! Each loader accepts every shape the producers have emitted over time and
//! normalizes it into the typed records in `types`.
use super::discover::{ArtifactFile, DiscoveredArtifacts};
use super::types::{scalar_to_string, ExecutionResult, Route, Step, TestCase, Viewpoint};
use crate::dedup::{keep_latest, RecordKind};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const VIEWPOINT_TEXT_KEYS: &[&str] = &[
    "viewpoint",
    "観点",
    "text",
    "content",
    "description",
    "point",
    "テスト観点",
];
const VIEWPOINT_INDEX_KEYS: &[&str] = &["No", "no", "index", "id", "番号"];
const VIEWPOINT_CATEGORY_KEYS: &[&str] = &["category", "カテゴリ", "カテゴリー"];
const VIEWPOINT_PRIORITY_KEYS: &[&str] = &["priority", "優先度"];
const USER_STORY_KEYS: &[&str] = &["user_story", "userStory", "ユーザーストーリー"];

/// Parsed viewpoint file, including optional wrapper metadata.
#[derive(Debug, Clone, Default)]
pub struct ViewpointFile {
    pub viewpoints: Vec<Viewpoint>,
    pub user_story: Option<String>,
}

/// A route together with the file it was read from.
#[derive(Debug, Clone)]
pub struct LoadedRoute {
    pub route: Route,
    pub path: PathBuf,
}

/// Everything read from one artifact directory.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    pub viewpoints: Option<ViewpointFile>,
    pub viewpoints_path: Option<PathBuf>,
    pub test_cases: Option<Vec<TestCase>>,
    pub test_cases_path: Option<PathBuf>,
    pub routes: Vec<LoadedRoute>,
    /// Every execution result file, reruns included.
    pub results: Vec<ExecutionResult>,
    /// Optional files that failed to parse and were skipped.
    pub warnings: Vec<String>,
}

/// Load and parse every discovered artifact.
///
/// Viewpoint and test case files collapse to the most recently modified file;
/// routes collapse to the newest definition per route id. Execution results
/// are returned unreduced so callers can count reruns.
///
/// Only execution results are required: a malformed result aborts, while a
/// malformed viewpoint, test case or route file is skipped with a warning.
pub fn load_artifacts(discovered: &DiscoveredArtifacts) -> Result<ArtifactSet> {
    let mut set = ArtifactSet::default();

    if let Some(file) = latest_file(&discovered.viewpoints) {
        let parsed = read_json_value(&file.path).and_then(|value| {
            parse_viewpoints(&value)
                .with_context(|| format!("parse viewpoints {}", file.path.display()))
        });
        if let Some(parsed) = optional(parsed, &mut set.warnings) {
            set.viewpoints = Some(parsed);
            set.viewpoints_path = Some(file.path.clone());
        }
    }

    if let Some(file) = latest_file(&discovered.test_cases) {
        let parsed = read_json_value(&file.path).and_then(|value| {
            parse_test_cases(value)
                .with_context(|| format!("parse test cases {}", file.path.display()))
        });
        if let Some(parsed) = optional(parsed, &mut set.warnings) {
            set.test_cases = Some(parsed);
            set.test_cases_path = Some(file.path.clone());
        }
    }

    let mut routes = Vec::new();
    for file in &discovered.routes {
        let parsed = read_json_value(&file.path).and_then(|value| {
            parse_route_file(value).with_context(|| format!("parse route {}", file.path.display()))
        });
        let Some(parsed) = optional(parsed, &mut set.warnings) else {
            continue;
        };
        routes.extend(parsed.into_iter().map(|route| (file.modified, LoadedRoute {
            route,
            path: file.path.clone(),
        })));
    }
    set.routes = keep_latest(
        routes,
        RecordKind::Routes,
        |(_, loaded)| loaded.route.route_id.clone(),
        |(modified, _)| *modified,
    )
    .into_iter()
    .map(|(_, loaded)| loaded)
    .collect();

    for file in &discovered.results {
        let bytes = fs::read(&file.path).with_context(|| format!("read {}", file.path.display()))?;
        let result: ExecutionResult = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse execution result {}", file.path.display()))?;
        set.results.push(result);
    }

    tracing::debug!(
        viewpoints = set.viewpoints.as_ref().map_or(0, |file| file.viewpoints.len()),
        test_cases = set.test_cases.as_ref().map_or(0, Vec::len),
        routes = set.routes.len(),
        results = set.results.len(),
        skipped = set.warnings.len(),
        "loaded artifacts"
    );
    Ok(set)
}

fn optional<T>(parsed: Result<T>, warnings: &mut Vec<String>) -> Option<T> {
    match parsed {
        Ok(value) => Some(value),
        Err(err) => {
            let warning = format!("skipping unreadable artifact: {err:#}");
            tracing::warn!("{warning}");
            warnings.push(warning);
            None
        }
    }
}

fn latest_file(files: &[ArtifactFile]) -> Option<&ArtifactFile> {
    // Ties keep the later file name, matching the dedup tie-break.
    files
        .iter()
        .fold(None, |best: Option<&ArtifactFile>, file| match best {
            Some(current) if current.modified > file.modified => Some(current),
            _ => Some(file),
        })
}

fn read_json_value(path: &Path) -> Result<Value> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse JSON {}", path.display()))
}

/// Normalize a viewpoint file: a bare array or a `{metadata, points}` wrapper.
pub fn parse_viewpoints(value: &Value) -> Result<ViewpointFile> {
    let (items, metadata) = match value {
        Value::Array(items) => (items.as_slice(), None),
        Value::Object(object) => {
            let items = ["points", "viewpoints", "items"]
                .iter()
                .find_map(|key| object.get(*key).and_then(Value::as_array))
                .ok_or_else(|| anyhow!("viewpoint object missing a points array"))?;
            (items.as_slice(), object.get("metadata").and_then(Value::as_object))
        }
        _ => return Err(anyhow!("viewpoint file must be an array or object")),
    };

    let mut viewpoints = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let viewpoint = parse_viewpoint(position, item)?;
        viewpoints.push(viewpoint);
    }
    let user_story = metadata.and_then(|meta| first_string(meta, USER_STORY_KEYS));
    Ok(ViewpointFile {
        viewpoints,
        user_story,
    })
}

fn parse_viewpoint(position: usize, item: &Value) -> Result<Viewpoint> {
    let fallback_index = position + 1;
    match item {
        Value::String(text) if !text.trim().is_empty() => Ok(Viewpoint {
            index: fallback_index,
            text: text.trim().to_string(),
            category: None,
            priority: None,
        }),
        Value::Object(object) => {
            let text = first_string(object, VIEWPOINT_TEXT_KEYS)
                .or_else(|| first_unreserved_string(object))
                .ok_or_else(|| anyhow!("viewpoint #{fallback_index} has no text"))?;
            let index = VIEWPOINT_INDEX_KEYS
                .iter()
                .find_map(|key| object.get(*key).and_then(value_as_index))
                .unwrap_or(fallback_index);
            Ok(Viewpoint {
                index,
                text,
                category: first_string(object, VIEWPOINT_CATEGORY_KEYS),
                priority: first_string(object, VIEWPOINT_PRIORITY_KEYS),
            })
        }
        _ => Err(anyhow!("viewpoint #{fallback_index} has no text")),
    }
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        object
            .get(*key)
            .and_then(scalar_to_string)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    })
}

fn first_unreserved_string(object: &Map<String, Value>) -> Option<String> {
    object.iter().find_map(|(key, value)| {
        let reserved = VIEWPOINT_INDEX_KEYS
            .iter()
            .chain(VIEWPOINT_CATEGORY_KEYS)
            .chain(VIEWPOINT_PRIORITY_KEYS)
            .any(|reserved| *reserved == key.as_str());
        if reserved {
            return None;
        }
        value
            .as_str()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    })
}

fn value_as_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(number) => number.as_u64().map(|n| n as usize),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Deserialize)]
struct RawTestCase {
    #[serde(default, alias = "testCaseId", alias = "test_case_id")]
    id: Option<Value>,
    #[serde(
        default,
        alias = "originalViewpoint",
        alias = "viewpoint",
        alias = "観点"
    )]
    original_viewpoint: Option<Value>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TestCaseFile {
    List(Vec<RawTestCase>),
    Categorized {
        categories: BTreeMap<String, Vec<RawTestCase>>,
    },
    Wrapped {
        #[serde(alias = "testCases")]
        test_cases: Vec<RawTestCase>,
    },
}

/// Normalize a test case file into a flat list, carrying bucket names into
/// `category` when the case itself has none.
pub fn parse_test_cases(value: Value) -> Result<Vec<TestCase>> {
    let file: TestCaseFile = serde_json::from_value(value)
        .map_err(|err| anyhow!("unrecognized test case layout: {err}"))?;
    let grouped: Vec<(Option<String>, RawTestCase)> = match file {
        TestCaseFile::List(items) | TestCaseFile::Wrapped { test_cases: items } => {
            items.into_iter().map(|item| (None, item)).collect()
        }
        TestCaseFile::Categorized { categories } => categories
            .into_iter()
            .flat_map(|(name, items)| items.into_iter().map(move |item| (Some(name.clone()), item)))
            .collect(),
    };
    Ok(grouped
        .into_iter()
        .enumerate()
        .map(|(position, (bucket, raw))| TestCase {
            id: raw
                .id
                .as_ref()
                .and_then(scalar_to_string)
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("TC-{}", position + 1)),
            original_viewpoint: raw
                .original_viewpoint
                .as_ref()
                .and_then(scalar_to_string)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            category: raw.category.or(bucket),
        })
        .collect())
}

#[derive(Deserialize)]
struct CategoryBatch {
    processing_mode: String,
    #[serde(default, alias = "routeId")]
    route_id: Option<String>,
    #[serde(default, alias = "feasibilityScore")]
    feasibility_score: Option<f64>,
    categories: Vec<BatchCategory>,
}

#[derive(Deserialize)]
struct BatchCategory {
    #[serde(default, alias = "name")]
    category: Option<String>,
    #[serde(default)]
    routes: Vec<Route>,
    #[serde(default)]
    steps: Vec<Step>,
    #[serde(default, alias = "feasibilityScore")]
    feasibility_score: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RouteFile {
    Batch(CategoryBatch),
    Single(Route),
}

/// Normalize a route file into one or more routes.
///
/// Category batches contribute nested routes as-is; a category carrying steps
/// directly becomes a route named `{batch}_{category}`.
pub fn parse_route_file(value: Value) -> Result<Vec<Route>> {
    let file: RouteFile = serde_json::from_value(value)
        .map_err(|err| anyhow!("unrecognized route layout: {err}"))?;
    let batch = match file {
        RouteFile::Single(route) => return Ok(vec![route]),
        RouteFile::Batch(batch) => batch,
    };
    if batch.processing_mode != "category_batch" {
        tracing::debug!(
            mode = batch.processing_mode.as_str(),
            "treating route batch with unexpected processing_mode as category batch"
        );
    }
    let batch_id = batch.route_id.unwrap_or_else(|| "batch".to_string());
    let mut routes = Vec::new();
    for (position, category) in batch.categories.into_iter().enumerate() {
        let score = category.feasibility_score.or(batch.feasibility_score);
        for mut route in category.routes {
            if route.feasibility_score.is_none() {
                route.feasibility_score = score;
            }
            routes.push(route);
        }
        if !category.steps.is_empty() {
            let name = category
                .category
                .unwrap_or_else(|| format!("category{}", position + 1));
            routes.push(Route {
                route_id: Some(format!("{batch_id}_{name}")),
                steps: category.steps,
                feasibility_score: score,
            });
        }
    }
    Ok(routes)
}
