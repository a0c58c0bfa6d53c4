//! "Keep latest by key" reduction shared by every record family.
//!
//! The tie-break lives here and nowhere else: equal timestamps resolve to the
//! record encountered last, so results are stable for stable input order.
use crate::artifacts::UNKNOWN_KEY;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Record families reduced by [`keep_latest`], used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    ExecutionResults,
    ReportRows,
    Failures,
    Routes,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::ExecutionResults => "execution_results",
            RecordKind::ReportRows => "report_rows",
            RecordKind::Failures => "failures",
            RecordKind::Routes => "routes",
        }
    }
}

/// Return one record per key: the one with the latest timestamp.
///
/// Missing timestamps sort as the Unix epoch; missing keys collapse into the
/// literal `"unknown"` key. Output keeps the first-seen order of each key.
pub fn keep_latest<T, K, S>(records: Vec<T>, kind: RecordKind, key_fn: K, timestamp_fn: S) -> Vec<T>
where
    K: Fn(&T) -> Option<String>,
    S: Fn(&T) -> Option<DateTime<Utc>>,
{
    let input_len = records.len();
    let mut slots: Vec<(DateTime<Utc>, T)> = Vec::with_capacity(input_len);
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = key_fn(&record).unwrap_or_else(|| UNKNOWN_KEY.to_string());
        let timestamp = timestamp_fn(&record).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        match index_by_key.get(&key) {
            Some(&slot) => {
                if timestamp >= slots[slot].0 {
                    slots[slot] = (timestamp, record);
                }
            }
            None => {
                index_by_key.insert(key, slots.len());
                slots.push((timestamp, record));
            }
        }
    }

    let removed = input_len - slots.len();
    tracing::info!(kind = kind.as_str(), kept = slots.len(), removed, "deduplicated records");
    slots.into_iter().map(|(_, record)| record).collect()
}

/// Composite key for failure records: `(label, action, target, value, error)`.
pub fn failure_key(label: &str, action: &str, target: &str, value: &str, error: &str) -> String {
    [label, action, target, value, error].join("\u{1f}")
}
