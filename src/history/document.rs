//! The `.taf` history document.
//!
//! The document is kept as an insertion-ordered YAML mapping instead of a
//! fixed struct, so top-level keys this crate does not know about (and extra
//! keys inside existing entries) are written back exactly as they were read.

use chrono::{DateTime, Utc};
use serde_yaml::{Mapping, Value};

use super::entry::{format_timestamp, RunEntry, TestCounts};
use super::HistoryError;

/// Value of `format_version` in newly created documents.
pub const FORMAT_VERSION: &str = "1.0.0";

const HISTORY_KEY: &str = "test_history";
const SEPARATOR: &str = "---";

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryDocument {
    root: Mapping,
}

impl HistoryDocument {
    /// A fresh document with an empty `test_history`.
    pub fn new(project: &str, now: DateTime<Utc>) -> Self {
        let stamp = format_timestamp(now);
        let mut root = Mapping::new();
        root.insert("format_version".into(), FORMAT_VERSION.into());
        root.insert("project".into(), project.into());
        root.insert("created".into(), stamp.clone().into());
        root.insert("last_updated".into(), stamp.into());
        root.insert(HISTORY_KEY.into(), Value::Sequence(Vec::new()));
        Self { root }
    }

    /// Parse the first YAML document in `content`.
    ///
    /// Fails if it is not a mapping or has no `test_history` sequence.
    pub fn parse(content: &str) -> Result<Self, HistoryError> {
        match parse_first_document(content)? {
            Value::Mapping(root) => {
                if !matches!(root.get(HISTORY_KEY), Some(Value::Sequence(_))) {
                    return Err(HistoryError::MissingHistory);
                }
                Ok(Self { root })
            }
            _ => Err(HistoryError::NotAMapping),
        }
    }

    /// All recorded runs, oldest first.
    pub fn runs(&self) -> &[Value] {
        self.root
            .get(HISTORY_KEY)
            .and_then(Value::as_sequence)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    pub fn project(&self) -> Option<&str> {
        self.root.get("project").and_then(Value::as_str)
    }

    /// Append `entry` to the end of `test_history`.
    pub fn append_run(&mut self, entry: &RunEntry) -> Result<(), HistoryError> {
        let value = serde_yaml::to_value(entry).map_err(HistoryError::Serialize)?;
        self.root
            .get_mut(HISTORY_KEY)
            .and_then(Value::as_sequence_mut)
            .ok_or(HistoryError::MissingHistory)?
            .push(value);
        Ok(())
    }

    /// Set `last_updated`, keeping its position if the key already exists.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.root
            .insert("last_updated".into(), format_timestamp(now).into());
    }

    /// Counts from the most recent run, if it has a numeric `tests.total`.
    pub fn latest_counts(&self) -> Option<TestCounts> {
        self.runs().last().and_then(counts_of)
    }

    pub fn to_yaml(&self) -> Result<String, HistoryError> {
        serde_yaml::to_string(&self.root).map_err(HistoryError::Serialize)
    }
}

/// Keep only the first YAML document of `content`.
///
/// A single `---` preceded only by blank lines is skipped. Any later `---`
/// ends the document and everything after it is discarded.
pub fn isolate_first_document(content: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut started = false;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed == SEPARATOR {
            if started {
                break;
            }
            started = true;
            continue;
        }
        if !trimmed.is_empty() {
            started = true;
        }
        kept.push(line);
    }

    kept.join("\n")
}

/// Isolate and parse the first document without validating its shape.
pub(crate) fn parse_first_document(content: &str) -> Result<Value, HistoryError> {
    let isolated = isolate_first_document(content);
    if isolated.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(&isolated).map_err(HistoryError::Parse)
}

/// Loose read of an entry's `tests` block.
pub(crate) fn counts_of(entry: &Value) -> Option<TestCounts> {
    let tests = entry.get("tests")?;
    let total = tests.get("total")?.as_u64()?;
    let count = |key: &str| tests.get(key).and_then(Value::as_u64).unwrap_or(0);
    let skipped = count("skipped");
    Some(TestCounts {
        total,
        passed: count("passed"),
        failed: count("failed"),
        skipped: (skipped > 0).then_some(skipped),
    })
}
