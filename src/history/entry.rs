//! Run entries appended to `test_history`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::parser::{TestResults, Verdict};

/// One recorded test run (a "receipt").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEntry {
    /// When the entry was generated, not when the tests ran.
    pub timestamp: String,
    pub result: Verdict,
    pub tests: TestCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Provenance tag, e.g. `github-actions`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

impl RunEntry {
    pub fn new(results: &TestResults, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: format_timestamp(at),
            result: results.verdict,
            tests: TestCounts::from(results),
            command: None,
            trigger: None,
        }
    }

    pub fn with_trigger(mut self, trigger: Option<String>) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_command(mut self, command: Option<String>) -> Self {
        self.command = command;
        self
    }
}

/// The `tests:` block of a run entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCounts {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<u64>,
}

impl From<&TestResults> for TestCounts {
    fn from(results: &TestResults) -> Self {
        Self {
            total: results.total,
            passed: results.passed,
            failed: results.failed,
            skipped: results.skipped,
        }
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2026-01-01T00:00:00.000Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(at), "2026-01-02T03:04:05.000Z");
    }

    #[test]
    fn test_entry_copies_results() {
        let results = TestResults::from_counts(10, 6, 1, 3).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let entry = RunEntry::new(&results, at).with_trigger(Some("local".into()));

        assert_eq!(entry.result, Verdict::Failed);
        assert_eq!(entry.tests.total, 10);
        assert_eq!(entry.tests.skipped, Some(3));
        assert_eq!(entry.trigger.as_deref(), Some("local"));
        assert_eq!(entry.command, None);
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let results = TestResults::from_counts(4, 4, 0, 0).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let yaml = serde_yaml::to_string(&RunEntry::new(&results, at)).unwrap();

        assert!(yaml.contains("result: PASSED"));
        assert!(!yaml.contains("skipped"));
        assert!(!yaml.contains("trigger"));
        assert!(!yaml.contains("command"));
    }
}
