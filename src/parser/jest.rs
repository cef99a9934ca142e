//! Jest summary parser.
//!
//! Jest ends a run with a block like:
//!
//! ```text
//! Test Suites: 1 failed, 17 passed, 18 total
//! Tests:       1 failed, 172 passed, 173 total
//! Snapshots:   0 total
//! ```
//!
//! Only the `Tests:` line is used. Each count is looked up on its own, so the
//! order of the clauses does not matter and a missing clause counts as zero.

use std::sync::OnceLock;

use regex::Regex;

use super::{ceil_char_boundary, clean_output, compiled, floor_char_boundary, Clause, TestResults};

/// Bytes of context kept before a fallback `... total` match.
const WINDOW_BEFORE: usize = 100;
/// Bytes of context kept after a fallback `... total` match.
const WINDOW_AFTER: usize = 20;

/// Parse Jest output. Returns `None` if no summary is found or the total is zero.
pub fn parse(output: &str) -> Option<TestResults> {
    parse_clean(&clean_output(output))
}

pub(crate) fn parse_clean(clean: &str) -> Option<TestResults> {
    let clauses = tests_line(clean).or_else(|| fallback_clauses(clean))?;

    TestResults::from_counts(
        Clause::Total.count_in(clauses),
        Clause::Passed.count_in(clauses),
        Clause::Failed.count_in(clauses),
        Clause::Skipped.count_in(clauses),
    )
}

/// Clause list following the first `Tests:` label.
fn tests_line(text: &str) -> Option<&str> {
    static TESTS_LINE: OnceLock<Regex> = OnceLock::new();
    compiled(&TESTS_LINE, r"(?im)Tests:\s*(.+?)$")
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Used when no `Tests:` label exists: locate a `<N> passed ... <N> total`
/// run anywhere and re-read the clause list from a window around it.
fn fallback_clauses(text: &str) -> Option<&str> {
    static TOTAL_NEARBY: OnceLock<Regex> = OnceLock::new();
    static LOOSE_LINE: OnceLock<Regex> = OnceLock::new();

    let hit = compiled(
        &TOTAL_NEARBY,
        r"(?i)([0-9]+)\s+(?:skipped|passed|failed).*?([0-9]+)\s+total",
    )
    .find(text)?;

    let start = floor_char_boundary(text, hit.start().saturating_sub(WINDOW_BEFORE));
    let end = ceil_char_boundary(text, hit.end() + WINDOW_AFTER);
    let window = &text[start..end];

    compiled(&LOOSE_LINE, r"(?im)Tests?:?\s*(.+?)$")
        .captures(window)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Verdict;

    #[test]
    fn test_all_passing() {
        let output = "
Test Suites: 18 passed, 18 total
Tests:       173 passed, 173 total
Snapshots:   0 total
Time:        2.5s
";
        let result = parse(output).unwrap();
        assert_eq!(result.total, 173);
        assert_eq!(result.passed, 173);
        assert_eq!(result.failed, 0);
        assert_eq!(result.skipped, None);
        assert_eq!(result.verdict, Verdict::Passed);
    }

    #[test]
    fn test_with_failures() {
        let output = "
Test Suites: 1 failed, 17 passed, 18 total
Tests:       1 failed, 172 passed, 173 total
Snapshots:   0 total
";
        let result = parse(output).unwrap();
        assert_eq!(result.total, 173);
        assert_eq!(result.passed, 172);
        assert_eq!(result.failed, 1);
        assert_eq!(result.verdict, Verdict::Failed);
    }

    #[test]
    fn test_with_skipped() {
        let output = "Tests:       2 skipped, 171 passed, 173 total\n";
        let result = parse(output).unwrap();
        assert_eq!(result.skipped, Some(2));
        assert_eq!(result.failed, 0);
        assert_eq!(result.verdict, Verdict::Passed);
    }

    #[test]
    fn test_mixed_results() {
        let output = "Tests:       5 failed, 3 skipped, 165 passed, 173 total\n";
        let result = parse(output).unwrap();
        assert_eq!(result.total, 173);
        assert_eq!(result.passed, 165);
        assert_eq!(result.failed, 5);
        assert_eq!(result.skipped, Some(3));
        assert_eq!(result.verdict, Verdict::Failed);
    }

    #[test]
    fn test_padded_ci_output() {
        let result = parse("Tests:       9 skipped, 799 passed, 808 total").unwrap();
        assert_eq!(result.total, 808);
        assert_eq!(result.passed, 799);
        assert_eq!(result.skipped, Some(9));
    }

    #[test]
    fn test_no_summary_line() {
        assert!(parse("Some random output\nNo test results here\n").is_none());
    }

    #[test]
    fn test_malformed_summary_line() {
        assert!(parse("\nTests: invalid data\n").is_none());
    }

    #[test]
    fn test_real_cli_output() {
        let output = "
PASS src/commands/taf-init.test.ts
PASS src/commands/taf-log.test.ts
PASS src/commands/taf-validate.test.ts

Test Suites: 18 passed, 18 total
Tests:       173 passed, 173 total
Snapshots:   0 total
Time:        2.512 s
Ran all test suites.
";
        let result = parse(output).unwrap();
        assert_eq!(result.total, 173);
        assert_eq!(result.passed, 173);
    }

    #[test]
    fn test_lower_case_label() {
        let result = parse("tests: 4 passed, 4 total").unwrap();
        assert_eq!(result.total, 4);
    }

    #[test]
    fn test_fallback_without_colon() {
        let output = "noise\nTests 3 failed, 7 passed, 10 total\nmore noise\n";
        let result = parse(output).unwrap();
        assert_eq!(result.total, 10);
        assert_eq!(result.passed, 7);
        assert_eq!(result.failed, 3);
    }

    #[test]
    fn test_fallback_reads_first_test_label_in_window() {
        // No `Tests:` line, so the window around the first `... total` run is
        // used and the `Test Suites` line inside it is what gets read.
        let output = "Test Suites: 2 passed, 2 total\n";
        let result = parse(output).unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.passed, 2);
    }

    #[test]
    fn test_fallback_handles_multibyte_context() {
        let output = format!("{}\nTests 1 passed, 1 total ✓✓✓✓✓✓✓✓✓✓\n", "é".repeat(80));
        let result = parse(&output).unwrap();
        assert_eq!(result.total, 1);
    }

    #[test]
    fn test_overflowing_count_is_zero() {
        let output = "Tests: 99999999999999999999999 failed, 3 passed, 3 total";
        let result = parse(output).unwrap();
        assert_eq!(result.failed, 0);
        assert_eq!(result.verdict, Verdict::Passed);
    }
}
