//! Vitest summary parser.
//!
//! Vitest prints `      Tests  1 failed | 2 skipped | 5 passed (8)`. The
//! parenthesized number is the authoritative total; categories with a zero
//! count are simply left out of the line. `todo` tests are folded into
//! `skipped`.

use std::sync::OnceLock;

use regex::Regex;

use super::{clean_output, compiled, Clause, TestResults};

/// Parse Vitest output. Returns `None` if no summary is found or the total is zero.
pub fn parse(output: &str) -> Option<TestResults> {
    parse_clean(&clean_output(output))
}

pub(crate) fn parse_clean(clean: &str) -> Option<TestResults> {
    static SUMMARY: OnceLock<Regex> = OnceLock::new();
    static TOTAL: OnceLock<Regex> = OnceLock::new();

    let line = compiled(&SUMMARY, r"(?m)^\s*Tests\s+(.+?\([0-9]+\))")
        .captures(clean)?
        .get(1)?
        .as_str();

    let total: u64 = compiled(&TOTAL, r"\(([0-9]+)\)\s*$")
        .captures(line)?[1]
        .parse()
        .ok()?;

    TestResults::from_counts(
        total,
        Clause::Passed.count_in(line),
        Clause::Failed.count_in(line),
        Clause::Skipped
            .count_in(line)
            .checked_add(Clause::Todo.count_in(line))
            .unwrap_or(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Verdict;

    #[test]
    fn test_all_passing() {
        let output = "
 ✓ tests/basic.test.ts (3)
 ✓ tests/advanced.test.ts (5)

 Test Files  2 passed (2)
      Tests  8 passed (8)
   Start at  14:23:45
   Duration  1.23s
";
        let result = parse(output).unwrap();
        assert_eq!(result.total, 8);
        assert_eq!(result.passed, 8);
        assert_eq!(result.failed, 0);
        assert_eq!(result.verdict, Verdict::Passed);
    }

    #[test]
    fn test_with_failures() {
        let output = "
 ❯ tests/basic.test.ts (3)
   ✓ adds numbers
   × fails gracefully

 Test Files  1 failed | 1 passed (2)
      Tests  1 failed | 7 passed (8)
";
        let result = parse(output).unwrap();
        assert_eq!(result.total, 8);
        assert_eq!(result.passed, 7);
        assert_eq!(result.failed, 1);
        assert_eq!(result.verdict, Verdict::Failed);
    }

    #[test]
    fn test_with_skipped() {
        let output = " Test Files  1 passed (1)\n      Tests  2 skipped | 5 passed (7)\n";
        let result = parse(output).unwrap();
        assert_eq!(result.total, 7);
        assert_eq!(result.passed, 5);
        assert_eq!(result.skipped, Some(2));
        assert_eq!(result.verdict, Verdict::Passed);
    }

    #[test]
    fn test_todo_counts_as_skipped() {
        let output = "
 Test Files  1 failed | 2 passed (3)
      Tests  1 failed | 2 skipped | 1 todo | 6 passed (10)
   Duration  3.45s
";
        let result = parse(output).unwrap();
        assert_eq!(result.total, 10);
        assert_eq!(result.passed, 6);
        assert_eq!(result.failed, 1);
        assert_eq!(result.skipped, Some(3));
        assert_eq!(result.verdict, Verdict::Failed);
    }

    #[test]
    fn test_total_comes_from_parentheses() {
        let result = parse("      Tests  3 passed (5)").unwrap();
        assert_eq!(result.total, 5);
        assert_eq!(result.passed, 3);
    }

    #[test]
    fn test_no_summary() {
        assert!(parse("Some random output\nNo test results here").is_none());
    }

    #[test]
    fn test_jest_line_is_not_vitest() {
        assert!(parse("Tests:       173 passed, 173 total").is_none());
    }

    #[test]
    fn test_ansi_colours() {
        let output = "
\x1b[32m ✓\x1b[0m tests/basic.test.ts (5)

 Test Files  \x1b[1m\x1b[32m1 passed\x1b[0m (1)
      Tests  \x1b[1m\x1b[32m5 passed\x1b[0m (5)
   Duration  0.45s
";
        let result = parse(output).unwrap();
        assert_eq!(result.total, 5);
        assert_eq!(result.passed, 5);
        assert_eq!(result.verdict, Verdict::Passed);
    }

    #[test]
    fn test_large_counts() {
        let output = " Test Files  45 passed (45)\n      Tests  1234 passed (1234)\n";
        let result = parse(output).unwrap();
        assert_eq!(result.total, 1234);
        assert_eq!(result.passed, 1234);
    }

    #[test]
    fn test_overflowing_skipped_plus_todo_is_zero() {
        let result = parse("      Tests  18446744073709551615 skipped | 1 todo (5)").unwrap();
        assert_eq!(result.total, 5);
        assert_eq!(result.skipped, None);
        assert_eq!(result.verdict, Verdict::Passed);
    }
}
