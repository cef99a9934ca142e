//! Test output parsing: raw Jest / Vitest CLI output to [`TestResults`].
//!
//! Each supported framework has its own sub-parser. They are tried in a fixed
//! order ([`TestFramework::ALL`]) and the first one that extracts a nonzero
//! total wins. Parsing never fails loudly: unrecognised output is `None`.

pub mod jest;
pub mod vitest;

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters of cleaned output kept at each end for diagnostics.
const SAMPLE_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Overall classification of a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Passed,
    Failed,
    /// Reserved for trend comparison against the previous run.
    Improved,
    /// Reserved for trend comparison against the previous run.
    Degraded,
}

impl Verdict {
    /// `Failed` if any test failed, `Passed` otherwise.
    pub fn from_failures(failed: u64) -> Self {
        if failed > 0 {
            Verdict::Failed
        } else {
            Verdict::Passed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Passed => "PASSED",
            Verdict::Failed => "FAILED",
            Verdict::Improved => "IMPROVED",
            Verdict::Degraded => "DEGRADED",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TestResults
// ---------------------------------------------------------------------------

/// Normalized counts extracted from a test run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResults {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    /// Skipped (and todo) tests. `None` rather than `Some(0)` when there are none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<u64>,
    #[serde(rename = "result")]
    pub verdict: Verdict,
}

impl TestResults {
    /// Build a result from raw counts.
    ///
    /// A zero total cannot be told apart from noise, so it yields `None`.
    pub fn from_counts(total: u64, passed: u64, failed: u64, skipped: u64) -> Option<Self> {
        if total == 0 {
            return None;
        }
        Some(Self {
            total,
            passed,
            failed,
            skipped: (skipped > 0).then_some(skipped),
            verdict: Verdict::from_failures(failed),
        })
    }
}

// ---------------------------------------------------------------------------
// Framework dispatch
// ---------------------------------------------------------------------------

/// A supported textual summary format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestFramework {
    Jest,
    Vitest,
}

impl TestFramework {
    /// Sub-parsers in priority order.
    pub const ALL: [TestFramework; 2] = [TestFramework::Jest, TestFramework::Vitest];

    pub fn name(&self) -> &'static str {
        match self {
            TestFramework::Jest => "Jest",
            TestFramework::Vitest => "Vitest",
        }
    }

    /// A representative summary line for this format.
    pub fn example(&self) -> &'static str {
        match self {
            TestFramework::Jest => "Tests: 1 failed, 9 passed, 10 total",
            TestFramework::Vitest => "Tests  1 failed | 9 passed (10)",
        }
    }

    fn parse_clean(&self, clean: &str) -> Option<TestResults> {
        match self {
            TestFramework::Jest => jest::parse_clean(clean),
            TestFramework::Vitest => vitest::parse_clean(clean),
        }
    }
}

impl fmt::Display for TestFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parsed results together with the format that recognised them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedSummary {
    pub framework: TestFramework,
    #[serde(flatten)]
    pub results: TestResults,
}

/// Parse test output from any supported framework.
pub fn parse_test_output(output: &str) -> Option<TestResults> {
    detect(output).map(|summary| summary.results)
}

/// Like [`parse_test_output`], but also reports which sub-parser matched.
pub fn detect(output: &str) -> Option<ParsedSummary> {
    let clean = clean_output(output);
    TestFramework::ALL.iter().find_map(|framework| {
        framework
            .parse_clean(&clean)
            .map(|results| ParsedSummary {
                framework: *framework,
                results,
            })
    })
}

/// Strip ANSI colour sequences and normalize CRLF / CR line endings to LF.
pub fn clean_output(output: &str) -> String {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let stripped = compiled(&ANSI, r"\x1b\[[0-9;]*m").replace_all(output, "");
    stripped.replace("\r\n", "\n").replace('\r', "\n")
}

/// The first line that looks like a test summary, for diagnostics.
pub fn summary_line(output: &str) -> Option<String> {
    static SUMMARY: OnceLock<Regex> = OnceLock::new();
    let clean = clean_output(output);
    compiled(&SUMMARY, r"(?m)^.*Tests(?::|[ \t]+[0-9]).*$")
        .find(&clean)
        .map(|m| m.as_str().trim().to_string())
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Description of output that no sub-parser recognised.
#[derive(Debug, Clone)]
pub struct UnparsedOutput {
    pub bytes: usize,
    pub lines: usize,
    pub head: String,
    pub tail: String,
}

impl UnparsedOutput {
    pub fn from_output(output: &str) -> Self {
        let clean = clean_output(output);
        let chars = clean.chars().count();
        let head: String = clean.chars().take(SAMPLE_CHARS).collect();
        let tail: String = clean
            .chars()
            .skip(chars.saturating_sub(SAMPLE_CHARS))
            .collect();
        Self {
            bytes: output.len(),
            lines: clean.lines().count(),
            head,
            tail,
        }
    }
}

impl fmt::Display for UnparsedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not parse test output. Supported formats: ")?;
        for (i, framework) in TestFramework::ALL.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} (\"{}\")", framework.name(), framework.example())?;
        }
        let last_line = self.tail.lines().rev().find(|l| !l.trim().is_empty());
        match last_line {
            Some(line) => write!(
                f,
                ". Read {} bytes; last line: \"{}\"",
                self.bytes,
                line.trim()
            ),
            None => write!(f, ". Read {} bytes of output", self.bytes),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// A `<N> <keyword>` clause of a summary line.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Clause {
    Total,
    Passed,
    Failed,
    Skipped,
    Todo,
}

impl Clause {
    fn pattern(self) -> &'static Regex {
        static TOTAL: OnceLock<Regex> = OnceLock::new();
        static PASSED: OnceLock<Regex> = OnceLock::new();
        static FAILED: OnceLock<Regex> = OnceLock::new();
        static SKIPPED: OnceLock<Regex> = OnceLock::new();
        static TODO: OnceLock<Regex> = OnceLock::new();
        match self {
            Clause::Total => compiled(&TOTAL, r"(?i)([0-9]+)\s+total"),
            Clause::Passed => compiled(&PASSED, r"(?i)([0-9]+)\s+passed"),
            Clause::Failed => compiled(&FAILED, r"(?i)([0-9]+)\s+failed"),
            Clause::Skipped => compiled(&SKIPPED, r"(?i)([0-9]+)\s+skipped"),
            Clause::Todo => compiled(&TODO, r"(?i)([0-9]+)\s+todo"),
        }
    }

    /// Count from the first matching clause in `text`, or 0.
    pub(crate) fn count_in(self, text: &str) -> u64 {
        self.pattern()
            .captures(text)
            .and_then(|caps| caps[1].parse().ok())
            .unwrap_or(0)
    }
}

pub(crate) fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("hard-coded pattern must compile"))
}

pub(crate) fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    index = index.min(s.len());
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

pub(crate) fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    index = index.min(s.len());
    while !s.is_char_boundary(index) {
        index += 1;
    }
    index
}
