//! Status badge generation from the latest recorded run.
//!
//! Renders a shields.io "flat" style SVG with no external assets. Text widths
//! are approximated for Verdana at 11px.

use std::fs;
use std::io;
use std::path::PathBuf;

use serde_yaml::Value;
use tracing::debug;

use crate::history::document::{counts_of, parse_first_document};
use crate::history::{HistoryError, TestCounts, DEFAULT_HISTORY_FILE};

pub const COLOR_PASS: &str = "#00D4D4";
pub const COLOR_FAIL: &str = "#E32400";
pub const COLOR_NONE: &str = "#9F9F9F";

pub const DEFAULT_LABEL: &str = "TAF";
const NO_DATA: &str = "no data";

const CHAR_WIDTH: f64 = 6.5;
const PADDING: f64 = 10.0;
const HEIGHT: u32 = 20;

#[derive(Debug, Clone)]
pub struct BadgeOptions {
    pub history_path: PathBuf,
    pub label: String,
}

impl Default for BadgeOptions {
    fn default() -> Self {
        Self {
            history_path: PathBuf::from(DEFAULT_HISTORY_FILE),
            label: DEFAULT_LABEL.to_string(),
        }
    }
}

/// A rendered badge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub value: String,
    pub color: &'static str,
    pub svg: String,
}

/// Build the badge for the last run in the history file.
///
/// A missing file, an empty history or a last entry without a numeric
/// `tests.total` gives a grey "no data" badge. Unreadable or unparseable
/// files are errors.
pub fn generate_badge(options: &BadgeOptions) -> Result<Badge, HistoryError> {
    let (value, color) = match latest_run(options)? {
        Some(counts) => (badge_value(&counts), badge_color(&counts)),
        None => (NO_DATA.to_string(), COLOR_NONE),
    };
    debug!(label = %options.label, %value, "rendering badge");
    let svg = render_badge_svg(&options.label, &value, color);
    Ok(Badge { value, color, svg })
}

fn latest_run(options: &BadgeOptions) -> Result<Option<TestCounts>, HistoryError> {
    let path = &options.history_path;
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(HistoryError::Read {
                path: path.clone(),
                source,
            })
        }
    };

    let doc = parse_first_document(&content)?;
    Ok(doc
        .get("test_history")
        .and_then(Value::as_sequence)
        .and_then(|runs| runs.last())
        .and_then(counts_of))
}

/// `"<n>/<total> passing"` plus `" (<s> skipped)"` when anything was skipped.
///
/// `n` is the full total when nothing failed, so skipped tests do not make an
/// otherwise green run look partial.
pub fn badge_value(counts: &TestCounts) -> String {
    let shown = if counts.failed == 0 {
        counts.total
    } else {
        counts.passed
    };
    match counts.skipped {
        Some(skipped) if skipped > 0 => {
            format!("{shown}/{} passing ({skipped} skipped)", counts.total)
        }
        _ => format!("{shown}/{} passing", counts.total),
    }
}

pub fn badge_color(counts: &TestCounts) -> &'static str {
    if counts.failed == 0 {
        COLOR_PASS
    } else {
        COLOR_FAIL
    }
}

/// Render a flat-style SVG badge.
pub fn render_badge_svg(label: &str, value: &str, color: &str) -> String {
    let label_width = text_width(label);
    let value_width = text_width(value);
    let total_width = label_width + value_width;

    let label_x = label_width as f64 / 2.0;
    let value_x = label_width as f64 + value_width as f64 / 2.0;
    let label_len = (label_width - PADDING as u32) * 10;
    let value_len = (value_width - PADDING as u32) * 10;

    let label = escape_xml(label);
    let value = escape_xml(value);
    let color = escape_xml(color);

    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{total_width}" height="{HEIGHT}" role="img" aria-label="{label}: {value}">
  <title>{label}: {value}</title>
  <linearGradient id="s" x2="0" y2="100%">
    <stop offset="0" stop-color="#bbb" stop-opacity=".1"/>
    <stop offset="1" stop-opacity=".1"/>
  </linearGradient>
  <clipPath id="r">
    <rect width="{total_width}" height="{HEIGHT}" rx="3" fill="#fff"/>
  </clipPath>
  <g clip-path="url(#r)">
    <rect width="{label_width}" height="{HEIGHT}" fill="#555"/>
    <rect x="{label_width}" width="{value_width}" height="{HEIGHT}" fill="{color}"/>
    <rect width="{total_width}" height="{HEIGHT}" fill="url(#s)"/>
  </g>
  <g fill="#fff" text-anchor="middle" font-family="Verdana,Geneva,DejaVu Sans,sans-serif" text-rendering="geometricPrecision" font-size="11">
    <text x="{label_x}" y="140" fill="#010101" fill-opacity=".3" transform="scale(.1)" textLength="{label_len}">{label}</text>
    <text x="{label_x}" y="130" transform="scale(.1)" textLength="{label_len}">{label}</text>
    <text x="{value_x}" y="140" fill="#010101" fill-opacity=".3" transform="scale(.1)" textLength="{value_len}">{value}</text>
    <text x="{value_x}" y="130" transform="scale(.1)" textLength="{value_len}">{value}</text>
  </g>
</svg>"##
    )
}

fn text_width(text: &str) -> u32 {
    (text.chars().count() as f64 * CHAR_WIDTH + PADDING * 2.0).round() as u32
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(total: u64, passed: u64, failed: u64, skipped: Option<u64>) -> TestCounts {
        TestCounts {
            total,
            passed,
            failed,
            skipped,
        }
    }

    fn badge_for(content: Option<&str>) -> Badge {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".taf");
        if let Some(content) = content {
            fs::write(&path, content).unwrap();
        }
        generate_badge(&BadgeOptions {
            history_path: path,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_svg_structure() {
        let svg = render_badge_svg("TAF", "10/10 passing", COLOR_PASS);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(r##"fill="#00D4D4""##));
        assert!(svg.contains(r#"role="img""#));
        assert!(svg.contains(r#"aria-label="TAF: 10/10 passing""#));
        assert!(svg.contains("<title>TAF: 10/10 passing</title>"));
        assert!(svg.contains("Verdana"));
        assert!(svg.contains(r#"height="20""#));
        assert!(svg.contains(r#"rx="3""#));
        assert!(svg.contains(r#"clip-path="url(#r)""#));
    }

    #[test]
    fn test_svg_widths() {
        // "TAF": 3 * 6.5 + 20 = 39.5 -> 40; "test": 4 * 6.5 + 20 = 46
        let svg = render_badge_svg("TAF", "test", "#555");
        assert!(svg.contains(r#"width="86" height="20" role="img""#));
        assert!(svg.contains(r#"<text x="20" y="130" transform="scale(.1)" textLength="300">TAF</text>"#));
        assert!(svg.contains(r#"<text x="63" y="130" transform="scale(.1)" textLength="360">test</text>"#));
    }

    #[test]
    fn test_svg_escapes_text() {
        let svg = render_badge_svg("a<b", "\"x\" & y", "#555");
        assert!(svg.contains("a&lt;b"));
        assert!(svg.contains("&quot;x&quot; &amp; y"));
        assert!(!svg.contains("a<b"));
    }

    #[test]
    fn test_badge_value_rules() {
        assert_eq!(badge_value(&counts(38, 38, 0, None)), "38/38 passing");
        assert_eq!(badge_value(&counts(38, 35, 3, None)), "35/38 passing");
        assert_eq!(
            badge_value(&counts(10, 8, 0, Some(2))),
            "10/10 passing (2 skipped)"
        );
        assert_eq!(
            badge_value(&counts(10, 6, 1, Some(3))),
            "6/10 passing (3 skipped)"
        );
        assert_eq!(badge_color(&counts(1, 1, 0, None)), COLOR_PASS);
        assert_eq!(badge_color(&counts(2, 1, 1, None)), COLOR_FAIL);
    }

    #[test]
    fn test_passing_history() {
        let badge = badge_for(Some(
            "format_version: 1.0.0
project: test
test_history:
  - timestamp: \"2026-01-01T00:00:00Z\"
    result: PASSED
    tests:
      total: 38
      passed: 38
      failed: 0
",
        ));
        assert_eq!(badge.value, "38/38 passing");
        assert_eq!(badge.color, COLOR_PASS);
        assert!(badge.svg.contains("38/38 passing"));
    }

    #[test]
    fn test_uses_latest_entry() {
        let badge = badge_for(Some(
            "---
test_history:
  - timestamp: \"2026-01-01T00:00:00Z\"
    result: FAILED
    tests: {total: 10, passed: 7, failed: 3}
  - timestamp: \"2026-01-02T00:00:00Z\"
    result: PASSED
    tests: {total: 10, passed: 10, failed: 0}
---
test_history: []
",
        ));
        assert_eq!(badge.value, "10/10 passing");
        assert_eq!(badge.color, COLOR_PASS);
    }

    #[test]
    fn test_failing_history() {
        let badge = badge_for(Some(
            "test_history:\n  - tests: {total: 38, passed: 35, failed: 3}\n",
        ));
        assert_eq!(badge.value, "35/38 passing");
        assert_eq!(badge.color, COLOR_FAIL);
    }

    #[test]
    fn test_no_data_cases() {
        for content in [
            None,
            Some("format_version: 1.0.0\ntest_history: []\n"),
            Some("test_history:\n  - result: PASSED\n"),
            Some("project: no history at all\n"),
            Some("- not\n- a mapping\n"),
        ] {
            let badge = badge_for(content);
            assert_eq!(badge.value, "no data", "content: {content:?}");
            assert_eq!(badge.color, COLOR_NONE);
        }
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".taf");
        fs::write(&path, "{{{{ not yaml at all").unwrap();

        let result = generate_badge(&BadgeOptions {
            history_path: path,
            label: "tests".into(),
        });
        assert!(matches!(result, Err(HistoryError::Parse(_))));
    }

    #[test]
    fn test_custom_label() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".taf");
        fs::write(&path, "test_history:\n  - tests: {total: 5, passed: 5, failed: 0}\n").unwrap();

        let badge = generate_badge(&BadgeOptions {
            history_path: path,
            label: "tests".into(),
        })
        .unwrap();
        assert!(badge.svg.contains(">tests<"));
        assert!(!badge.svg.contains(">TAF<"));
    }
}
