//! Recovery of a `{summary, issues}` object from free-form model output.
//!
//! Each strategy is a pure function that either yields a report or `None`;
//! [`extract_report`] tries them in order and falls back to a fixed report.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::models::{Issue, Report, Severity};

pub const PARSE_FAILURE_SUMMARY: &str =
    "Could not parse AI analysis. Please review the detection data manually.";

/// Loosest first: from the first `{` to the last `}` around both keys.
static RE_LOOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\{.*["']summary["'].*["']issues["'].*\}"#).unwrap()
});

/// Tightest: a flat object whose `issues` array closes the object.
static RE_TIGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\{[^{}]*["']summary["'][^{}]*["']issues["']\s*:\s*\[.*?\]\s*\}"#).unwrap()
});

static RE_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']summary["']\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap()
});

/// A named extraction stage.
pub struct Strategy {
    pub name: &'static str,
    pub run: fn(&str) -> Option<Report>,
}

/// All stages, in the order they are tried.
pub const STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "direct_json",
        run: parse_direct,
    },
    Strategy {
        name: "embedded_json",
        run: parse_embedded_json,
    },
    Strategy {
        name: "embedded_literal",
        run: parse_embedded_literal,
    },
    Strategy {
        name: "summary_only",
        run: parse_summary_only,
    },
];

/// Runs the cascade. Returns the report and the name of the stage that
/// produced it (`"fallback"` when none did).
pub fn extract_report(text: &str) -> (Report, &'static str) {
    for strategy in STRATEGIES {
        if let Some(report) = (strategy.run)(text) {
            return (report, strategy.name);
        }
    }
    (fallback_report(), "fallback")
}

pub fn fallback_report() -> Report {
    Report::new(PARSE_FAILURE_SUMMARY, Vec::new())
}

/// Stage 1: the whole trimmed response is the object.
pub fn parse_direct(text: &str) -> Option<Report> {
    serde_json::from_str::<Value>(text.trim())
        .ok()
        .and_then(|v| report_from_value(&v))
}

/// Stage 2: JSON objects embedded in surrounding prose.
pub fn parse_embedded_json(text: &str) -> Option<Report> {
    candidates(text)
        .iter()
        .filter_map(|c| serde_json::from_str::<Value>(c).ok())
        .find_map(|v| report_from_value(&v))
}

/// Stage 3: embedded candidates written as Python-style literals.
pub fn parse_embedded_literal(text: &str) -> Option<Report> {
    candidates(text)
        .iter()
        .filter_map(|c| literal_to_json(c))
        .filter_map(|json| serde_json::from_str::<Value>(&json).ok())
        .find_map(|v| report_from_value(&v))
}

/// Stage 4: only a `"summary": "..."` pair is recoverable.
pub fn parse_summary_only(text: &str) -> Option<Report> {
    let raw = RE_SUMMARY.captures(text)?.get(1)?.as_str();
    let summary = serde_json::from_str::<String>(&format!("\"{}\"", raw))
        .unwrap_or_else(|_| raw.to_string());
    Some(Report::new(summary, Vec::new()))
}

/// Substrings that might hold the report object: regex matches from loosest
/// to tightest, then the first brace-balanced object.
fn candidates(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut push = |s: &str| {
        if !found.iter().any(|f| f == s) {
            found.push(s.to_string());
        }
    };

    for re in [&*RE_LOOSE, &*RE_TIGHT] {
        for m in re.find_iter(text) {
            push(m.as_str());
        }
    }
    if let Some(balanced) = first_balanced_object(text) {
        push(balanced);
    }
    found
}

/// Finds the first `{...}` with balanced braces, skipping braces inside
/// double-quoted strings.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Rewrites Python literal syntax into JSON: single-quoted strings,
/// `True`/`False`/`None`, and trailing commas. Returns `None` on an
/// unterminated string.
fn literal_to_json(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                let quote = c;
                out.push('"');
                let mut closed = false;
                while let Some(inner) = chars.next() {
                    match inner {
                        '\\' => match chars.next()? {
                            '\'' => out.push('\''),
                            escaped => {
                                out.push('\\');
                                out.push(escaped);
                            }
                        },
                        '"' if quote == '\'' => out.push_str("\\\""),
                        ch if ch == quote => {
                            closed = true;
                            break;
                        }
                        '\n' => out.push_str("\\n"),
                        ch => out.push(ch),
                    }
                }
                if !closed {
                    return None;
                }
                out.push('"');
            }
            ',' => {
                let mut lookahead = chars.clone();
                while lookahead.peek().is_some_and(|ch| ch.is_whitespace()) {
                    lookahead.next();
                }
                if !matches!(lookahead.peek(), Some('}') | Some(']')) {
                    out.push(',');
                }
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// Accepts an object only when it has both `summary` and `issues`.
fn report_from_value(value: &Value) -> Option<Report> {
    let obj = value.as_object()?;
    if !obj.contains_key("summary") || !obj.contains_key("issues") {
        return None;
    }

    let summary = match &obj["summary"] {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    let issues = obj["issues"]
        .as_array()
        .map(|items| items.iter().filter_map(issue_from_value).collect())
        .unwrap_or_default();

    Some(Report::new(summary, issues))
}

fn issue_from_value(value: &Value) -> Option<Issue> {
    let obj: &Map<String, Value> = value.as_object()?;
    let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

    Some(Issue {
        issue_type: text("type").unwrap_or_else(|| "unknown".to_string()),
        severity: text("severity")
            .map(|s| Severity::parse(&s))
            .unwrap_or_default(),
        description: text("description").unwrap_or_default(),
    })
}
