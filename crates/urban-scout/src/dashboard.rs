//! Read-side shaping of stored scans: report recovery, map marker colours,
//! summary statistics and CSV export.

use std::io::Write;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::{Report, Scan, Severity};

pub const NO_REPORT_SUMMARY: &str = "No report available";
const PLAIN_SUMMARY_CHARS: usize = 200;
const POPUP_SUMMARY_CHARS: usize = 100;

pub const CSV_HEADER: &str =
    "scan_id,latitude,longitude,created_at,summary,issues_count,high_severity_count";

static RE_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Recovers a report from stored text: whole JSON, then the outermost
/// `{...}` block, then the text itself as a truncated summary.
pub fn parse_stored_report(text: &str) -> Report {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Report::new(NO_REPORT_SUMMARY, Vec::new());
    }

    if let Some(report) = report_from_json(trimmed) {
        return report;
    }
    if let Some(block) = RE_OBJECT.find(trimmed) {
        if let Some(report) = report_from_json(block.as_str()) {
            return report;
        }
    }

    Report::new(truncate_chars(trimmed, PLAIN_SUMMARY_CHARS), Vec::new())
}

fn report_from_json(text: &str) -> Option<Report> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let head: String = text.chars().take(limit).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// The report to display for a scan. Falls back to the serialized text when
/// the structured copy is blank.
pub fn scan_report(scan: &Scan) -> Report {
    let structured = &scan.llm_report_structured;
    if structured.summary.is_empty() && structured.issues.is_empty() {
        parse_stored_report(&scan.llm_report)
    } else {
        structured.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerColor {
    Red,
    Orange,
    Yellow,
    Green,
}

impl MarkerColor {
    pub fn for_report(report: &Report) -> Self {
        if report.count_severity(Severity::High) > 0 {
            MarkerColor::Red
        } else if report.count_severity(Severity::Medium) > 0 {
            MarkerColor::Orange
        } else if !report.issues.is_empty() {
            MarkerColor::Yellow
        } else {
            MarkerColor::Green
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerColor::Red => "red",
            MarkerColor::Orange => "orange",
            MarkerColor::Yellow => "yellow",
            MarkerColor::Green => "green",
        }
    }
}

/// One map pin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanMarker {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub color: MarkerColor,
    pub tooltip: String,
    pub popup: String,
}

impl ScanMarker {
    pub fn from_scan(scan: &Scan) -> Self {
        let report = scan_report(scan);
        let issues = report.issues.len();
        Self {
            id: scan.id,
            latitude: scan.latitude,
            longitude: scan.longitude,
            color: MarkerColor::for_report(&report),
            tooltip: format!("Scan {} - {} issues", scan.id, issues),
            popup: truncate_chars(&report.summary, POPUP_SUMMARY_CHARS),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_scans: usize,
    pub total_issues: usize,
    pub high_severity: usize,
}

impl DashboardStats {
    pub fn from_scans(scans: &[Scan]) -> Self {
        scans.iter().fold(
            DashboardStats {
                total_scans: scans.len(),
                ..Default::default()
            },
            |mut stats, scan| {
                let report = scan_report(scan);
                stats.total_issues += report.issues.len();
                stats.high_severity += report.count_severity(Severity::High);
                stats
            },
        )
    }
}

/// `road_damage` → `Road Damage`.
pub fn display_issue_type(issue_type: &str) -> String {
    issue_type
        .split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn csv_row(scan: &Scan) -> String {
    let report = scan_report(scan);
    [
        scan.id.to_string(),
        scan.latitude.to_string(),
        scan.longitude.to_string(),
        scan.created_at.to_rfc3339(),
        csv_field(&report.summary),
        report.issues.len().to_string(),
        report.count_severity(Severity::High).to_string(),
    ]
    .join(",")
}

/// Writes the header and one row per scan.
pub fn write_csv<W: Write>(mut out: W, scans: &[Scan]) -> std::io::Result<()> {
    writeln!(out, "{}", CSV_HEADER)?;
    for scan in scans {
        writeln!(out, "{}", csv_row(scan))?;
    }
    out.flush()
}

/// Default export filename: `urban_maintenance_scans_{YYYYmmdd_HHMMSS}.csv`.
pub fn export_filename() -> String {
    format!(
        "urban_maintenance_scans_{}.csv",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}
