use std::collections::HashSet;

use serde_json::Value;

use chapterhub_types::audit::{AuditIssue, Severity};

use crate::AuditError;
use crate::analyze::{extract_json, issues_from_value};

pub const MERGE_PROMPT: &str = r#"You will receive a JSON list of UX issues found on one web page.
Merge duplicates (same underlying problem, different wording), keep the most specific
element reference and the clearest recommendation, and keep the highest severity of
any merged group.

Then give the page an overall UX score from 0 (unusable) to 100 (excellent) and a
two-sentence summary.

Respond with JSON only, in exactly this shape:
{"issues": [ ...same fields as the input... ], "score": 0, "summary": "..."}"#;

#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub issues: Vec<AuditIssue>,
    pub score: u8,
    pub summary: String,
}

impl Merged {
    /// Outcome for a page with nothing to report; no merge call is needed.
    pub fn clean() -> Self {
        Self {
            issues: Vec::new(),
            score: 100,
            summary: "No usability issues were found.".to_string(),
        }
    }
}

fn penalty(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 25,
        Severity::High => 15,
        Severity::Medium => 8,
        Severity::Low => 3,
    }
}

/// Score derived from severities alone, used when the model gives none.
pub fn severity_score(issues: &[AuditIssue]) -> u8 {
    let total: u32 = issues.iter().map(|i| penalty(i.severity)).sum();
    100u32.saturating_sub(total) as u8
}

/// Drop issues repeating an earlier (heuristic, title) pair, case-insensitively.
pub fn dedupe(issues: Vec<AuditIssue>) -> Vec<AuditIssue> {
    let mut seen = HashSet::new();
    issues
        .into_iter()
        .filter(|i| {
            seen.insert((
                i.heuristic.trim().to_lowercase(),
                i.title.trim().to_lowercase(),
            ))
        })
        .collect()
}

fn read_score(value: Option<&Value>) -> Option<u8> {
    let raw = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, 100.0) as u8)
}

fn default_summary(issues: &[AuditIssue]) -> String {
    let severe = issues
        .iter()
        .filter(|i| i.severity >= Severity::High)
        .count();
    format!(
        "Found {} usability issue(s), {} of them high severity or worse.",
        issues.len(),
        severe
    )
}

/// Interpret the merge reply. `original` backs the result up when the model
/// returns no issues for a page that had some.
pub fn parse_merge(reply: &str, original: &[AuditIssue]) -> Result<Merged, AuditError> {
    let value = extract_json(reply)
        .ok_or_else(|| AuditError::Pipeline("merge reply was not valid JSON".into()))?;
    if !value.is_object() {
        return Err(AuditError::Pipeline("merge reply was not an object".into()));
    }

    let mut issues = issues_from_value(&value)?;
    if issues.is_empty() {
        issues = original.to_vec();
    }
    let issues = dedupe(issues);

    let score = read_score(value.get("score")).unwrap_or_else(|| severity_score(&issues));
    let summary = value
        .get("summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_summary(&issues));

    Ok(Merged {
        issues,
        score,
        summary,
    })
}
