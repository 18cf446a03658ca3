use serde_json::Value;
use tracing::warn;

use chapterhub_types::audit::AuditIssue;

use crate::AuditError;

pub const ANALYZE_PROMPT: &str = r#"You are a senior UX reviewer. You will receive the HTML of a single web page.
Evaluate it against Nielsen's ten usability heuristics and WCAG 2.1 AA basics
(visibility of system status, match with the real world, user control, consistency,
error prevention, recognition over recall, flexibility, minimalist design, error recovery,
help and documentation, colour contrast, alt text, labels, keyboard access, headings).

Respond with JSON only, no prose, in exactly this shape:
{"issues": [{"heuristic": "...", "title": "...", "description": "...",
"severity": "low|medium|high|critical", "element": "CSS selector or snippet",
"recommendation": "..."}]}

Report only problems you can point to in the markup. Return {"issues": []} if there are none."#;

pub fn user_message(url: &str, page: &str) -> String {
    format!("URL: {url}\n\nHTML:\n{page}")
}

/// Pull the JSON payload out of a model reply that may wrap it in a code
/// fence or surround it with prose.
pub fn extract_json(reply: &str) -> Option<Value> {
    let trimmed = reply.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let body = strip_fence(trimmed);
    if let Ok(value) = serde_json::from_str(body) {
        return Some(value);
    }

    // Fall back to the outermost object or array in the text.
    let (open, close) = match (body.find('{'), body.find('[')) {
        (Some(o), Some(a)) if a < o => ('[', ']'),
        (Some(_), _) => ('{', '}'),
        (None, Some(_)) => ('[', ']'),
        (None, None) => return None,
    };
    let start = body.find(open)?;
    let end = body.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&body[start..=end]).ok()
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the info string (e.g. `json`) up to the first newline.
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Issues from a reply shaped `{"issues": [...]}` or a bare array.
/// Entries that don't decode, or carry neither title nor description, are skipped.
pub fn parse_issues(reply: &str) -> Result<Vec<AuditIssue>, AuditError> {
    let value = extract_json(reply)
        .ok_or_else(|| AuditError::Pipeline("model reply was not valid JSON".into()))?;
    issues_from_value(&value)
}

pub(crate) fn issues_from_value(value: &Value) -> Result<Vec<AuditIssue>, AuditError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("issues") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(_) => {
                return Err(AuditError::Pipeline("`issues` is not a list".into()));
            }
        },
        _ => return Err(AuditError::Pipeline("unexpected reply shape".into())),
    };

    let mut issues = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<AuditIssue>(item.clone()) {
            Ok(issue) if !(issue.title.trim().is_empty() && issue.description.trim().is_empty()) => {
                issues.push(issue)
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping malformed audit issue: {}", e),
        }
    }
    Ok(issues)
}
