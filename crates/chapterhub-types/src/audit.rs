use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditRequest {
    #[serde(default)]
    pub url: Option<String>,
}

/// Stage-specific failure codes reported by the audit endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditErrorCode {
    MissingInput,
    FetchError,
    PipelineError,
}

impl AuditErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingInput => "MISSING_INPUT",
            Self::FetchError => "FETCH_ERROR",
            Self::PipelineError => "PIPELINE_ERROR",
        }
    }
}

/// Model output is free-form, so unknown labels decode as `Medium`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl From<String> for Severity {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" | "minor" | "cosmetic" => Self::Low,
            "high" | "major" | "serious" => Self::High,
            "critical" | "blocker" | "catastrophic" => Self::Critical,
            _ => Self::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditIssue {
    #[serde(default)]
    pub heuristic: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(default)]
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub url: String,
    pub score: u8,
    pub summary: String,
    pub issues: Vec<AuditIssue>,
    pub issue_count: usize,
    pub analyzed_at: DateTime<Utc>,
}
