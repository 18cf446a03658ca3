//! UX audit pipeline: fetch a page, have a model review it against usability
//! heuristics, then have a second call merge the findings and score the page.
//!
//! Each run is a single sequential pass. Nothing is cached or retried.

pub mod analyze;
pub mod fetch;
pub mod score;

use genai::Client as GenAIClient;
use genai::chat::{ChatMessage, ChatRequest};
use thiserror::Error;
use tracing::info;

use chapterhub_types::audit::{AuditErrorCode, AuditIssue, AuditReport};

use crate::score::Merged;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("A URL is required")]
    MissingInput,

    #[error("Could not fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Audit failed: {0}")]
    Pipeline(String),
}

impl AuditError {
    pub fn code(&self) -> AuditErrorCode {
        match self {
            Self::MissingInput => AuditErrorCode::MissingInput,
            Self::Fetch { .. } => AuditErrorCode::FetchError,
            Self::Pipeline(_) => AuditErrorCode::PipelineError,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Model for the heuristic review, e.g. `gpt-4o-mini` or `claude-3-5-haiku-latest`.
    pub analyze_model: String,
    /// Model for merge and scoring.
    pub merge_model: String,
}

#[derive(Clone)]
pub struct Auditor {
    http: reqwest::Client,
    genai: GenAIClient,
    config: AuditConfig,
}

impl Auditor {
    /// Provider API keys are read by the model client from the provider's
    /// usual environment variable.
    pub fn new(config: AuditConfig) -> reqwest::Result<Self> {
        Ok(Self {
            http: fetch::page_client()?,
            genai: GenAIClient::default(),
            config,
        })
    }

    pub async fn audit(&self, raw_url: Option<&str>) -> Result<AuditReport, AuditError> {
        let raw_url = raw_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(AuditError::MissingInput)?;
        let url = fetch::normalize_url(raw_url)?;

        info!("Auditing {}", url);
        let html = fetch::fetch_html(&self.http, &url).await?;
        let page = fetch::prepare_html(&html);

        let issues = self.analyze(url.as_str(), &page).await?;
        let merged = if issues.is_empty() {
            Merged::clean()
        } else {
            self.merge(&issues).await?
        };

        info!(
            "Audit of {} scored {} with {} issue(s)",
            url,
            merged.score,
            merged.issues.len()
        );

        Ok(AuditReport {
            url: url.to_string(),
            score: merged.score,
            summary: merged.summary,
            issue_count: merged.issues.len(),
            issues: merged.issues,
            analyzed_at: chrono::Utc::now(),
        })
    }

    async fn analyze(&self, url: &str, page: &str) -> Result<Vec<AuditIssue>, AuditError> {
        let reply = self
            .complete(
                &self.config.analyze_model,
                analyze::ANALYZE_PROMPT,
                analyze::user_message(url, page),
            )
            .await?;
        analyze::parse_issues(&reply)
    }

    async fn merge(&self, issues: &[AuditIssue]) -> Result<Merged, AuditError> {
        let payload = serde_json::to_string(issues)
            .map_err(|e| AuditError::Pipeline(format!("could not encode issues: {e}")))?;
        let reply = self
            .complete(&self.config.merge_model, score::MERGE_PROMPT, payload)
            .await?;
        score::parse_merge(&reply, issues)
    }

    async fn complete(&self, model: &str, system: &str, user: String) -> Result<String, AuditError> {
        let chat_req = ChatRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(user.as_str()),
        ]);

        let response = self
            .genai
            .exec_chat(model, chat_req, None)
            .await
            .map_err(|e| AuditError::Pipeline(format!("model call to {model} failed: {e}")))?;

        response
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| AuditError::Pipeline(format!("{model} returned an empty reply")))
    }
}
