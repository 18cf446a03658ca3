use axum::{body::Bytes, extract::State, response::IntoResponse};
use tracing::{debug, info};

use chapterhub_types::audit::AuditRequest;

use crate::common::ok;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/audit
///
/// The body is read leniently: an empty or malformed body is treated as a
/// request without a URL, which the auditor reports as `MISSING_INPUT`.
pub async fn run(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse, ApiError> {
    let req: AuditRequest = serde_json::from_slice(&body).unwrap_or_else(|e| {
        debug!("Unreadable audit body: {}", e);
        AuditRequest::default()
    });

    let report = state.auditor.audit(req.url.as_deref()).await?;
    info!(
        "Audited {} (score {}, {} issues)",
        report.url, report.score, report.issue_count
    );
    Ok(ok(report))
}
