//! Envelope, validation and ownership helpers shared by the resource handlers.

use axum::{Json, http::StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use chapterhub_baas::Database;
use chapterhub_types::api::Envelope;

use crate::error::ApiError;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub chapter_id: Option<Uuid>,
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope::ok(data))
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, Json(Envelope::ok(data)))
}

/// Every named field must be non-blank.
pub fn require(fields: &[(&str, &str)]) -> Result<(), ApiError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Missing required field(s): {}",
            missing.join(", ")
        )))
    }
}

/// Fields that are optional in an update but may not be set to blank.
pub fn reject_blank(fields: &[(&str, Option<&str>)]) -> Result<(), ApiError> {
    for (name, value) in fields {
        if value.is_some_and(|v| v.trim().is_empty()) {
            return Err(ApiError::BadRequest(format!("{name} cannot be empty")));
        }
    }
    Ok(())
}

/// Serialize a partial update. Absent fields are left out; `updated_at` is
/// stamped when `stamp` is set. An update with nothing in it is a 400.
pub fn patch_body<T: Serialize>(req: &T, stamp: bool) -> Result<Value, ApiError> {
    let mut body =
        serde_json::to_value(req).map_err(|e| ApiError::Internal(format!("encode patch: {e}")))?;
    let Some(fields) = body.as_object_mut() else {
        return Err(ApiError::Internal("patch body is not an object".into()));
    };
    if fields.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".into()));
    }
    if stamp {
        fields.insert(
            "updated_at".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }
    Ok(body)
}

/// 404 when the row is missing, 403 when `owner_column` isn't `user_id`.
pub async fn ensure_owner(
    db: &Database,
    table: &str,
    owner_column: &str,
    id: Uuid,
    user_id: Uuid,
) -> Result<(), ApiError> {
    let row: Value = db
        .from(table)
        .select(&format!("id,{owner_column}"))
        .eq("id", id)
        .maybe_single()
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No {} with id {}", singular(table), id)))?;

    let owner = row
        .get(owner_column)
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Uuid>().ok());

    if owner != Some(user_id) {
        warn!("User {} denied write to {} {}", user_id, table, id);
        return Err(ApiError::Forbidden(format!(
            "You can only modify your own {}",
            table.replace('_', " ")
        )));
    }
    Ok(())
}

fn singular(table: &str) -> &str {
    table.strip_suffix('s').unwrap_or(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chapterhub_types::api::UpdateTeamRequest;

    #[test]
    fn require_lists_every_blank_field() {
        let err = require(&[("title", " "), ("content", "x"), ("event_date", "")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required field(s): title, event_date"
        );
        assert!(require(&[("title", "ok")]).is_ok());
    }

    #[test]
    fn empty_patch_is_rejected() {
        let err = patch_body(&UpdateTeamRequest::default(), true).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn patch_keeps_only_present_fields() {
        let req = UpdateTeamRequest {
            league: Some("EPL".into()),
            ..Default::default()
        };
        let body = patch_body(&req, false).unwrap();
        assert_eq!(body, serde_json::json!({"league": "EPL"}));

        let stamped = patch_body(&req, true).unwrap();
        assert!(stamped.get("updated_at").is_some());
    }

    #[test]
    fn blank_update_fields_are_rejected() {
        assert!(reject_blank(&[("name", Some("  "))]).is_err());
        assert!(reject_blank(&[("name", None), ("league", Some("MLS"))]).is_ok());
    }

    #[test]
    fn list_limit_is_clamped() {
        let q = ListQuery {
            chapter_id: None,
            limit: Some(10_000),
        };
        assert_eq!(q.limit(), MAX_LIMIT);
        assert_eq!(ListQuery::default().limit(), DEFAULT_LIMIT);
    }
}
