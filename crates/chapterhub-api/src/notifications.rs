use axum::{
    Extension,
    extract::State,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use chapterhub_types::api::{CreateNotificationRequest, UpdateNotificationRequest};
use chapterhub_types::models::NotificationRow;

use crate::common::{
    DEFAULT_LIMIT, MAX_LIMIT, created, ensure_owner, ok, patch_body, reject_blank, require,
};
use crate::error::{ApiError, ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::state::AppState;

const TABLE: &str = "notifications";

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
    pub limit: Option<usize>,
}

/// GET /api/notifications: addressed to the caller or broadcast, newest first.
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<NotificationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.baas.as_user(&user.token);
    let mut q = db
        .from(TABLE)
        .or(&format!(
            "recipient_id.eq.{},recipient_id.is.null",
            user.id
        ))
        .order("created_at", false)
        .limit(query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT));
    if query.unread {
        q = q.eq("is_read", false);
    }

    let rows: Vec<NotificationRow> = q.fetch().await?;
    Ok(ok(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(mut req): ApiJson<CreateNotificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require(&[("title", req.title.as_str()), ("message", req.message.as_str())])?;
    req.sender_id = Some(user.id);

    let row: NotificationRow = state
        .baas
        .as_user(&user.token)
        .from(TABLE)
        .insert(&req)
        .await?;

    match row.recipient_id {
        Some(to) => info!("Notification {} sent by {} to {}", row.id, user.id, to),
        None => info!("Notification {} broadcast by {}", row.id, user.id),
    }
    Ok(created(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateNotificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    reject_blank(&[
        ("title", req.title.as_deref()),
        ("message", req.message.as_deref()),
    ])?;
    let body = patch_body(&req, false)?;

    let db = state.baas.as_user(&user.token);
    ensure_owner(&db, TABLE, "sender_id", id, user.id).await?;

    let rows: Vec<NotificationRow> = db
        .from(TABLE)
        .eq("id", id)
        .eq("sender_id", user.id)
        .update(&body)
        .await?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound("Notification not found".into()))?;
    Ok(ok(row))
}

/// PUT /api/notifications/{id}/read. Only the addressee can mark a
/// notification read; broadcasts have no addressee and are left alone.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let rows: Vec<NotificationRow> = state
        .baas
        .as_user(&user.token)
        .from(TABLE)
        .eq("id", id)
        .eq("recipient_id", user.id)
        .update(&json!({ "is_read": true }))
        .await?;

    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound("Notification not found".into()))?;
    Ok(ok(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.baas.as_user(&user.token);
    ensure_owner(&db, TABLE, "sender_id", id, user.id).await?;

    db.from(TABLE)
        .eq("id", id)
        .eq("sender_id", user.id)
        .delete_quiet()
        .await?;

    info!("Notification {} deleted by {}", id, user.id);
    Ok(ok(json!({ "id": id })))
}
