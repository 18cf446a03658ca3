use axum::{
    Extension,
    extract::State,
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use chapterhub_types::api::{CreateAnnouncementRequest, UpdateAnnouncementRequest};
use chapterhub_types::models::AnnouncementRow;

use crate::common::{ListQuery, created, ensure_owner, ok, patch_body, reject_blank, require};
use crate::error::{ApiError, ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::state::AppState;

const TABLE: &str = "announcements";

/// GET /api/announcements: newest first, optionally scoped to a chapter.
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.baas.as_user(&user.token);
    let mut q = db
        .from(TABLE)
        .order("created_at", false)
        .limit(query.limit());
    if let Some(chapter_id) = query.chapter_id {
        q = q.eq("chapter_id", chapter_id);
    }

    let rows: Vec<AnnouncementRow> = q.fetch().await?;
    Ok(ok(rows))
}

/// GET /api/app/announcements: pinned first, then newest.
pub async fn app_list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.baas.as_user(&user.token);
    let mut q = db
        .from(TABLE)
        .order("is_pinned", false)
        .order("created_at", false)
        .limit(query.limit());
    if let Some(chapter_id) = query.chapter_id {
        q = q.eq("chapter_id", chapter_id);
    }

    let mut rows: Vec<AnnouncementRow> = q.fetch().await?;
    // Stable, so the store's recency order survives within each group.
    rows.sort_by_key(|r| !r.is_pinned);
    Ok(ok(rows))
}

pub async fn get_one(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row: AnnouncementRow = state
        .baas
        .as_user(&user.token)
        .from(TABLE)
        .eq("id", id)
        .maybe_single()
        .await?
        .ok_or_else(|| ApiError::NotFound("Announcement not found".into()))?;
    Ok(ok(row))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(mut req): ApiJson<CreateAnnouncementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require(&[("title", req.title.as_str()), ("content", req.content.as_str())])?;
    req.author_id = Some(user.id);

    let row: AnnouncementRow = state
        .baas
        .as_user(&user.token)
        .from(TABLE)
        .insert(&req)
        .await?;

    info!("Announcement {} created by {}", row.id, user.id);
    Ok(created(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateAnnouncementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    reject_blank(&[
        ("title", req.title.as_deref()),
        ("content", req.content.as_deref()),
    ])?;
    let body = patch_body(&req, true)?;

    let db = state.baas.as_user(&user.token);
    ensure_owner(&db, TABLE, "author_id", id, user.id).await?;

    let rows: Vec<AnnouncementRow> = db
        .from(TABLE)
        .eq("id", id)
        .eq("author_id", user.id)
        .update(&body)
        .await?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound("Announcement not found".into()))?;

    info!("Announcement {} updated by {}", id, user.id);
    Ok(ok(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.baas.as_user(&user.token);
    ensure_owner(&db, TABLE, "author_id", id, user.id).await?;

    db.from(TABLE)
        .eq("id", id)
        .eq("author_id", user.id)
        .delete_quiet()
        .await?;

    info!("Announcement {} deleted by {}", id, user.id);
    Ok(ok(json!({ "id": id })))
}
