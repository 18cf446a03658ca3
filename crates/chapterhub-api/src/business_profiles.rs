use axum::{
    Extension,
    extract::State,
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use chapterhub_types::api::{CreateBusinessProfileRequest, UpdateBusinessProfileRequest};
use chapterhub_types::models::BusinessProfileRow;

use crate::common::{ListQuery, created, ensure_owner, ok, patch_body, reject_blank, require};
use crate::error::{ApiError, ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::state::AppState;

const TABLE: &str = "business_profiles";

/// GET /api/business-profiles: directory listing, alphabetical.
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.baas.as_user(&user.token);
    let mut q = db.from(TABLE).order("name", true).limit(query.limit());
    if let Some(chapter_id) = query.chapter_id {
        q = q.eq("chapter_id", chapter_id);
    }

    let rows: Vec<BusinessProfileRow> = q.fetch().await?;
    Ok(ok(rows))
}

pub async fn get_one(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row: BusinessProfileRow = state
        .baas
        .as_user(&user.token)
        .from(TABLE)
        .eq("id", id)
        .maybe_single()
        .await?
        .ok_or_else(|| ApiError::NotFound("Business profile not found".into()))?;
    Ok(ok(row))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(mut req): ApiJson<CreateBusinessProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require(&[("name", req.name.as_str())])?;
    req.owner_id = Some(user.id);

    let row: BusinessProfileRow = state
        .baas
        .as_user(&user.token)
        .from(TABLE)
        .insert(&req)
        .await?;

    info!("Business profile {} created by {}", row.id, user.id);
    Ok(created(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateBusinessProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    reject_blank(&[("name", req.name.as_deref())])?;
    let body = patch_body(&req, true)?;

    let db = state.baas.as_user(&user.token);
    ensure_owner(&db, TABLE, "owner_id", id, user.id).await?;

    let rows: Vec<BusinessProfileRow> = db
        .from(TABLE)
        .eq("id", id)
        .eq("owner_id", user.id)
        .update(&body)
        .await?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound("Business profile not found".into()))?;

    info!("Business profile {} updated by {}", id, user.id);
    Ok(ok(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.baas.as_user(&user.token);
    ensure_owner(&db, TABLE, "owner_id", id, user.id).await?;

    db.from(TABLE)
        .eq("id", id)
        .eq("owner_id", user.id)
        .delete_quiet()
        .await?;

    info!("Business profile {} deleted by {}", id, user.id);
    Ok(ok(json!({ "id": id })))
}
