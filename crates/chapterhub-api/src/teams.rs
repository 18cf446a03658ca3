use axum::{
    Extension,
    extract::State,
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use chapterhub_types::api::{CreateTeamRequest, UpdateTeamRequest};
use chapterhub_types::models::TeamRow;

use crate::common::{ListQuery, created, ensure_owner, ok, patch_body, reject_blank, require};
use crate::error::{ApiError, ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::state::AppState;

const TABLE: &str = "teams";

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

    let rows: Vec<TeamRow> = q.fetch().await?;
    Ok(ok(rows))
}

pub async fn get_one(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row: TeamRow = state
        .baas
        .as_user(&user.token)
        .from(TABLE)
        .eq("id", id)
        .maybe_single()
        .await?
        .ok_or_else(|| ApiError::NotFound("Team not found".into()))?;
    Ok(ok(row))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(mut req): ApiJson<CreateTeamRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require(&[("name", req.name.as_str())])?;
    req.created_by = Some(user.id);

    let row: TeamRow = state
        .baas
        .as_user(&user.token)
        .from(TABLE)
        .insert(&req)
        .await?;

    info!("Team {} ({}) created by {}", row.id, row.name, user.id);
    Ok(created(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateTeamRequest>,
) -> Result<impl IntoResponse, ApiError> {
    reject_blank(&[("name", req.name.as_deref())])?;
    let body = patch_body(&req, false)?;

    let db = state.baas.as_user(&user.token);
    ensure_owner(&db, TABLE, "created_by", id, user.id).await?;

    let rows: Vec<TeamRow> = db
        .from(TABLE)
        .eq("id", id)
        .eq("created_by", user.id)
        .update(&body)
        .await?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound("Team not found".into()))?;
    Ok(ok(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.baas.as_user(&user.token);
    ensure_owner(&db, TABLE, "created_by", id, user.id).await?;

    db.from(TABLE)
        .eq("id", id)
        .eq("created_by", user.id)
        .delete_quiet()
        .await?;

    info!("Team {} deleted by {}", id, user.id);
    Ok(ok(json!({ "id": id })))
}
