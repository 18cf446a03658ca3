use axum::{
    Extension,
    extract::State,
    response::IntoResponse,
};
use uuid::Uuid;

use chapterhub_types::models::ChapterRow;

use crate::common::{ListQuery, ok};
use crate::error::{ApiError, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::state::AppState;

const TABLE: &str = "chapters";

// Chapters are managed in the backend console; the API only reads them.

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows: Vec<ChapterRow> = state
        .baas
        .as_user(&user.token)
        .from(TABLE)
        .order("name", true)
        .limit(query.limit())
        .fetch()
        .await?;
    Ok(ok(rows))
}

pub async fn get_one(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row: ChapterRow = state
        .baas
        .as_user(&user.token)
        .from(TABLE)
        .eq("id", id)
        .maybe_single()
        .await?
        .ok_or_else(|| ApiError::NotFound("Chapter not found".into()))?;
    Ok(ok(row))
}
