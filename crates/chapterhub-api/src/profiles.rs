use axum::{Extension, extract::State, response::IntoResponse};

use chapterhub_types::api::UpdateProfileRequest;
use chapterhub_types::models::ProfileRow;

use crate::common::{ok, patch_body};
use crate::error::{ApiError, ApiJson};
use crate::middleware::AuthUser;
use crate::state::AppState;

const TABLE: &str = "profiles";

/// GET /api/profile
pub async fn get_mine(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let row: ProfileRow = state
        .baas
        .as_user(&user.token)
        .from(TABLE)
        .eq("id", user.id)
        .maybe_single()
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".into()))?;
    Ok(ok(row))
}

/// PUT /api/profile. `role` is not writable here.
pub async fn update_mine(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let body = patch_body(&req, true)?;

    let rows: Vec<ProfileRow> = state
        .baas
        .as_user(&user.token)
        .from(TABLE)
        .eq("id", user.id)
        .update(&body)
        .await?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound("Profile not found".into()))?;
    Ok(ok(row))
}
