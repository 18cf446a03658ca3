use axum::{Extension, extract::State, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use tracing::{info, warn};

use chapterhub_baas::{BaasError, SignUp};
use chapterhub_types::api::{
    AuthUser as SessionUser, LoginRequest, MeResponse, RefreshRequest, Session, SessionResponse,
    SignupRequest,
};
use chapterhub_types::models::ProfileRow;

use crate::common::{created, ok, require};
use crate::error::{ApiError, ApiJson};
use crate::middleware::{
    ACCESS_COOKIE, AuthUser, clear_session_cookies, set_session_cookies,
};
use crate::state::{AppState, AppStateInner};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Wrong email/password and expired refresh tokens come back from the auth
/// service as 400s; to API callers they are all failed authentication.
fn auth_failure(err: BaasError, fallback: &str) -> ApiError {
    match err.status() {
        Some(400 | 401 | 403 | 422) => ApiError::Unauthorized(fallback.to_string()),
        _ => err.into(),
    }
}

/// Profile for a fresh session. The admin client sees every profile; without
/// it the caller's own token is used. Lookup failures never fail the login.
async fn load_profile(state: &AppStateInner, session: &Session) -> Option<ProfileRow> {
    let db = match state.baas.admin() {
        Ok(db) => db,
        Err(_) => state.baas.as_user(&session.access_token),
    };

    match db
        .from("profiles")
        .eq("id", session.user.id)
        .maybe_single::<ProfileRow>()
        .await
    {
        Ok(profile) => profile,
        Err(e) => {
            warn!("Profile lookup for {} failed: {}", session.user.id, e);
            None
        }
    }
}

/// POST /api/app/auth/login
pub async fn app_login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require(&[("email", req.email.as_str()), ("password", req.password.as_str())])?;

    let session = state
        .baas
        .auth()
        .sign_in_with_password(req.email.trim(), &req.password)
        .await
        .map_err(|e| auth_failure(e, "Invalid email or password"))?;

    let profile = load_profile(&state, &session).await;
    info!("User {} logged in", session.user.id);
    Ok(ok(SessionResponse { session, profile }))
}

/// POST /api/app/auth/refresh
pub async fn app_refresh(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require(&[("refresh_token", req.refresh_token.as_str())])?;

    let session = state
        .baas
        .auth()
        .refresh_session(&req.refresh_token)
        .await
        .map_err(|e| auth_failure(e, "Invalid or expired refresh token"))?;

    let profile = load_profile(&state, &session).await;
    Ok(ok(SessionResponse { session, profile }))
}

/// POST /api/app/auth/signup. Projects with email confirmation enabled get
/// no session back until the address is confirmed.
pub async fn app_signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require(&[("email", req.email.as_str()), ("password", req.password.as_str())])?;
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let full_name = req
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let outcome = state
        .baas
        .auth()
        .sign_up(req.email.trim(), &req.password, full_name)
        .await?;

    let body = match outcome {
        SignUp::Session(session) => {
            let profile = load_profile(&state, &session).await;
            json!(SessionResponse { session, profile })
        }
        SignUp::PendingConfirmation(user) => {
            json!({ "user": user, "confirmation_required": true })
        }
    };
    Ok(created(body))
}

/// POST /api/app/auth/logout: revokes the session's refresh tokens.
pub async fn app_logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    state.baas.auth().sign_out(&user.token).await?;
    info!("User {} logged out", user.id);
    Ok(ok(json!({ "logged_out": true })))
}

/// GET /api/app/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let profile: Option<ProfileRow> = state
        .baas
        .as_user(&user.token)
        .from("profiles")
        .eq("id", user.id)
        .maybe_single()
        .await?;

    Ok(ok(MeResponse {
        user: SessionUser {
            id: user.id,
            email: user.email,
        },
        profile,
    }))
}

// -- Admin portal --

/// POST /api/auth/login: password login for the portal. The session is kept
/// in HTTP-only cookies rather than returned to scripts.
pub async fn portal_login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require(&[("email", req.email.as_str()), ("password", req.password.as_str())])?;

    let session = state
        .baas
        .auth()
        .sign_in_with_password(req.email.trim(), &req.password)
        .await
        .map_err(|e| auth_failure(e, "Invalid email or password"))?;

    let profile = load_profile(&state, &session).await;
    let jar = set_session_cookies(jar, &session, state.config.secure_cookies);
    info!("Portal login for {}", session.user.id);

    Ok((jar, ok(json!({ "user": session.user, "profile": profile }))))
}

/// POST /api/auth/logout: clears the cookies; the session is revoked too
/// when one is present.
pub async fn portal_logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> impl IntoResponse {
    if let Some(token) = jar.get(ACCESS_COOKIE).map(|c| c.value().to_string()) {
        if let Err(e) = state.baas.auth().sign_out(&token).await {
            warn!("Portal sign-out failed: {}", e);
        }
    }
    (clear_session_cookies(jar), ok(json!({ "logged_out": true })))
}
