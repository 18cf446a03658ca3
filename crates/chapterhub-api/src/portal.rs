//! Admin portal: static pages behind a cookie session gate.

use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tower_http::services::ServeDir;
use tracing::debug;

use crate::middleware::{
    ACCESS_COOKIE, REFRESH_COOKIE, clear_session_cookies, set_session_cookies, verify_token,
};
use crate::state::{AppState, AppStateInner};

/// Where a request should be sent instead of being served, if anywhere.
pub fn gate_redirect(path: &str, authenticated: bool) -> Option<String> {
    let admin_area = path == "/admin" || path.starts_with("/admin/");
    let auth_page = matches!(path, "/login" | "/login/" | "/signup" | "/signup/");

    if admin_area && !authenticated {
        Some(format!("/login?next={path}"))
    } else if auth_page && authenticated {
        Some("/admin".to_string())
    } else {
        None
    }
}

/// Work out whether the cookies carry a live session, refreshing it when only
/// the refresh token is still good. Returns the jar with any cookie changes.
async fn resolve_session(state: &AppStateInner, jar: CookieJar) -> (bool, CookieJar) {
    let access = jar.get(ACCESS_COOKIE).map(|c| c.value().to_string());
    if let Some(token) = access.as_deref() {
        if verify_token(token, &state.config.jwt_secret).is_ok() {
            return (true, jar);
        }
    }

    let Some(refresh) = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()) else {
        return (false, jar);
    };

    match state.baas.auth().refresh_session(&refresh).await {
        Ok(session) => {
            debug!("Refreshed portal session for {}", session.user.id);
            (true, set_session_cookies(jar, &session, state.config.secure_cookies))
        }
        Err(e) => {
            debug!("Portal session refresh failed: {}", e);
            (false, clear_session_cookies(jar))
        }
    }
}

pub async fn session_gate(
    State(state): State<AppState>,
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Response {
    let (authenticated, jar) = resolve_session(&state, jar).await;

    if let Some(target) = gate_redirect(req.uri().path(), authenticated) {
        debug!("Session gate: {} -> {}", req.uri().path(), target);
        return (jar, Redirect::temporary(&target)).into_response();
    }

    let response = next.run(req).await;
    (jar, response).into_response()
}

/// Everything outside `/api`: portal pages from the public directory.
pub fn router(state: AppState) -> Router {
    let pages = ServeDir::new(&state.config.public_dir).append_index_html_on_directories(true);

    Router::new()
        .fallback_service(pages)
        .layer(middleware::from_fn_with_state(state, session_gate))
}
