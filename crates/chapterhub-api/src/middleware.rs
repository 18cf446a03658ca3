use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, warn};
use uuid::Uuid;

use chapterhub_types::api::{Claims, Session};

use crate::error::ApiError;
use crate::state::AppState;

pub const ACCESS_COOKIE: &str = "sb-access-token";
pub const REFRESH_COOKIE: &str = "sb-refresh-token";

/// Origins always allowed to call the API: the admin portal and the mobile
/// app's dev servers.
pub const DEFAULT_ORIGINS: [&str; 3] = [
    "http://localhost:3000",
    "http://localhost:8081",
    "http://localhost:19006",
];

/// Caller identity attached to every authenticated request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
    /// Raw access token, forwarded so row access runs with the caller's permissions.
    pub token: String,
}

/// Verify an access token issued by the auth service.
pub fn verify_token(token: &str, secret: &str) -> jsonwebtoken::errors::Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&["authenticated"]);

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
}

/// Bearer token from `Authorization`, falling back to the session cookie.
fn request_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(ACCESS_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// Reject requests without a valid session and attach [`AuthUser`] otherwise.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request_token(req.headers())
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".into()))?;

    let claims = verify_token(&token, &state.config.jwt_secret).map_err(|e| {
        debug!("Rejected access token: {}", e);
        ApiError::Unauthorized("Invalid or expired session".into())
    })?;

    req.extensions_mut().insert(AuthUser {
        id: claims.sub,
        email: claims.email,
        token,
    });
    Ok(next.run(req).await)
}

/// The fixed origin list plus the one supplied by configuration.
pub fn allowed_origins(extra: Option<&str>) -> Vec<HeaderValue> {
    let mut origins: Vec<&str> = DEFAULT_ORIGINS.to_vec();
    origins.extend(extra.map(str::trim).filter(|o| !o.is_empty()));

    origins
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring malformed allowed origin {:?}", origin);
                None
            }
        })
        .collect()
}

/// CORS for the API prefix. Unlisted origins get no CORS headers at all.
pub fn cors_layer(extra_origin: Option<&str>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins(extra_origin)))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// `secure` should only be off for plain-http development setups.
pub fn set_session_cookies(jar: CookieJar, session: &Session, secure: bool) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, session.access_token.clone(), secure))
        .add(session_cookie(REFRESH_COOKIE, session.refresh_token.clone(), secure))
}

pub fn clear_session_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-secret";

    fn token(aud: &str, exp_offset: i64) -> String {
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: Some("a@b.co".into()),
            role: Some("authenticated".into()),
            aud: Some(aud.into()),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_verifies() {
        let claims = verify_token(&token("authenticated", 3600), SECRET).unwrap();
        assert_eq!(claims.email.as_deref(), Some("a@b.co"));
    }

    #[test]
    fn wrong_audience_expiry_or_secret_fail() {
        assert!(verify_token(&token("anon", 3600), SECRET).is_err());
        assert!(verify_token(&token("authenticated", -3600), SECRET).is_err());
        assert!(verify_token(&token("authenticated", 3600), "other").is_err());
    }

    #[test]
    fn bearer_beats_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("sb-access-token=from-cookie"));
        assert_eq!(request_token(&headers).as_deref(), Some("from-cookie"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(request_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn extra_origin_is_appended() {
        let origins = allowed_origins(Some(" https://admin.example.org "));
        assert_eq!(origins.len(), 4);
        assert_eq!(origins[3], "https://admin.example.org");
        assert_eq!(allowed_origins(Some("")).len(), 3);
    }
}
