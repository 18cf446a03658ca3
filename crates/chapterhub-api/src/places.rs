//! Thin proxy to the Google Maps web services so the key never reaches clients.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use tracing::debug;

use crate::error::{ApiError, ApiQuery};
use crate::state::AppState;

type Params = Vec<(String, String)>;

/// GET /api/places/autocomplete?input=...
pub async fn autocomplete(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<Params>,
) -> Result<Response, ApiError> {
    require_any(&params, &["input"])?;
    forward(&state, "place/autocomplete/json", params).await
}

/// GET /api/places/details?place_id=...
pub async fn details(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<Params>,
) -> Result<Response, ApiError> {
    require_any(&params, &["place_id"])?;
    forward(&state, "place/details/json", params).await
}

/// GET /api/places/geocode?address=... or ?latlng=...
pub async fn geocode(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<Params>,
) -> Result<Response, ApiError> {
    require_any(&params, &["address", "latlng"])?;
    forward(&state, "geocode/json", params).await
}

/// GET /api/places/static-map?center=...; relays the image bytes.
pub async fn static_map(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<Params>,
) -> Result<Response, ApiError> {
    require_any(&params, &["center"])?;
    forward(&state, "staticmap", params).await
}

/// At least one of `names` must be present and non-blank.
fn require_any(params: &Params, names: &[&str]) -> Result<(), ApiError> {
    let present = params
        .iter()
        .any(|(k, v)| names.contains(&k.as_str()) && !v.trim().is_empty());
    if present {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "{} is required",
            names.join(" or ")
        )))
    }
}

async fn forward(state: &AppState, endpoint: &str, mut params: Params) -> Result<Response, ApiError> {
    let key = state
        .config
        .maps_api_key
        .as_deref()
        .ok_or_else(|| ApiError::Internal("GOOGLE_MAPS_API_KEY is not configured".into()))?;

    // A client-supplied key is never forwarded.
    params.retain(|(k, _)| k != "key");
    params.push(("key".to_string(), key.to_string()));

    let url = format!("{}/{}", state.config.maps_base_url.trim_end_matches('/'), endpoint);
    debug!("Proxying places request to {}", endpoint);

    let resp = state
        .http
        .get(&url)
        .query(&params)
        .send()
        .await
        .map_err(|e| ApiError::Internal(format!("places request failed: {e}")))?;

    let status = StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| HeaderValue::from_str(v).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));
    let body = resp
        .bytes()
        .await
        .map_err(|e| ApiError::Internal(format!("places response unreadable: {e}")))?;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type);
    Ok(response)
}
