pub mod announcements;
pub mod audit;
pub mod auth;
pub mod business_profiles;
pub mod chapters;
pub mod common;
pub mod error;
pub mod events;
pub mod middleware;
pub mod notifications;
pub mod places;
pub mod portal;
pub mod profiles;
pub mod state;
pub mod teams;
pub mod uploads;

use std::time::Duration;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post, put},
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use chapterhub_types::api::ErrorBody;

pub use error::ApiError;
pub use state::{ApiConfig, AppState, AppStateInner};

pub const API_TIMEOUT: Duration = Duration::from_secs(30);
/// The audit makes two model calls after fetching the page.
pub const AUDIT_TIMEOUT: Duration = Duration::from_secs(300);

/// The whole application: JSON API under `/api`, portal pages everywhere else.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_router(state.clone()))
        .merge(portal::router(state))
        .layer(TraceLayer::new_for_http())
}

pub fn api_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/app/auth/login", post(auth::app_login))
        .route("/app/auth/refresh", post(auth::app_refresh))
        .route("/app/auth/signup", post(auth::app_signup))
        .route("/auth/login", post(auth::portal_login))
        .route("/auth/logout", post(auth::portal_logout))
        .route("/places/autocomplete", get(places::autocomplete))
        .route("/places/details", get(places::details))
        .route("/places/geocode", get(places::geocode))
        .route("/places/static-map", get(places::static_map));

    let protected_routes = Router::new()
        .route(
            "/announcements",
            get(announcements::list).post(announcements::create),
        )
        .route(
            "/announcements/{id}",
            get(announcements::get_one)
                .put(announcements::update)
                .delete(announcements::delete),
        )
        .route("/events", get(events::list).post(events::create))
        .route(
            "/events/{id}",
            get(events::get_one).put(events::update).delete(events::delete),
        )
        .route(
            "/events/{id}/rsvp",
            post(events::rsvp).delete(events::cancel_rsvp),
        )
        .route("/events/{id}/rsvps", get(events::list_rsvps))
        .route(
            "/notifications",
            get(notifications::list).post(notifications::create),
        )
        .route(
            "/notifications/{id}",
            put(notifications::update).delete(notifications::delete),
        )
        .route("/notifications/{id}/read", put(notifications::mark_read))
        .route("/teams", get(teams::list).post(teams::create))
        .route(
            "/teams/{id}",
            get(teams::get_one).put(teams::update).delete(teams::delete),
        )
        .route("/chapters", get(chapters::list))
        .route("/chapters/{id}", get(chapters::get_one))
        .route(
            "/business-profiles",
            get(business_profiles::list).post(business_profiles::create),
        )
        .route(
            "/business-profiles/{id}",
            get(business_profiles::get_one)
                .put(business_profiles::update)
                .delete(business_profiles::delete),
        )
        .route(
            "/profile",
            get(profiles::get_mine).put(profiles::update_mine),
        )
        .route(
            "/upload",
            post(uploads::upload)
                .delete(uploads::remove)
                .layer(DefaultBodyLimit::max(uploads::BODY_LIMIT)),
        )
        .route("/app/events", get(events::app_list))
        .route("/app/announcements", get(announcements::app_list))
        .route("/app/auth/logout", post(auth::app_logout))
        .route("/app/auth/me", get(auth::me))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    let audit_routes = Router::new()
        .route("/audit", post(audit::run))
        .layer(TimeoutLayer::new(AUDIT_TIMEOUT));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TimeoutLayer::new(API_TIMEOUT))
        .merge(audit_routes)
        .fallback(not_found)
        .layer(middleware::cors_layer(state.config.allowed_origin.as_deref()))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "Not found".into(),
            code: None,
            details: None,
        }),
    )
}
