use std::collections::HashMap;

use axum::{
    Extension,
    extract::State,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use chapterhub_baas::{BaasError, Database};
use chapterhub_types::api::{AppEvent, CreateEventRequest, RsvpRequest, UpdateEventRequest};
use chapterhub_types::models::{EventRow, RsvpRow, RsvpStatus};
use chapterhub_types::normalize::{MatchDetails, extract_match_details, normalize_event};

use crate::common::{DEFAULT_LIMIT, MAX_LIMIT, created, ok, patch_body, reject_blank, require};
use crate::error::{ApiError, ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::state::{AppState, AppStateInner};

const TABLE: &str = "events";
const RSVP_TABLE: &str = "event_rsvp";

#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    pub chapter_id: Option<Uuid>,
    /// Only events dated today or later.
    #[serde(default)]
    pub upcoming: bool,
    pub limit: Option<usize>,
}

async fn fetch_events(db: &Database, query: &EventQuery) -> Result<Vec<EventRow>, ApiError> {
    let mut q = db
        .from(TABLE)
        .order("event_date", true)
        .limit(query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT));
    if let Some(chapter_id) = query.chapter_id {
        q = q.eq("chapter_id", chapter_id);
    }
    if query.upcoming {
        q = q.gte("event_date", chrono::Utc::now().date_naive());
    }
    Ok(q.fetch().await?)
}

async fn fetch_event(db: &Database, id: Uuid) -> Result<EventRow, ApiError> {
    db.from(TABLE)
        .eq("id", id)
        .maybe_single()
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".into()))
}

/// GET /api/events
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<EventQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = fetch_events(&state.baas.as_user(&user.token), &query).await?;
    Ok(ok(rows))
}

/// GET /api/app/events: the mobile projection with match metadata lifted
/// out and a count of "going" RSVPs.
pub async fn app_list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<EventQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = fetch_events(&state.baas.as_user(&user.token), &query).await?;
    let counts = going_counts(&state, &user, &rows).await?;

    let events: Vec<AppEvent> = rows
        .iter()
        .map(|row| AppEvent {
            going_count: counts.get(&row.id).copied().unwrap_or(0),
            ..normalize_event(row)
        })
        .collect();
    Ok(ok(events))
}

/// Counts come from the admin client when it is configured, since row-level
/// security usually hides other members' RSVPs.
async fn going_counts(
    state: &AppStateInner,
    user: &AuthUser,
    rows: &[EventRow],
) -> Result<HashMap<Uuid, usize>, ApiError> {
    let mut counts = HashMap::new();
    if rows.is_empty() {
        return Ok(counts);
    }

    let db = match state.baas.admin() {
        Ok(db) => db,
        Err(BaasError::MissingServiceKey) => state.baas.as_user(&user.token),
        Err(e) => return Err(e.into()),
    };

    #[derive(Deserialize)]
    struct GoingRow {
        event_id: Uuid,
    }

    let going: Vec<GoingRow> = db
        .from(RSVP_TABLE)
        .select("event_id")
        .eq("status", "going")
        .in_list("event_id", rows.iter().map(|r| r.id))
        .fetch()
        .await?;

    for row in going {
        *counts.entry(row.event_id).or_insert(0) += 1;
    }
    Ok(counts)
}

pub async fn get_one(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = fetch_event(&state.baas.as_user(&user.token), id).await?;
    Ok(ok(row))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(mut req): ApiJson<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require(&[
        ("title", req.title.as_str()),
        ("event_date", req.event_date.as_str()),
    ])?;

    req.match_details = MatchDetails::new(
        req.league.take(),
        req.home_team.take(),
        req.away_team.take(),
    )
    .map(|d| d.to_value());
    req.created_by = Some(user.id);

    let row: EventRow = state
        .baas
        .as_user(&user.token)
        .from(TABLE)
        .insert(&req)
        .await?;

    info!("Event {} created by {}", row.id, user.id);
    Ok(created(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(mut req): ApiJson<UpdateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    reject_blank(&[
        ("title", req.title.as_deref()),
        ("event_date", req.event_date.as_deref()),
    ])?;

    let db = state.baas.as_user(&user.token);
    let existing = fetch_event(&db, id).await?;
    if existing.created_by != Some(user.id) {
        warn!("User {} denied write to event {}", user.id, id);
        return Err(ApiError::Forbidden("You can only modify your own events".into()));
    }

    // Partial match edits merge over whatever the row already carries,
    // including metadata still embedded in a legacy description.
    if req.league.is_some() || req.home_team.is_some() || req.away_team.is_some() {
        let current = extract_match_details(&existing).unwrap_or_default();
        req.match_details = Some(
            MatchDetails::new(
                req.league.take().or(current.league),
                req.home_team.take().or(current.home_team),
                req.away_team.take().or(current.away_team),
            )
            .map(|d| d.to_value())
            .unwrap_or(serde_json::Value::Null),
        );
    } else if req.description.is_some()
        && existing.match_details.as_ref().is_none_or(|v| v.is_null())
    {
        // Rewriting a legacy description would drop its embedded match
        // metadata, so move it to the column first.
        if let Some(legacy) = extract_match_details(&existing) {
            req.match_details = Some(legacy.to_value());
        }
    }
    let body = patch_body(&req, true)?;

    let rows: Vec<EventRow> = db
        .from(TABLE)
        .eq("id", id)
        .eq("created_by", user.id)
        .update(&body)
        .await?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound("Event not found".into()))?;

    info!("Event {} updated by {}", id, user.id);
    Ok(ok(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.baas.as_user(&user.token);
    let existing = fetch_event(&db, id).await?;
    if existing.created_by != Some(user.id) {
        warn!("User {} denied delete of event {}", user.id, id);
        return Err(ApiError::Forbidden("You can only modify your own events".into()));
    }

    db.from(TABLE)
        .eq("id", id)
        .eq("created_by", user.id)
        .delete_quiet()
        .await?;

    info!("Event {} deleted by {}", id, user.id);
    Ok(ok(json!({ "id": id })))
}

// -- RSVPs --

/// POST /api/events/{id}/rsvp: one response per user per event; re-posting
/// replaces the earlier status.
pub async fn rsvp(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(event_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<RsvpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = RsvpStatus::parse(&req.status).ok_or_else(|| {
        ApiError::BadRequest("status must be one of going, maybe, not_going".into())
    })?;

    let db = state.baas.as_user(&user.token);
    fetch_event(&db, event_id).await?;

    let row: RsvpRow = db
        .from(RSVP_TABLE)
        .upsert(
            &json!({ "event_id": event_id, "user_id": user.id, "status": status }),
            "event_id,user_id",
        )
        .await?;

    info!("User {} RSVP'd {:?} to event {}", user.id, status, event_id);
    Ok(ok(row))
}

pub async fn cancel_rsvp(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(event_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let removed: Vec<RsvpRow> = state
        .baas
        .as_user(&user.token)
        .from(RSVP_TABLE)
        .eq("event_id", event_id)
        .eq("user_id", user.id)
        .delete()
        .await?;

    if removed.is_empty() {
        return Err(ApiError::NotFound("No RSVP to cancel".into()));
    }
    Ok(ok(json!({ "event_id": event_id })))
}

pub async fn list_rsvps(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(event_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let rows: Vec<RsvpRow> = state
        .baas
        .as_user(&user.token)
        .from(RSVP_TABLE)
        .eq("event_id", event_id)
        .order("created_at", true)
        .fetch()
        .await?;
    Ok(ok(rows))
}
