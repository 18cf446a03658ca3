//! Reshape stored event rows into the mobile projection.
//!
//! Older rows carry match metadata inside `description` as JSON text
//! (`{"text": "...", "match_details": {...}}`). Those rows are read as-is;
//! new writes put match metadata in the `match_details` column.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::AppEvent;
use crate::models::EventRow;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDetails {
    #[serde(default)]
    pub league: Option<String>,
    #[serde(default, alias = "homeTeam")]
    pub home_team: Option<String>,
    #[serde(default, alias = "awayTeam")]
    pub away_team: Option<String>,
}

impl MatchDetails {
    pub fn new(
        league: Option<String>,
        home_team: Option<String>,
        away_team: Option<String>,
    ) -> Option<Self> {
        let details = Self {
            league: non_blank(league),
            home_team: non_blank(home_team),
            away_team: non_blank(away_team),
        };
        (!details.is_empty()).then_some(details)
    }

    /// Accepts an object, or a string holding a JSON-encoded object.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(_) => {
                let parsed: Self = serde_json::from_value(value.clone()).ok()?;
                Self::new(parsed.league, parsed.home_team, parsed.away_team)
            }
            Value::String(text) => Self::from_value(&parse_embedded_json(text)?),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.league.is_none() && self.home_team.is_none() && self.away_team.is_none()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse text that may or may not be JSON. Only text that looks like an
/// object or array is attempted; anything else, or a failed parse, is `None`.
pub fn parse_embedded_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Display text for a stored description.
///
/// JSON carrying `text` yields that text. JSON carrying only `match_details`
/// has no display text. Anything else is returned unchanged.
pub fn description_text(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    match parse_embedded_json(raw) {
        Some(Value::Object(obj)) => match obj.get("text") {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Null) => None,
            Some(_) => Some(raw.to_string()),
            None if obj.contains_key("match_details") => None,
            None => Some(raw.to_string()),
        },
        _ => Some(raw.to_string()),
    }
}

/// Match metadata for an event: the `match_details` column first, then the
/// JSON embedded in `description`.
pub fn extract_match_details(row: &EventRow) -> Option<MatchDetails> {
    if let Some(details) = row.match_details.as_ref().and_then(MatchDetails::from_value) {
        return Some(details);
    }

    let embedded = parse_embedded_json(row.description.as_deref()?)?;
    MatchDetails::from_value(embedded.get("match_details")?)
}

/// `"League: Home vs Away"`, degrading to whatever parts are present.
pub fn match_label(details: Option<&MatchDetails>) -> Option<String> {
    let details = details?;
    let fixture = match (&details.home_team, &details.away_team) {
        (Some(home), Some(away)) => Some(format!("{home} vs {away}")),
        (Some(team), None) | (None, Some(team)) => Some(team.clone()),
        (None, None) => None,
    };

    match (&details.league, fixture) {
        (Some(league), Some(fixture)) => Some(format!("{league}: {fixture}")),
        (Some(league), None) => Some(league.clone()),
        (None, fixture) => fixture,
    }
}

pub fn normalize_event(row: &EventRow) -> AppEvent {
    let details = extract_match_details(row);
    let label = match_label(details.as_ref());
    let details = details.unwrap_or_default();

    AppEvent {
        id: row.id,
        title: row.title.clone(),
        description: description_text(row.description.as_deref()),
        event_date: row.event_date.clone(),
        start_time: row.start_time.clone(),
        end_time: row.end_time.clone(),
        location: row.location.clone(),
        image_url: row.image_url.clone(),
        event_type: row.event_type.clone(),
        chapter_id: row.chapter_id,
        league: details.league,
        home_team: details.home_team,
        away_team: details.away_team,
        match_label: label,
        going_count: 0,
    }
}
