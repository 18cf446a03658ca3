mod support;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use support::{spawn_app, token_for};

#[tokio::test]
async fn announcement_round_trip() {
    let app = spawn_app().await;
    let author = Uuid::new_v4();
    let token = token_for(author);

    let (status, created) = app
        .json(
            "POST",
            "/api/announcements",
            Some(&token),
            Some(json!({ "title": "Watch party", "content": "Saturday at the pub", "is_pinned": true })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["success"], true);
    let id = created["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["author_id"], json!(author));

    let (status, fetched) = app
        .json("GET", &format!("/api/announcements/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["title"], "Watch party");
    assert_eq!(fetched["data"]["content"], "Saturday at the pub");
    assert_eq!(fetched["data"]["is_pinned"], true);

    let (status, updated) = app
        .json(
            "PUT",
            &format!("/api/announcements/{id}"),
            Some(&token),
            Some(json!({ "title": "Watch party (moved)" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["title"], "Watch party (moved)");
    assert_eq!(updated["data"]["content"], "Saturday at the pub");

    let (status, _) = app
        .json("DELETE", &format!("/api/announcements/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json("GET", &format!("/api/announcements/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_requires_fields_and_update_requires_changes() {
    let app = spawn_app().await;
    let token = token_for(Uuid::new_v4());

    let (status, body) = app
        .json(
            "POST",
            "/api/announcements",
            Some(&token),
            Some(json!({ "title": "  ", "content": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required field(s): title, content");
    assert!(app.fake.rows("announcements").is_empty());

    let (status, _) = app
        .json("POST", "/api/events", Some(&token), Some(json!({ "title": "No date" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, team) = app
        .json("POST", "/api/teams", Some(&token), Some(json!({ "name": "Reds" })))
        .await;
    let id = team["data"]["id"].as_str().unwrap();
    let (status, _) = app
        .json("PUT", &format!("/api/teams/{id}"), Some(&token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_a_client_error() {
    let app = spawn_app().await;
    let token = token_for(Uuid::new_v4());

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/api/teams")
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let resp = app.call(req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = support::read_json(resp).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn event_match_fields_land_in_match_details() {
    let app = spawn_app().await;
    let user = Uuid::new_v4();
    let token = token_for(user);

    let (status, created) = app
        .json(
            "POST",
            "/api/events",
            Some(&token),
            Some(json!({
                "title": "Derby day",
                "event_date": "2026-11-02",
                "description": "Meet at noon",
                "league": "Premier League",
                "home_team": "Arsenal",
                "away_team": "Spurs"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["description"], "Meet at noon");
    assert_eq!(
        created["data"]["match_details"],
        json!({ "league": "Premier League", "home_team": "Arsenal", "away_team": "Spurs" })
    );
    assert_eq!(created["data"]["created_by"], json!(user));
    let id = created["data"]["id"].as_str().unwrap();

    // A partial match edit keeps the fields it doesn't mention.
    let (status, updated) = app
        .json(
            "PUT",
            &format!("/api/events/{id}"),
            Some(&token),
            Some(json!({ "away_team": "Chelsea" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        updated["data"]["match_details"],
        json!({ "league": "Premier League", "home_team": "Arsenal", "away_team": "Chelsea" })
    );
}

#[tokio::test]
async fn description_edit_keeps_legacy_match_details() {
    let app = spawn_app().await;
    let user = Uuid::new_v4();
    let token = token_for(user);

    let legacy = app.fake.seed(
        "events",
        json!({
            "title": "Cup final",
            "event_date": "2026-12-01",
            "created_by": user,
            "description": r#"{"text":"Big screen","match_details":{"league":"FA Cup","homeTeam":"Leeds","awayTeam":"Hull"}}"#
        }),
    );
    let id = legacy["id"].as_str().unwrap();

    let (status, updated) = app
        .json(
            "PUT",
            &format!("/api/events/{id}"),
            Some(&token),
            Some(json!({ "description": "Big screen upstairs" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["description"], "Big screen upstairs");
    assert_eq!(updated["data"]["match_details"]["league"], "FA Cup");

    let (_, body) = app.json("GET", "/api/app/events", Some(&token), None).await;
    let cup = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["id"] == legacy["id"])
        .unwrap();
    assert_eq!(cup["description"], "Big screen upstairs");
    assert_eq!(cup["league"], "FA Cup");
    assert_eq!(cup["home_team"], "Leeds");
    assert_eq!(cup["away_team"], "Hull");
}

#[tokio::test]
async fn app_events_are_normalized_with_going_counts() {
    let app = spawn_app().await;
    let token = token_for(Uuid::new_v4());

    let legacy = app.fake.seed(
        "events",
        json!({
            "title": "Cup final",
            "event_date": "2026-12-01",
            "description": r#"{"text":"Big screen upstairs","match_details":{"league":"FA Cup","homeTeam":"Leeds","awayTeam":"Hull"}}"#
        }),
    );
    let plain = app.fake.seed(
        "events",
        json!({ "title": "Quiz night", "event_date": "2026-12-03", "description": "Bring a pen" }),
    );

    let (status, _) = app
        .json(
            "POST",
            &format!("/api/events/{}/rsvp", legacy["id"].as_str().unwrap()),
            Some(&token),
            Some(json!({ "status": "going" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    app.fake.seed(
        "event_rsvp",
        json!({ "event_id": legacy["id"], "user_id": Uuid::new_v4(), "status": "going" }),
    );
    app.fake.seed(
        "event_rsvp",
        json!({ "event_id": legacy["id"], "user_id": Uuid::new_v4(), "status": "maybe" }),
    );

    let (status, body) = app.json("GET", "/api/app/events", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let events = body["data"].as_array().unwrap();

    let cup = events.iter().find(|e| e["id"] == legacy["id"]).unwrap();
    assert_eq!(cup["description"], "Big screen upstairs");
    assert_eq!(cup["league"], "FA Cup");
    assert_eq!(cup["home_team"], "Leeds");
    assert_eq!(cup["away_team"], "Hull");
    assert_eq!(cup["match_label"], "FA Cup: Leeds vs Hull");
    assert_eq!(cup["going_count"], 2);

    let quiz = events.iter().find(|e| e["id"] == plain["id"]).unwrap();
    assert_eq!(quiz["description"], "Bring a pen");
    assert!(quiz["league"].is_null());
    assert!(quiz["home_team"].is_null());
    assert!(quiz["match_label"].is_null());
    assert_eq!(quiz["going_count"], 0);
}

#[tokio::test]
async fn rsvp_status_is_validated_and_replaced() {
    let app = spawn_app().await;
    let user = Uuid::new_v4();
    let token = token_for(user);
    let event = app
        .fake
        .seed("events", json!({ "title": "Pub run", "event_date": "2026-10-30" }));
    let uri = format!("/api/events/{}/rsvp", event["id"].as_str().unwrap());

    let (status, _) = app
        .json("POST", &uri, Some(&token), Some(json!({ "status": "perhaps" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.json("POST", &uri, Some(&token), Some(json!({ "status": "maybe" })))
        .await;
    let (status, body) = app
        .json("POST", &uri, Some(&token), Some(json!({ "status": "not_going" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "not_going");
    assert_eq!(app.fake.rows("event_rsvp").len(), 1);

    let (status, _) = app
        .json(
            "POST",
            &format!("/api/events/{}/rsvp", Uuid::new_v4()),
            Some(&token),
            Some(json!({ "status": "going" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn notifications_show_own_and_broadcast_only() {
    let app = spawn_app().await;
    let me = Uuid::new_v4();
    let token = token_for(me);

    let mine = app.fake.seed(
        "notifications",
        json!({ "title": "Hi", "message": "For you", "recipient_id": me, "is_read": false }),
    );
    app.fake.seed(
        "notifications",
        json!({ "title": "All", "message": "Everyone", "recipient_id": null, "is_read": false }),
    );
    app.fake.seed(
        "notifications",
        json!({ "title": "Other", "message": "Not yours", "recipient_id": Uuid::new_v4(), "is_read": false }),
    );

    let (status, body) = app.json("GET", "/api/notifications", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Hi") && titles.contains(&"All"));

    let (status, body) = app
        .json(
            "PUT",
            &format!("/api/notifications/{}/read", mine["id"].as_str().unwrap()),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_read"], true);

    let (_, body) = app
        .json("GET", "/api/notifications?unread=true", Some(&token), None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn profile_is_the_callers_own() {
    let app = spawn_app().await;
    let me = Uuid::new_v4();
    let token = token_for(me);
    app.fake
        .seed("profiles", json!({ "id": me, "full_name": "Sam", "role": "member" }));
    app.fake
        .seed("profiles", json!({ "id": Uuid::new_v4(), "full_name": "Someone else" }));

    let (status, body) = app.json("GET", "/api/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["full_name"], "Sam");

    let (status, body) = app
        .json("PUT", "/api/profile", Some(&token), Some(json!({ "bio": "Season ticket holder" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["bio"], "Season ticket holder");
    assert_eq!(body["data"]["role"], "member");
}
