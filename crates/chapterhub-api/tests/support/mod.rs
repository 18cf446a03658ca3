//! In-process stand-in for the hosted backend plus helpers for driving the
//! router with `oneshot`.
//!
//! The fake understands the subset of the REST query language the handlers
//! use (`eq`, `gte`, `in`, `is.null`, `or`, `limit`), upserts on
//! `on_conflict`, object uploads and the password/refresh token grants.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, post},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use chapterhub_api::{ApiConfig, AppState, AppStateInner};
use chapterhub_audit::{AuditConfig, Auditor};
use chapterhub_baas::{Baas, BaasConfig};
use chapterhub_types::api::Claims;

pub const JWT_SECRET: &str = "integration-test-secret";

// -- Fake backend --

#[derive(Default)]
struct Store {
    tables: HashMap<String, Vec<Value>>,
    objects: Vec<String>,
    users: Vec<(Uuid, String, String)>,
}

#[derive(Clone, Default)]
pub struct FakeBaas {
    store: Arc<Mutex<Store>>,
}

impl FakeBaas {
    /// Insert a row directly, filling `id` when absent. Returns the stored row.
    pub fn seed(&self, table: &str, row: Value) -> Value {
        let row = with_defaults(row);
        self.store
            .lock()
            .unwrap()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.store
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn objects(&self) -> Vec<String> {
        self.store.lock().unwrap().objects.clone()
    }

    pub fn add_user(&self, email: &str, password: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .lock()
            .unwrap()
            .users
            .push((id, email.to_string(), password.to_string()));
        id
    }

    fn router(self) -> Router {
        Router::new()
            .route(
                "/rest/v1/{table}",
                axum::routing::get(rest_select)
                    .post(rest_insert)
                    .patch(rest_update)
                    .delete(rest_delete),
            )
            .route("/storage/v1/object/{bucket}/{*path}", post(storage_upload))
            .route("/storage/v1/object/{bucket}", delete(storage_remove))
            .route("/auth/v1/token", post(auth_token))
            .route("/auth/v1/logout", post(|| async { StatusCode::NO_CONTENT }))
            .with_state(self)
    }
}

type Params = Vec<(String, String)>;

fn with_defaults(mut row: Value) -> Value {
    if let Some(fields) = row.as_object_mut() {
        fields
            .entry("id")
            .or_insert_with(|| json!(Uuid::new_v4()));
        fields
            .entry("created_at")
            .or_insert_with(|| json!(chrono::Utc::now().to_rfc3339()));
    }
    row
}

fn text(row: &Value, column: &str) -> Option<String> {
    match row.get(column) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn condition(row: &Value, column: &str, expr: &str) -> bool {
    let (op, value) = expr.split_once('.').unwrap_or((expr, ""));
    let actual = text(row, column);
    match op {
        "eq" => actual.as_deref() == Some(value),
        "gte" => actual.is_some_and(|a| a.as_str() >= value),
        "is" => value == "null" && actual.is_none(),
        "in" => {
            let list = value.trim_start_matches('(').trim_end_matches(')');
            actual.is_some_and(|a| list.split(',').any(|v| v == a))
        }
        _ => false,
    }
}

fn matches(row: &Value, params: &Params) -> bool {
    params
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "select" | "order" | "limit" | "on_conflict"))
        .all(|(column, expr)| {
            if column == "or" {
                expr.trim_start_matches('(')
                    .trim_end_matches(')')
                    .split(',')
                    .any(|clause| {
                        clause
                            .split_once('.')
                            .is_some_and(|(col, rest)| condition(row, col, rest))
                    })
            } else {
                condition(row, column, expr)
            }
        })
}

fn param<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn merge_into(row: &mut Value, patch: &Value) {
    if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
        for (k, v) in fields {
            target.insert(k.clone(), v.clone());
        }
    }
}

async fn rest_select(
    State(fake): State<FakeBaas>,
    Path(table): Path<String>,
    Query(params): Query<Params>,
) -> Json<Vec<Value>> {
    let limit = param(&params, "limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(usize::MAX);
    let rows = fake
        .rows(&table)
        .into_iter()
        .filter(|row| matches(row, &params))
        .take(limit)
        .collect();
    Json(rows)
}

async fn rest_insert(
    State(fake): State<FakeBaas>,
    Path(table): Path<String>,
    Query(params): Query<Params>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let mut store = fake.store.lock().unwrap();
    let rows = store.tables.entry(table).or_default();

    if let Some(conflict) = param(&params, "on_conflict") {
        let columns: Vec<&str> = conflict.split(',').collect();
        if let Some(existing) = rows
            .iter_mut()
            .find(|row| columns.iter().all(|c| row.get(*c) == body.get(*c)))
        {
            merge_into(existing, &body);
            return (StatusCode::OK, Json(vec![existing.clone()]));
        }
    }

    let row = with_defaults(body);
    rows.push(row.clone());
    (StatusCode::CREATED, Json(vec![row]))
}

async fn rest_update(
    State(fake): State<FakeBaas>,
    Path(table): Path<String>,
    Query(params): Query<Params>,
    Json(patch): Json<Value>,
) -> Json<Vec<Value>> {
    let mut store = fake.store.lock().unwrap();
    let mut updated = Vec::new();
    for row in store.tables.entry(table).or_default().iter_mut() {
        if matches(row, &params) {
            merge_into(row, &patch);
            updated.push(row.clone());
        }
    }
    Json(updated)
}

async fn rest_delete(
    State(fake): State<FakeBaas>,
    Path(table): Path<String>,
    Query(params): Query<Params>,
) -> Json<Vec<Value>> {
    let mut store = fake.store.lock().unwrap();
    let rows = store.tables.entry(table).or_default();
    let (removed, kept): (Vec<Value>, Vec<Value>) =
        rows.drain(..).partition(|row| matches(row, &params));
    *rows = kept;
    Json(removed)
}

async fn storage_upload(
    State(fake): State<FakeBaas>,
    Path((bucket, path)): Path<(String, String)>,
    _body: Bytes,
) -> Json<Value> {
    let key = format!("{bucket}/{path}");
    fake.store.lock().unwrap().objects.push(key.clone());
    Json(json!({ "Key": key }))
}

async fn storage_remove(Path(_bucket): Path<String>, Json(_body): Json<Value>) -> Json<Value> {
    Json(json!([]))
}

async fn auth_token(
    State(fake): State<FakeBaas>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let store = fake.store.lock().unwrap();
    let user = match query.get("grant_type").map(String::as_str) {
        Some("password") => store.users.iter().find(|(_, email, password)| {
            body["email"].as_str() == Some(email.as_str())
                && body["password"].as_str() == Some(password.as_str())
        }),
        Some("refresh_token") => store
            .users
            .iter()
            .find(|(id, _, _)| body["refresh_token"].as_str() == Some(refresh_token_for(*id).as_str())),
        _ => None,
    };

    match user {
        Some((id, email, _)) => Json(session_json(*id, email)).into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })),
        )
            .into_response(),
    }
}

fn session_json(id: Uuid, email: &str) -> Value {
    let expires_at = chrono::Utc::now().timestamp() + 3600;
    json!({
        "access_token": token_for(id),
        "refresh_token": refresh_token_for(id),
        "expires_in": 3600,
        "expires_at": expires_at,
        "token_type": "bearer",
        "user": { "id": id, "email": email }
    })
}

// -- Tokens --

pub fn refresh_token_for(user: Uuid) -> String {
    format!("refresh-{user}")
}

pub fn token_with_expiry(user: Uuid, offset_secs: i64) -> String {
    let claims = Claims {
        sub: user,
        email: Some(format!("{user}@example.org")),
        role: Some("authenticated".into()),
        aud: Some("authenticated".into()),
        exp: (chrono::Utc::now().timestamp() + offset_secs) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn token_for(user: Uuid) -> String {
    token_with_expiry(user, 3600)
}

// -- App under test --

pub struct TestApp {
    pub router: Router,
    pub fake: FakeBaas,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Like [`spawn_app`], letting the test adjust the API config first.
pub async fn spawn_app_with(configure: impl FnOnce(&mut ApiConfig)) -> TestApp {
    let fake = FakeBaas::default();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let fake_router = fake.clone().router();
    tokio::spawn(async move {
        axum::serve(listener, fake_router).await.unwrap();
    });

    let baas = Baas::with_client(
        reqwest::Client::new(),
        BaasConfig {
            url: format!("http://{addr}"),
            anon_key: "anon-key".into(),
            service_role_key: None,
        },
    );
    let auditor = Auditor::new(AuditConfig {
        analyze_model: "gpt-4o-mini".into(),
        merge_model: "gpt-4o-mini".into(),
    })
    .unwrap();

    let mut config = ApiConfig::new(JWT_SECRET);
    config.public_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/public");
    configure(&mut config);

    let state: AppState = Arc::new(AppStateInner {
        baas,
        auditor,
        http: reqwest::Client::new(),
        config,
    });

    TestApp {
        router: chapterhub_api::app(state),
        fake,
    }
}

impl TestApp {
    pub async fn call(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    /// JSON request, optionally authenticated; returns status and parsed body.
    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let resp = self.call(req).await;
        let status = resp.status();
        (status, read_json(resp).await)
    }
}

pub async fn read_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}
