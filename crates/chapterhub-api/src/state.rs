use std::path::PathBuf;
use std::sync::Arc;

use chapterhub_audit::Auditor;
use chapterhub_baas::Baas;

pub const GOOGLE_MAPS_API: &str = "https://maps.googleapis.com/maps/api";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub baas: Baas,
    pub auditor: Auditor,
    /// Outbound client for the places proxy.
    pub http: reqwest::Client,
    pub config: ApiConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Secret the auth service signs access tokens with.
    pub jwt_secret: String,
    /// Allowed in addition to the built-in CORS origins.
    pub allowed_origin: Option<String>,
    pub maps_api_key: Option<String>,
    pub maps_base_url: String,
    /// Admin portal pages.
    pub public_dir: PathBuf,
    /// Mark session cookies `Secure`.
    pub secure_cookies: bool,
}

impl ApiConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            allowed_origin: None,
            maps_api_key: None,
            maps_base_url: GOOGLE_MAPS_API.to_string(),
            public_dir: PathBuf::from("./public"),
            secure_cookies: true,
        }
    }
}
