pub mod auth;
pub mod error;
pub mod query;
pub mod storage;

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::info;

pub use auth::{AuthClient, SignUp};
pub use error::{BaasError, Result};
pub use query::Query;
pub use storage::Storage;

#[derive(Debug, Clone)]
pub struct BaasConfig {
    /// Project root, e.g. `https://xyzcompany.supabase.co`.
    pub url: String,
    pub anon_key: String,
    pub service_role_key: Option<String>,
}

/// Handle to the hosted backend. Cheap to clone; all clones share one
/// connection pool.
#[derive(Clone)]
pub struct Baas {
    http: reqwest::Client,
    config: Arc<BaasConfig>,
}

impl Baas {
    pub fn new(config: BaasConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("chapterhub/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, config))
    }

    pub fn with_client(http: reqwest::Client, mut config: BaasConfig) -> Self {
        config.url = config.url.trim_end_matches('/').to_string();
        info!("Backend client configured for {}", config.url);
        Self {
            http,
            config: Arc::new(config),
        }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn anon_key(&self) -> &str {
        &self.config.anon_key
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Row access with the caller's own permissions; row-level security applies.
    pub fn as_user(&self, access_token: &str) -> Database {
        Database {
            http: self.http.clone(),
            base_url: self.config.url.clone(),
            api_key: self.config.anon_key.clone(),
            bearer: access_token.to_string(),
        }
    }

    /// Row access with the service role. Bypasses row-level security, so only
    /// use it for server-side reads and writes that need full-table visibility.
    pub fn admin(&self) -> Result<Database> {
        let key = self
            .config
            .service_role_key
            .as_deref()
            .ok_or(BaasError::MissingServiceKey)?;
        Ok(Database {
            http: self.http.clone(),
            base_url: self.config.url.clone(),
            api_key: key.to_string(),
            bearer: key.to_string(),
        })
    }

    pub fn auth(&self) -> AuthClient<'_> {
        AuthClient::new(self)
    }
}

/// A credential-bound view of the backend: table queries and storage.
#[derive(Clone)]
pub struct Database {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    bearer: String,
}

impl Database {
    pub fn from(&self, table: &str) -> Query<'_> {
        Query::new(self, table)
    }

    pub fn storage(&self) -> Storage<'_> {
        Storage::new(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.bearer)
    }
}

/// Decode a JSON body, turning non-2xx answers into [`BaasError::Api`].
pub(crate) async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    let body = resp.bytes().await?;
    if !status.is_success() {
        return Err(BaasError::from_body(status.as_u16(), &body));
    }
    if body.is_empty() {
        return Ok(serde_json::from_slice(b"null")?);
    }
    Ok(serde_json::from_slice(&body)?)
}

pub(crate) async fn check_status(resp: Response) -> Result<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.bytes().await?;
    Err(BaasError::from_body(status.as_u16(), &body))
}
