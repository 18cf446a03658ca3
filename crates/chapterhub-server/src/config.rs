use std::path::PathBuf;

use anyhow::{Context, bail};

use chapterhub_api::ApiConfig;
use chapterhub_audit::AuditConfig;
use chapterhub_baas::BaasConfig;

pub const DEFAULT_AUDIT_MODEL: &str = "gpt-4o-mini";

/// Everything read from the environment, once, at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub baas: BaasConfig,
    pub api: ApiConfig,
    pub audit: AuditConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| get(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &str| -> anyhow::Result<String> {
            match var(name) {
                Some(value) => Ok(value),
                None => bail!("{name} is not set"),
            }
        };

        let host = var("CHAPTERHUB_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("CHAPTERHUB_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("CHAPTERHUB_PORT is not a valid port")?;

        let baas = BaasConfig {
            url: required("SUPABASE_URL")?,
            anon_key: required("SUPABASE_ANON_KEY")?,
            service_role_key: var("SUPABASE_SERVICE_ROLE_KEY"),
        };

        let mut api = ApiConfig::new(required("SUPABASE_JWT_SECRET")?);
        api.allowed_origin = var("CHAPTERHUB_ALLOWED_ORIGIN");
        api.maps_api_key = var("GOOGLE_MAPS_API_KEY");
        if let Some(dir) = var("CHAPTERHUB_PUBLIC_DIR") {
            api.public_dir = PathBuf::from(dir);
        }
        if let Some(flag) = var("CHAPTERHUB_SECURE_COOKIES") {
            api.secure_cookies = !matches!(flag.to_ascii_lowercase().as_str(), "false" | "0" | "no");
        }

        let analyze_model = var("AUDIT_MODEL").unwrap_or_else(|| DEFAULT_AUDIT_MODEL.into());
        let merge_model = var("AUDIT_MERGE_MODEL").unwrap_or_else(|| analyze_model.clone());

        Ok(Self {
            host,
            port,
            baas,
            api,
            audit: AuditConfig {
                analyze_model,
                merge_model,
            },
        })
    }
}
