use bytes::Bytes;
use reqwest::Method;
use serde_json::json;
use tracing::info;

use crate::{Database, Result, check_status};

/// Object storage (`/storage/v1`), bound to the same credential as the
/// [`Database`] it came from.
pub struct Storage<'a> {
    db: &'a Database,
}

impl<'a> Storage<'a> {
    pub(crate) fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Upload one object. Existing objects at `path` are not overwritten.
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<()> {
        let size = data.len();
        let url = format!("{}/storage/v1/object/{}/{}", self.db.base_url(), bucket, path);
        let resp = self
            .db
            .request(Method::POST, &url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CACHE_CONTROL, "max-age=3600")
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await?;
        check_status(resp).await?;

        info!("Stored {}/{} ({} bytes, {})", bucket, path, size, content_type);
        Ok(())
    }

    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.db.base_url(),
            bucket,
            path
        )
    }

    pub async fn remove(&self, bucket: &str, paths: &[&str]) -> Result<()> {
        let url = format!("{}/storage/v1/object/{}", self.db.base_url(), bucket);
        let resp = self
            .db
            .request(Method::DELETE, &url)
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        check_status(resp).await?;

        info!("Removed {} object(s) from {}", paths.len(), bucket);
        Ok(())
    }
}
