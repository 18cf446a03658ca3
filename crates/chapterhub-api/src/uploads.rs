use axum::{
    Extension,
    extract::{Multipart, State, multipart::MultipartError},
    response::IntoResponse,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use chapterhub_types::api::UploadResponse;

use crate::common::{created, ok};
use crate::error::{ApiError, ApiQuery};
use crate::middleware::AuthUser;
use crate::state::AppState;

/// 5 MiB per image.
pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

/// Request body ceiling for the upload route: one image plus form overhead.
/// Anything larger fails while reading the multipart stream.
pub const BODY_LIMIT: usize = MAX_FILE_SIZE + 64 * 1024;

pub const DEFAULT_BUCKET: &str = "event-images";

pub const BUCKETS: [&str; 5] = [
    "avatars",
    "event-images",
    "announcement-images",
    "business-logos",
    "team-logos",
];

/// Allowed MIME types and the extension stored objects get.
const IMAGE_TYPES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

struct FilePart {
    data: Bytes,
    content_type: String,
}

fn bad_multipart(e: MultipartError) -> ApiError {
    debug!("Multipart read failed: {}", e);
    ApiError::BadRequest(format!("Invalid upload: {}", e.body_text()))
}

fn check_bucket(bucket: &str) -> Result<(), ApiError> {
    if BUCKETS.contains(&bucket) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Invalid bucket. Allowed: {}",
            BUCKETS.join(", ")
        )))
    }
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    IMAGE_TYPES
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .map(|(_, ext)| *ext)
}

/// Folder names become path segments, so only plain names are accepted.
fn clean_folder(folder: &str) -> Option<&str> {
    let folder = folder.trim().trim_matches('/');
    let valid = !folder.is_empty()
        && folder
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != "..");
    valid.then_some(folder)
}

/// POST /api/upload: multipart with `file`, optional `bucket` and `folder`.
/// Every check runs before anything is written to storage.
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut file: Option<FilePart> = None;
    let mut bucket = DEFAULT_BUCKET.to_string();
    let mut folder: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_ascii_lowercase();
                let data = field.bytes().await.map_err(bad_multipart)?;
                file = Some(FilePart { data, content_type });
            }
            Some("bucket") => {
                let value = field.text().await.map_err(bad_multipart)?;
                if !value.trim().is_empty() {
                    bucket = value.trim().to_string();
                }
            }
            Some("folder") => {
                let value = field.text().await.map_err(bad_multipart)?;
                if !value.trim().is_empty() {
                    folder = Some(value);
                }
            }
            other => debug!("Ignoring upload field {:?}", other),
        }
    }

    let file = file.ok_or_else(|| ApiError::BadRequest("No file provided".into()))?;
    check_bucket(&bucket)?;

    let ext = extension_for(&file.content_type).ok_or_else(|| {
        warn!("User {} tried to upload {}", user.id, file.content_type);
        ApiError::BadRequest(format!(
            "Invalid file type {}. Allowed: JPEG, PNG, WebP, GIF",
            file.content_type
        ))
    })?;
    if file.data.is_empty() {
        return Err(ApiError::BadRequest("File is empty".into()));
    }
    if file.data.len() > MAX_FILE_SIZE {
        return Err(ApiError::BadRequest("File too large. Maximum size is 5MB".into()));
    }

    let folder = match folder.as_deref() {
        Some(raw) => clean_folder(raw)
            .ok_or_else(|| ApiError::BadRequest("Invalid folder".into()))?
            .to_string(),
        None => user.id.to_string(),
    };
    let path = format!("{}/{}.{}", folder, Uuid::new_v4(), ext);
    let size = file.data.len();

    let db = state.baas.as_user(&user.token);
    let storage = db.storage();
    storage
        .upload(&bucket, &path, file.data, &file.content_type)
        .await?;

    info!("User {} uploaded {}/{} ({} bytes)", user.id, bucket, path, size);
    Ok(created(UploadResponse {
        url: storage.public_url(&bucket, &path),
        path,
        bucket,
        size,
        content_type: file.content_type,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RemoveQuery {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub path: String,
}

/// DELETE /api/upload?bucket=&path=: callers may only remove objects under
/// their own id.
pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<RemoveQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if query.bucket.trim().is_empty() || query.path.trim().is_empty() {
        return Err(ApiError::BadRequest("bucket and path are required".into()));
    }
    check_bucket(&query.bucket)?;

    if !owns_path(&query.path, user.id) {
        warn!("User {} denied delete of {}/{}", user.id, query.bucket, query.path);
        return Err(ApiError::Forbidden("You can only delete your own files".into()));
    }

    state
        .baas
        .as_user(&user.token)
        .storage()
        .remove(&query.bucket, &[query.path.as_str()])
        .await?;

    Ok(ok(json!({ "bucket": query.bucket, "path": query.path })))
}

fn owns_path(path: &str, user_id: Uuid) -> bool {
    path.strip_prefix(&user_id.to_string())
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|rest| !rest.is_empty() && !rest.split('/').any(|seg| seg == ".."))
}
