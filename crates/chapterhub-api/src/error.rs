use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Path, Query, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::error;

use chapterhub_audit::AuditError;
use chapterhub_baas::BaasError;
use chapterhub_types::api::ErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Detail is logged, never returned to the client.
    #[error("Internal server error")]
    Internal(String),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Audit(AuditError::Pipeline(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Audit(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<BaasError> for ApiError {
    fn from(err: BaasError) -> Self {
        match &err {
            BaasError::NotFound => Self::NotFound("Not found".into()),
            BaasError::Api {
                status,
                code,
                message,
            } => match (*status, code.as_deref()) {
                (_, Some("PGRST116")) | (404, _) => Self::NotFound("Not found".into()),
                (_, Some("42501")) | (403, _) => Self::Forbidden(message.clone()),
                (401, _) => Self::Unauthorized(message.clone()),
                (400 | 409 | 422, _) => Self::BadRequest(message.clone()),
                _ => Self::Internal(err.to_string()),
            },
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Internal(detail) => {
                error!("Request failed: {}", detail);
                ErrorBody {
                    error: self.to_string(),
                    code: None,
                    details: None,
                }
            }
            Self::Audit(err) => {
                if matches!(err, AuditError::Pipeline(_)) {
                    error!("Audit pipeline failed: {}", err);
                }
                ErrorBody {
                    error: err.to_string(),
                    code: Some(err.code().as_str().to_string()),
                    details: None,
                }
            }
            _ => ErrorBody {
                error: self.to_string(),
                code: None,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// `Json` whose rejections come back as a 400 in the error envelope.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| ApiError::BadRequest(e.body_text()))?;
        Ok(Self(value))
    }
}

/// `Path` with envelope rejections, so a malformed id is a JSON 400.
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e: PathRejection| ApiError::BadRequest(e.body_text()))?;
        Ok(Self(value))
    }
}

/// `Query` with envelope rejections.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e: QueryRejection| ApiError::BadRequest(e.body_text()))?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, code: Option<&str>) -> BaasError {
        BaasError::Api {
            status,
            code: code.map(str::to_string),
            message: "boom".into(),
        }
    }

    #[test]
    fn store_errors_map_to_statuses() {
        let cases = [
            (api(406, Some("PGRST116")), StatusCode::NOT_FOUND),
            (api(401, None), StatusCode::UNAUTHORIZED),
            (api(403, Some("42501")), StatusCode::FORBIDDEN),
            (api(409, Some("23505")), StatusCode::BAD_REQUEST),
            (api(400, Some("22P02")), StatusCode::BAD_REQUEST),
            (api(503, None), StatusCode::INTERNAL_SERVER_ERROR),
            (BaasError::NotFound, StatusCode::NOT_FOUND),
            (BaasError::MissingServiceKey, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn audit_codes_pick_status() {
        assert_eq!(ApiError::from(AuditError::MissingInput).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(AuditError::Fetch {
                url: "u".into(),
                reason: "r".into()
            })
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuditError::Pipeline("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_is_hidden() {
        let err = ApiError::Internal("db password leaked here".into());
        assert_eq!(err.to_string(), "Internal server error");
    }
}
