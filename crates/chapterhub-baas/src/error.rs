use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BaasError>;

#[derive(Debug, Error)]
pub enum BaasError {
    #[error("request to backend failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("row not found")]
    NotFound,

    #[error("service role key is not configured")]
    MissingServiceKey,

    #[error("refusing to {0} `{1}` without a filter")]
    Unfiltered(&'static str, String),

    #[error("unexpected backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BaasError {
    /// HTTP status the backend answered with, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::NotFound => Some(404),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Build from a non-2xx response body. PostgREST answers with
    /// `{message, code}`, the auth service with `{error, error_description}`
    /// or `{msg, error_code}`, storage with `{statusCode, error, message}`.
    pub(crate) fn from_body(status: u16, body: &[u8]) -> Self {
        let parsed: ErrorPayload = serde_json::from_slice(body).unwrap_or_default();
        let message = parsed
            .message
            .or(parsed.error_description)
            .or(parsed.msg)
            .or_else(|| parsed.error.clone())
            .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());
        let code = parsed.code.or(parsed.error_code).or(parsed.error);

        Self::Api {
            status,
            code,
            message,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorPayload {
    message: Option<String>,
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    error_code: Option<String>,
    msg: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgrest_error_keeps_code() {
        let err = BaasError::from_body(
            406,
            br#"{"code":"PGRST116","message":"JSON object requested, multiple (or no) rows returned"}"#,
        );
        assert_eq!(err.status(), Some(406));
        assert_eq!(err.code(), Some("PGRST116"));
    }

    #[test]
    fn auth_error_prefers_description() {
        let err = BaasError::from_body(
            400,
            br#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(err.code(), Some("invalid_grant"));
        assert!(err.to_string().contains("Invalid login credentials"));
    }

    #[test]
    fn non_json_body_becomes_message() {
        let err = BaasError::from_body(502, b"Bad Gateway\n");
        assert_eq!(err.to_string(), "backend returned 502: Bad Gateway");
        assert_eq!(err.code(), None);
    }
}
