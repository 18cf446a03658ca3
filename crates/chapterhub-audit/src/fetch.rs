use std::time::Duration;

use reqwest::Url;
use tracing::{debug, warn};

use crate::AuditError;

/// Upper bound on page text sent to the model.
pub const MAX_PAGE_CHARS: usize = 60_000;

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Client used for page fetches. Accepts self-signed and expired certificates.
pub fn page_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(FETCH_TIMEOUT)
        .user_agent("Mozilla/5.0 (compatible; ChapterHubAudit/1.0)")
        .build()
}

/// Parse user input as an http(s) URL, assuming `https://` when no scheme is given.
pub fn normalize_url(raw: &str) -> Result<Url, AuditError> {
    let raw = raw.trim();
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let url = Url::parse(&candidate).map_err(|e| AuditError::Fetch {
        url: raw.to_string(),
        reason: format!("invalid URL: {e}"),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AuditError::Fetch {
            url: raw.to_string(),
            reason: format!("unsupported scheme `{other}`"),
        }),
    }
}

pub async fn fetch_html(http: &reqwest::Client, url: &Url) -> Result<String, AuditError> {
    let fetch_err = |reason: String| AuditError::Fetch {
        url: url.to_string(),
        reason,
    };

    let resp = http.get(url.clone()).send().await.map_err(|e| {
        warn!("Fetch of {} failed: {}", url, e);
        fetch_err(e.to_string())
    })?;

    let status = resp.status();
    if !status.is_success() {
        warn!("Fetch of {} returned {}", url, status);
        return Err(fetch_err(format!("server responded with {status}")));
    }

    let html = resp.text().await.map_err(|e| fetch_err(e.to_string()))?;
    debug!("Fetched {} ({} bytes)", url, html.len());
    Ok(html)
}

/// Strip scripts, styles and comments, collapse whitespace, and cap the
/// result at [`MAX_PAGE_CHARS`] characters.
pub fn prepare_html(html: &str) -> String {
    let stripped = strip_blocks(html, "<script", "</script>");
    let stripped = strip_blocks(&stripped, "<style", "</style>");
    let stripped = strip_blocks(&stripped, "<!--", "-->");

    let mut compact = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some((cut, _)) = compact.char_indices().nth(MAX_PAGE_CHARS) {
        compact.truncate(cut);
    }
    compact
}

/// Remove every `open ... close` span, matching tags case-insensitively.
/// An unterminated block is dropped to the end of input.
fn strip_blocks(html: &str, open: &str, close: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(start) = lower[pos..].find(open).map(|i| pos + i) {
        out.push_str(&html[pos..start]);
        match lower[start..].find(close) {
            Some(end) => pos = start + end + close.len(),
            None => return out,
        }
    }
    out.push_str(&html[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_https() {
        let url = normalize_url("example.org/pricing").unwrap();
        assert_eq!(url.as_str(), "https://example.org/pricing");
    }

    #[test]
    fn non_http_scheme_is_a_fetch_error() {
        let err = normalize_url("ftp://example.org").unwrap_err();
        assert!(matches!(err, AuditError::Fetch { .. }));
    }

    #[test]
    fn scripts_styles_and_comments_are_dropped() {
        let html = "<html><HEAD><Script>var x = 1;</SCRIPT><style>p{}</style></head>\
                    <!-- hidden --><body>\n\n  <p>Hello   world</p></body></html>";
        assert_eq!(
            prepare_html(html),
            "<html><HEAD></head><body> <p>Hello world</p></body></html>"
        );
    }

    #[test]
    fn unterminated_block_drops_tail() {
        assert_eq!(prepare_html("<p>a</p><script>never closed"), "<p>a</p>");
    }

    #[test]
    fn long_pages_are_capped_on_char_boundary() {
        let html = "é".repeat(MAX_PAGE_CHARS + 10);
        let prepared = prepare_html(&html);
        assert_eq!(prepared.chars().count(), MAX_PAGE_CHARS);
    }

    #[tokio::test]
    async fn refused_connection_is_a_fetch_error() {
        let http = page_client().unwrap();
        let url = normalize_url("http://127.0.0.1:1/").unwrap();
        let err = fetch_html(&http, &url).await.unwrap_err();
        assert!(matches!(err, AuditError::Fetch { .. }));
    }
}
