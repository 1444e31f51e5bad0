//! Single-shot HTTP helpers.
//!
//! Incident lookups must cost exactly one request each, so nothing here
//! retries: retry policy lives with the batch enricher, one level up.
//! What these helpers add over `RequestBuilder::send()` is uniform status
//! handling and diagnostic logging of bodies that fail to parse.
//!
//! # Usage
//!
//! ```ignore
//! use crate::http;
//!
//! let body = http::send_json(client.get(&url).query(&params)).await?;
//! ```

use crate::SourceError;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Sends a request and parses the response body as JSON.
///
/// Non-2xx statuses become [`SourceError::Status`]. The body is read as
/// text first so that a parse failure can log what actually arrived.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails, the status is not a
/// success, or the body is not valid JSON.
pub async fn send_json(request: reqwest::RequestBuilder) -> Result<serde_json::Value, SourceError> {
    let response = request.send().await.inspect_err(|e| {
        if is_transient(e) {
            log::debug!("  transient error: {e}");
        }
    })?;

    let url = response.url().to_string();
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        log::warn!("  HTTP 429 (rate limited) from {url}");
    }
    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            url,
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|json_err| {
        log::warn!(
            "JSON parse failed.\n  \
             url: {url}\n  \
             status: {status}\n  \
             content-type: {content_type:?}\n  \
             received: {} bytes\n  \
             parse error: {json_err}\n  \
             body preview: {}",
            text.len(),
            body_preview(&text),
        );
        SourceError::Json(json_err)
    })
}

/// Truncates a body to [`BODY_PREVIEW_LEN`] bytes on a character boundary.
fn body_preview(text: &str) -> String {
    if text.len() <= BODY_PREVIEW_LEN {
        return text.to_string();
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Returns `true` if the error is likely transient (worth a later retry).
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}
