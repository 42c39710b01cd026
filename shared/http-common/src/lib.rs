//! Shared HTTP utilities for the URL shortener workspace.
//!
//! Framework-agnostic JSON payload builders and request helpers used by the
//! api-server. Payload shapes are part of the public contract: every error is
//! a flat `{"error": <string>}` object.

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Error value returned for validation failures, unknown codes and lookup errors.
pub const INVALID_URL: &str = "invalid URL";

/// Create the flat error JSON.
///
/// Returns: `{"error": "<message>"}`
pub fn json_err(message: &str) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

/// `{"error": "invalid URL"}`
pub fn invalid_url() -> serde_json::Value {
    json_err(INVALID_URL)
}

/// Greeting body for the API smoke-test endpoint.
pub fn hello() -> serde_json::Value {
    serde_json::json!({ "greeting": "hello API" })
}

/// Successful create payload: `{"original_url": ..., "short_url": <code>}`.
pub fn short_url_body(original_url: &str, short_code: u64) -> serde_json::Value {
    serde_json::json!({ "original_url": original_url, "short_url": short_code })
}

// ============================================================================
// Request Helpers
// ============================================================================

/// Whether a `Content-Type` header value denotes an HTML form body.
///
/// Parameters such as `; charset=utf-8` are ignored and the comparison is
/// case-insensitive.
pub fn is_form_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

/// Pull the `url` field out of a decoded JSON body. Missing and non-string
/// values yield `None`.
pub fn url_field(body: &serde_json::Value) -> Option<String> {
    body.get("url").and_then(|v| v.as_str()).map(str::to_string)
}

/// Make a redirect target safe for the `Location` header: non-ASCII
/// characters are percent-encoded as UTF-8, everything else is kept.
pub fn redirect_location(target: &str) -> String {
    let mut out = String::with_capacity(target.len());
    let mut buf = [0u8; 4];
    for ch in target.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            out.push_str(&urlencoding::encode(ch.encode_utf8(&mut buf)));
        }
    }
    out
}
