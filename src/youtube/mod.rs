//! YouTube Data API v3 adapter.
//!
//! [`YouTubeClient`] implements [`crate::feed::ChatGateway`] over HTTP with
//! a bearer token. Wire types live in [`types`].

use std::time::Duration;

use regex::Regex;
use tracing::warn;

use crate::feed::GatewayError;

pub mod client;
pub mod types;

pub use client::YouTubeClient;

/// Default base URL of the YouTube Data API v3.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

/// Build a `reqwest` client with connect and whole-request timeouts.
///
/// Falls back to the default client (and logs) if the builder fails.
pub fn http_client(connect_timeout: Duration, request_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to build HTTP client with timeouts, using default");
            reqwest::Client::default()
        })
}

/// Check HTTP response status and return body text or a structured error.
///
/// # Errors
///
/// Returns `GatewayError::Timeout`/`GatewayError::Request` on transport
/// failure and `GatewayError::HttpStatus` on non-2xx.
pub async fn check_http_response(response: reqwest::Response) -> Result<String, GatewayError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(GatewayError::HttpStatus {
            status: status.as_u16(),
            body: sanitize_http_error_body(&body),
        });
    }
    Ok(body)
}

fn sanitize_http_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [
        r"ya29\.[A-Za-z0-9_\-\.]{10,}",
        r"1//[A-Za-z0-9_\-]{10,}",
        r"(?i)bearer\s+[A-Za-z0-9_\-\.]{10,}",
        r"GOCSPX-[A-Za-z0-9_\-]{10,}",
    ] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    const MAX_ERROR_BODY_CHARS: usize = 256;
    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}
