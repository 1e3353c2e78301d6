//! HTTP retry helper for transient errors.
//!
//! Fetchers call [`send_json`] instead of `reqwest::RequestBuilder::send()`
//! directly, so every request gets automatic retry with exponential
//! backoff for transient failures (timeouts, connection resets, server
//! errors, rate limiting).
//!
//! # Usage
//!
//! ```ignore
//! use data_hub_fetch::retry;
//!
//! // Simple GET -> JSON
//! let body = retry::send_json(|| client.get(&url)).await?;
//!
//! // GET with query params
//! let body = retry::send_json(|| client.get(&url).query(&params)).await?;
//! ```

use std::time::Duration;

use crate::FetchError;

/// Maximum number of retry attempts for transient HTTP errors
/// (connection failures, timeouts, HTTP 429, HTTP 5xx).
///
/// With exponential backoff (2s, 4s, 8s) the total wait before giving
/// up is 14 seconds on top of the per-request timeout.
const MAX_RETRIES: u32 = 3;

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (since builders are consumed by
/// `.send()`). This allows retrying any request shape.
///
/// Retries up to [`MAX_RETRIES`] times with exponential backoff on
/// connection errors, timeouts, HTTP 429, and HTTP 5xx. Does **not**
/// retry other 4xx responses, which are permanent.
///
/// # Errors
///
/// Returns [`FetchError::Status`] if the server answers with a
/// non-success status after all retries, [`FetchError::Http`] if the
/// request itself keeps failing, or [`FetchError::Json`] if the final
/// body is not valid JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, FetchError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, MAX_RETRIES).await?;
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

/// Core retry loop behind [`send_json`].
///
/// Sends the request built by `build_request`, retrying on transient
/// errors up to `max_retries` times with exponential backoff. Returns
/// the successful [`reqwest::Response`] (status 2xx or 3xx).
#[allow(clippy::future_not_send)]
async fn send_inner<F>(build_request: &F, max_retries: u32) -> Result<reqwest::Response, FetchError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_status: Option<u16> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1u64 << attempt); // 2s, 4s, 8s
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    continue;
                }
                return Err(FetchError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                // 429 Too Many Requests and 5xx are worth retrying
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    if attempt < max_retries {
                        log::warn!("  HTTP {status}, retrying");
                        last_status = Some(status.as_u16());
                        continue;
                    }
                    return Err(FetchError::Status {
                        status: status.as_u16(),
                    });
                }

                // Other 4xx are permanent
                if status.is_client_error() {
                    return Err(FetchError::Status {
                        status: status.as_u16(),
                    });
                }

                return Ok(response);
            }
        }
    }

    // Unreachable in practice: the loop always returns on its final pass.
    Err(FetchError::Status {
        status: last_status.unwrap_or(500),
    })
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}
