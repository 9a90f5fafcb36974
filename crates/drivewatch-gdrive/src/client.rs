//! Google Drive API client
//!
//! Provides a typed HTTP client for the Drive v3 REST API.
//! Handles authentication headers, endpoint construction, status mapping and
//! retrying throttled or failing requests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use drivewatch_gdrive::client::DriveClient;
//! use drivewatch_gdrive::changes;
//!
//! # async fn example() -> Result<(), drivewatch_gdrive::DriveError> {
//! let client = DriveClient::new("access-token-here");
//! let cursor = changes::get_start_page_token(&client).await?;
//! println!("Starting at {cursor}");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::DriveError;

/// Base URL for Google Drive API v3
pub const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Default wait when a 429 carries no usable Retry-After header
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Default number of retries for 429 and 5xx responses
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default first backoff step for 5xx responses; doubled per attempt
pub(crate) const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// Longest wait honored from a Retry-After header
const MAX_RETRY_AFTER: Duration = Duration::from_secs(120);

// ============================================================================
// Error body
// ============================================================================

/// Error envelope returned by Google APIs
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for Google Drive API calls
///
/// Wraps `reqwest::Client` with bearer authentication, base URL construction
/// and a retry loop for 429/5xx responses.
#[derive(Debug, Clone)]
pub struct DriveClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests
    base_url: String,
    /// OAuth2 access token
    access_token: String,
    /// Retries for throttled or failing requests
    max_retries: u32,
    /// First backoff step for 5xx retries
    backoff: Duration,
}

impl DriveClient {
    /// Creates a new DriveClient with the given access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, DRIVE_BASE_URL)
    }

    /// Creates a new DriveClient with a custom base URL (useful for testing)
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Replaces the HTTP client with one that applies `timeout` to every request
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, DriveError> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Sets the retry budget and the first 5xx backoff step
    pub fn with_retry_policy(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    /// Updates the access token (e.g., after an external refresh)
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
        debug!("Updated DriveClient access token");
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path relative to base URL (e.g., "/changes")
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(&self.access_token)
    }

    /// Sends `request`, retrying throttled (429) and server (5xx) failures
    ///
    /// 429 responses wait for the `Retry-After` header (seconds or HTTP-date);
    /// 5xx responses back off exponentially unless the server sends
    /// `Retry-After` too. Other non-success statuses are mapped to
    /// [`DriveError`] without retrying.
    pub async fn execute_with_retry(&self, request: RequestBuilder) -> Result<Response, DriveError> {
        let mut attempt: u32 = 0;

        loop {
            let Some(this_try) = request.try_clone() else {
                return Err(DriveError::InvalidResponse(
                    "request body cannot be retried".into(),
                ));
            };

            let response = this_try.send().await?;
            let status = response.status();

            if status.is_success() {
                if attempt > 0 {
                    info!(attempt, "Request succeeded after retry");
                }
                return Ok(response);
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if !retryable {
                return Err(error_from_response(response).await);
            }

            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);

            if attempt >= self.max_retries {
                warn!(
                    status = status.as_u16(),
                    attempts = attempt + 1,
                    "Retry limit exhausted"
                );
                if status == StatusCode::TOO_MANY_REQUESTS {
                    return Err(DriveError::TooManyRequests {
                        retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER),
                    });
                }
                return Err(error_from_response(response).await);
            }

            let wait = match retry_after {
                Some(wait) => wait,
                None if status == StatusCode::TOO_MANY_REQUESTS => DEFAULT_RETRY_AFTER,
                None => self.backoff.saturating_mul(2u32.saturating_pow(attempt)),
            };

            info!(
                status = status.as_u16(),
                attempt,
                wait_ms = wait.as_millis() as u64,
                "Request throttled or failed, backing off"
            );

            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    /// Sends `request` with retry and decodes the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, DriveError> {
        let response = self.execute_with_retry(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| DriveError::InvalidResponse(e.to_string()))
    }
}

/// Maps a non-success response to a [`DriveError`], keeping Google's message
async fn error_from_response(response: Response) -> DriveError {
    let status = response.status();
    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP {} for {}", status.as_u16(), url));

    match status {
        StatusCode::UNAUTHORIZED => DriveError::Unauthorized(message),
        StatusCode::FORBIDDEN => DriveError::Forbidden(message),
        StatusCode::NOT_FOUND => DriveError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => DriveError::TooManyRequests {
            retry_after: DEFAULT_RETRY_AFTER,
        },
        s if s.is_server_error() => DriveError::ServerError(message),
        _ => DriveError::BadRequest(message),
    }
}

/// Parses a Retry-After value given as seconds or as an HTTP-date
///
/// Returns `None` for unparseable values and for dates in the past. Waits are
/// capped at two minutes.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER));
    }

    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let diff = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
    let wait = diff.to_std().ok()?;
    Some(wait.min(MAX_RETRY_AFTER))
}
