//! # tinylink-rs
//!
//! A Rust client library for the TinyLink URL shortener API.
//!
//! The crate also holds the wire types shared with the server, so both sides
//! agree on the JSON shape of a link.
//!
//! ## Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), tinylink_rs::TinylinkApiError> {
//! use tinylink_rs::TinylinkApi;
//!
//! let api = TinylinkApi::new("http://localhost:4000");
//!
//! let link = api.create_link("https://example.com/very/long/url", None).await?;
//! println!("Short code: {}", link.code);
//! # Ok(())
//! # }
//! ```
//!

use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Request payload for creating a shortened URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLinkRequest {
    /// The original URL to be shortened.
    #[serde(default)]
    pub url: String,
    /// Optional custom code, 6 to 8 characters from `[A-Za-z0-9]`.
    ///
    /// When absent a random 6 character code is generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// A link as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkResponse {
    /// The short code.
    pub code: String,
    /// The target URL.
    pub url: String,
    /// Number of redirects served for this code.
    pub clicks: u64,
    /// Time of the most recent redirect, `None` until the first one.
    pub last_clicked: Option<DateTime<Utc>>,
    /// Time the link was created.
    pub created_at: DateTime<Utc>,
}

/// Error body returned by the API for any non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// A client for interacting with a TinyLink server.
///
/// # Example
///
/// ```rust,no_run
/// # async fn example() -> Result<(), tinylink_rs::TinylinkApiError> {
/// use tinylink_rs::TinylinkApi;
///
/// let api = TinylinkApi::new("http://localhost:4000");
/// for link in api.list_links().await? {
///     println!("{} -> {} ({} clicks)", link.code, link.url, link.clicks);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TinylinkApi {
    url: String,
    client: reqwest::Client,
}

/// Errors that can occur when interacting with the TinyLink API.
#[derive(Debug, Error)]
pub enum TinylinkApiError {
    /// An error occurred during API configuration (e.g., invalid URL parsing).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    /// An error occurred while sending the HTTP request or receiving the response.
    #[error("Request error: {0}")]
    RequestError(String),
    /// An error occurred while deserializing the API response.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
    /// The server answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: StatusCode, message: String },
}

impl TinylinkApiError {
    /// Returns `true` if the server rejected the request because the code is taken.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status == StatusCode::CONFLICT)
    }

    /// Returns `true` if the server reported that the code does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

impl TinylinkApi {
    /// Creates a new client for the server at `url`, e.g. `http://localhost:4000`.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Uses the given `reqwest::Client` instead of a default one.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, TinylinkApiError> {
        Url::parse(&format!("{}{}", self.url, path))
            .map_err(|e| TinylinkApiError::ConfigurationError(e.to_string()))
    }

    /// Lists all links, newest first.
    pub async fn list_links(&self) -> Result<Vec<LinkResponse>, TinylinkApiError> {
        let resp = self
            .client
            .get(self.endpoint("/api/links")?)
            .send()
            .await
            .map_err(|e| TinylinkApiError::RequestError(e.to_string()))?;

        decode(resp).await
    }

    /// Fetches a single link including its click statistics.
    pub async fn get_link(&self, code: &str) -> Result<LinkResponse, TinylinkApiError> {
        let resp = self
            .client
            .get(self.endpoint(&format!("/api/links/{code}"))?)
            .send()
            .await
            .map_err(|e| TinylinkApiError::RequestError(e.to_string()))?;

        decode(resp).await
    }

    /// Creates a shortened URL, optionally with a custom code.
    ///
    /// # Errors
    ///
    /// Besides transport failures, the server answers `400` for a malformed
    /// URL or code and `409` if the requested code is already in use
    /// (see [`TinylinkApiError::is_conflict`]).
    pub async fn create_link(
        &self,
        original_link: &str,
        code: Option<&str>,
    ) -> Result<LinkResponse, TinylinkApiError> {
        let resp = self
            .client
            .post(self.endpoint("/api/links")?)
            .json(&CreateLinkRequest {
                url: original_link.to_string(),
                code: code.map(str::to_string),
            })
            .send()
            .await
            .map_err(|e| TinylinkApiError::RequestError(e.to_string()))?;

        decode(resp).await
    }

    /// Deletes a link permanently.
    ///
    /// Deleting a code twice yields a not-found error on the second call;
    /// callers wanting idempotent deletes can check
    /// [`TinylinkApiError::is_not_found`].
    pub async fn delete_link(&self, code: &str) -> Result<(), TinylinkApiError> {
        let resp = self
            .client
            .delete(self.endpoint(&format!("/api/links/{code}"))?)
            .send()
            .await
            .map_err(|e| TinylinkApiError::RequestError(e.to_string()))?;

        check_status(resp).await.map(|_| ())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TinylinkApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = match resp.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };

    Err(TinylinkApiError::Api { status, message })
}

async fn decode<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, TinylinkApiError> {
    check_status(resp)
        .await?
        .json::<T>()
        .await
        .map_err(|e| TinylinkApiError::DeserializationError(e.to_string()))
}
