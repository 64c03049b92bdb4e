//! HTTP client for the ServiceNow Table API.
//!
//! This module provides the `SnowClient` struct for making authenticated
//! requests against the generic record tables (`/api/now/{version}/table/*`)
//! the delivery engine uses.
//!
//! # Retry Logic
//!
//! Every call is wrapped in [`crate::retry::with_retry`]: any failure is
//! retried with exponential backoff up to the configured attempt count,
//! after which the last error propagates.
//!
//! # Security
//!
//! The password is never logged. All error messages are sanitized before
//! they leave this module.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use crate::config::Config;
use crate::error::CourierError;
use crate::models::{TableErrorResponse, TableListResponse, TableRecordResponse, User};
use crate::retry::{with_retry, RetryPolicy};

/// Maximum length for HTTP error response bodies to avoid leaking verbose
/// instance internals.
const MAX_ERROR_BODY_LEN: usize = 500;

/// Authenticated client for the ServiceNow Table API.
///
/// Handles authentication, request formatting, envelope unwrapping, and
/// retry for all table operations. Cloning is cheap; the underlying
/// `reqwest::Client` is reference-counted.
///
/// # Example
///
/// ```ignore
/// let config = Config::from_env()?;
/// let client = SnowClient::new(&config)?;
///
/// let user = client.find_user_by_email("abel@example.com").await?;
/// ```
#[derive(Clone)]
pub struct SnowClient {
    /// The underlying HTTP client.
    http: Client,

    /// Base URL for the Table API (e.g., `https://dev1.service-now.com/api/now/v1`).
    base_url: String,

    /// Basic auth username.
    username: String,

    /// Basic auth password.
    /// SECURITY: Never log this value!
    password: String,

    /// Per-call timeout, used in timeout error messages.
    timeout: Duration,

    /// Backoff policy applied to every call.
    retry: RetryPolicy,
}

impl SnowClient {
    /// Creates a new Table API client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `CourierError::HttpClient` if the HTTP client fails to initialize.
    pub fn new(config: &Config) -> Result<Self, CourierError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(CourierError::HttpClient)?;

        Ok(Self {
            http,
            base_url: Self::api_base_url(&config.instance_url, &config.api_version),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: config.timeout,
            retry: config.retry_policy(),
        })
    }

    /// Builds the versioned REST base URL for an instance.
    fn api_base_url(instance_url: &str, api_version: &str) -> String {
        format!(
            "{}/api/now/{}",
            instance_url.trim_end_matches('/'),
            api_version
        )
    }

    /// Returns the password for sanitization purposes.
    ///
    /// This should ONLY be used for sanitizing error messages, never for logging.
    pub(crate) fn password_for_sanitization(&self) -> &str {
        &self.password
    }

    /// Tests connectivity to the instance.
    ///
    /// Fetches a single user record to verify the instance is reachable and
    /// the credentials work. Failures are reported but the caller may choose
    /// to start anyway.
    pub async fn test_connection(&self) -> Result<(), CourierError> {
        tracing::debug!("Testing connection to ServiceNow instance");

        let _: Vec<User> = self
            .get_records("sys_user", &[("sysparm_limit", "1")])
            .await?;

        tracing::info!("Connection test successful");
        Ok(())
    }

    /// Fetches records from a table.
    ///
    /// # Arguments
    ///
    /// * `table` - Table name (e.g., `sys_user`)
    /// * `query` - `sysparm_*` query parameters
    pub async fn get_records<T>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, CourierError>
    where
        T: serde::de::DeserializeOwned,
    {
        let path = format!("/table/{}", table);
        let response: TableListResponse<T> = self
            .request(Method::GET, &path, query, None)
            .await?;
        Ok(response.result)
    }

    /// Creates a record in a table and returns the created record's payload.
    ///
    /// The payload is kept opaque (`serde_json::Value`) so callers can pass
    /// it through untouched as delivery details.
    pub async fn create_record(
        &self,
        table: &str,
        payload: &Value,
    ) -> Result<Value, CourierError> {
        let path = format!("/table/{}", table);
        let response: TableRecordResponse<Value> = self
            .request(Method::POST, &path, &[], Some(payload))
            .await?;
        Ok(response.result)
    }

    /// Looks up the user whose email field exactly matches `email`.
    ///
    /// A successful lookup with zero rows returns `Ok(None)`; only transport
    /// failures are errors (and those are retried like any other call).
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CourierError> {
        let query = format!("email={}", email);
        let users: Vec<User> = self
            .get_records(
                "sys_user",
                &[
                    ("sysparm_query", query.as_str()),
                    ("sysparm_fields", "sys_id,name,email"),
                    ("sysparm_limit", "1"),
                ],
            )
            .await?;

        Ok(users.into_iter().next())
    }

    /// Makes a request to the Table API with automatic retry.
    async fn request<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<T, CourierError>
    where
        T: serde::de::DeserializeOwned,
    {
        let operation = format!("{} {}", method, path);
        with_retry(self.retry, &operation, || {
            self.request_inner(method.clone(), path, query, body)
        })
        .await
    }

    /// Makes a single request to the Table API without retry.
    async fn request_inner<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<T, CourierError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);

        tracing::debug!(
            method = %method,
            path = %path,
            "Making Table API request"
        );

        let mut req = self
            .http
            .request(method.clone(), &url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json");

        if !query.is_empty() {
            req = req.query(query);
        }

        if let Some(payload) = body {
            req = req.json(payload);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                return CourierError::timeout(self.timeout, format!("{} {}", method, path));
            }
            CourierError::Http(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.handle_http_error(status, response).await);
        }

        let body = response.text().await.map_err(CourierError::Http)?;

        tracing::trace!(body = %body, "Table API response");

        serde_json::from_str(&body).map_err(CourierError::Serialization)
    }

    /// Converts a non-success HTTP response into a `CourierError`.
    ///
    /// The Table API reports failures as `{"error": {"message", "detail"}}`;
    /// when that shape is present the message is surfaced directly, otherwise
    /// the raw (sanitized, truncated) body is carried in an HTTP status error.
    async fn handle_http_error(&self, status: StatusCode, response: reqwest::Response) -> CourierError {
        let body = response.text().await.unwrap_or_default();
        let body = CourierError::sanitize_message(&body, &self.password);

        if let Ok(parsed) = serde_json::from_str::<TableErrorResponse>(&body) {
            if !parsed.error.message.is_empty() {
                return CourierError::Api {
                    status,
                    message: parsed.error.message,
                };
            }
        }

        CourierError::HttpStatus {
            status,
            body: truncate_body(body),
        }
    }
}

/// Caps an error body at [`MAX_ERROR_BODY_LEN`] bytes, backing off to the
/// nearest char boundary so multi-byte UTF-8 never splits.
fn truncate_body(body: String) -> String {
    if body.len() <= MAX_ERROR_BODY_LEN {
        return body;
    }

    let mut end = MAX_ERROR_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[truncated]", &body[..end])
}
