//! Configuration management for the Courier bridge.
//!
//! This module handles loading configuration from environment variables,
//! with validation to ensure all required values are present.

use crate::error::CourierError;
use crate::retry::RetryPolicy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default Table API version segment.
const DEFAULT_API_VERSION: &str = "v1";

/// Default per-call timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default number of retries after a failed backend call.
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default HTTP listen port.
const DEFAULT_PORT: u16 = 8080;

/// Default path to the static MCP schema document.
const DEFAULT_SCHEMA_PATH: &str = "mcp-schema.json";

/// Configuration for connecting to a ServiceNow instance.
///
/// Loaded once at startup from environment variables and shared read-only
/// across all requests. The password is stored but never logged or exposed
/// in error messages.
#[derive(Clone)]
pub struct Config {
    /// Base URL for the instance (e.g., `https://dev12345.service-now.com`).
    pub instance_url: String,

    /// API username for basic authentication.
    pub username: String,

    /// API password for basic authentication.
    /// This value must never be logged or included in error messages.
    pub password: String,

    /// Table API version segment (e.g., `v1`).
    pub api_version: String,

    /// Per-call timeout for backend requests.
    pub timeout: Duration,

    /// Number of retries after a failed backend call.
    pub retry_attempts: u32,

    /// Optional sender address used when a request carries no `from`.
    pub default_sender: Option<String>,

    /// Port the HTTP server listens on.
    pub port: u16,

    /// Path to the static MCP schema document served at `/mcp/schema`.
    pub schema_path: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Required Environment Variables
    ///
    /// - `SERVICENOW_INSTANCE_URL`: Base URL of the ServiceNow instance
    /// - `SERVICENOW_USERNAME`: API username for basic auth
    /// - `SERVICENOW_PASSWORD`: API password for basic auth
    ///
    /// # Optional Environment Variables
    ///
    /// - `SERVICENOW_API_VERSION` (default `v1`)
    /// - `SERVICENOW_TIMEOUT` per-call timeout in milliseconds (default 30000)
    /// - `SERVICENOW_RETRY_ATTEMPTS` (default 3)
    /// - `SERVICENOW_DEFAULT_SENDER_EMAIL`
    /// - `PORT` (default 8080)
    /// - `MCP_SCHEMA_PATH` (default `mcp-schema.json`)
    ///
    /// # Errors
    ///
    /// Returns `CourierError::Config` if any required variable is missing
    /// or if values fail validation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// dotenvy::dotenv().ok();
    /// let config = Config::from_env()?;
    /// ```
    pub fn from_env() -> Result<Self, CourierError> {
        let instance_url = Self::get_required_env("SERVICENOW_INSTANCE_URL")?;
        let username = Self::get_required_env("SERVICENOW_USERNAME")?;
        let password = Self::get_required_env("SERVICENOW_PASSWORD")?;

        let instance_url = Self::validate_instance_url(instance_url)?;
        Self::validate_password(&password)?;

        let api_version = Self::get_optional_env("SERVICENOW_API_VERSION")
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        let timeout_ms = Self::parse_optional_env("SERVICENOW_TIMEOUT")?
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        let retry_attempts = Self::parse_optional_env("SERVICENOW_RETRY_ATTEMPTS")?
            .unwrap_or(DEFAULT_RETRY_ATTEMPTS);

        let default_sender = Self::get_optional_env("SERVICENOW_DEFAULT_SENDER_EMAIL");

        let port = Self::parse_optional_env("PORT")?.unwrap_or(DEFAULT_PORT);

        let schema_path = Self::get_optional_env("MCP_SCHEMA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCHEMA_PATH));

        Ok(Config {
            instance_url,
            username,
            password,
            api_version,
            timeout: Duration::from_millis(timeout_ms),
            retry_attempts,
            default_sender,
            port,
            schema_path,
        })
    }

    /// Returns the retry policy for backend calls.
    ///
    /// The backoff base delay is fixed; only the attempt count is
    /// configurable.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts)
    }

    /// Gets a required environment variable, returning an error if missing or empty.
    fn get_required_env(name: &str) -> Result<String, CourierError> {
        env::var(name)
            .map_err(|_| CourierError::missing_env(name))
            .and_then(|value| {
                if value.trim().is_empty() {
                    Err(CourierError::missing_env(name))
                } else {
                    Ok(value)
                }
            })
    }

    /// Gets an optional environment variable, treating empty values as unset.
    fn get_optional_env(name: &str) -> Option<String> {
        env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Parses an optional numeric environment variable.
    fn parse_optional_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, CourierError> {
        match Self::get_optional_env(name) {
            None => Ok(None),
            Some(value) => value.parse::<T>().map(Some).map_err(|_| {
                CourierError::invalid_config(format!("{} must be a number, got {:?}", name, value))
            }),
        }
    }

    /// Validates and normalizes the instance URL.
    fn validate_instance_url(url: String) -> Result<String, CourierError> {
        let url = url.trim().trim_end_matches('/').to_string();

        let parsed = url::Url::parse(&url).map_err(|e| {
            CourierError::invalid_config(format!("SERVICENOW_INSTANCE_URL is not a valid URL: {}", e))
        })?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(CourierError::invalid_config(
                "SERVICENOW_INSTANCE_URL must start with http:// or https://",
            ));
        }

        Ok(url)
    }

    /// Validates the password is not a placeholder value.
    fn validate_password(password: &str) -> Result<(), CourierError> {
        let lower = password.to_lowercase();
        let placeholder_patterns = [
            "your_password",
            "your-password",
            "placeholder",
            "xxx",
            "changeme",
        ];

        for pattern in placeholder_patterns {
            if lower.contains(pattern) {
                return Err(CourierError::invalid_config(
                    "SERVICENOW_PASSWORD appears to be a placeholder value",
                ));
            }
        }

        Ok(())
    }
}
