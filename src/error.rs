//! Error types for the Courier bridge.
//!
//! This module defines `CourierError`, the unified error type used throughout
//! the application for consistent error handling and propagation.
//!
//! # Security
//!
//! All error messages are sanitized to ensure the ServiceNow password is never
//! leaked in logs or error responses. Use `sanitize_message()` when
//! constructing error messages from external sources.

use std::time::Duration;
use thiserror::Error;

/// JSON-RPC error codes used by the protocol dispatcher.
pub mod rpc_codes {
    /// Method or function not found.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid or missing parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal error during execution.
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Unified error type for all Courier operations.
///
/// Each variant provides specific context about the failure, enabling
/// meaningful error messages without leaking sensitive information
/// like the backend password.
#[derive(Error, Debug)]
pub enum CourierError {
    /// Configuration error - missing or invalid environment variables.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP request failed during transmission.
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// HTTP client initialization failed.
    #[error("HTTP client error: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// HTTP response returned a non-success status code.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// The HTTP status code returned.
        status: reqwest::StatusCode,
        /// The response body, potentially containing error details.
        body: String,
    },

    /// Request timed out.
    #[error("request timed out after {duration:?} - the instance may be slow or unreachable")]
    Timeout {
        /// How long we waited before timing out.
        duration: Duration,
        /// The operation that timed out.
        operation: String,
    },

    /// ServiceNow Table API returned an error response.
    #[error("ServiceNow API error ({status}): {message}")]
    Api {
        /// HTTP status reported alongside the error body.
        status: reqwest::StatusCode,
        /// Human-readable error message from the instance.
        message: String,
    },

    /// No backend user exists with the given email address.
    ///
    /// This is a structural failure: it advances the fallback chain
    /// immediately and is never retried.
    #[error("user with email {email} not found")]
    UserNotFound {
        /// The email address that matched no user record.
        email: String,
    },

    /// A create-record call succeeded but the response was missing the
    /// identifier field we need to report a message id.
    #[error("created {table} record but response had no {field} field")]
    MissingRecordField {
        /// The table the record was created in.
        table: String,
        /// The identifier field that was absent.
        field: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input validation failed.
    #[error("validation error: {0}")]
    Validation(String),
}

impl CourierError {
    /// Creates a configuration error for a missing environment variable.
    pub fn missing_env(var_name: &str) -> Self {
        CourierError::Config(format!(
            "missing required environment variable: {}",
            var_name
        ))
    }

    /// Creates a configuration error for an invalid value.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        CourierError::Config(message.into())
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        CourierError::Validation(message.into())
    }

    /// Creates a timeout error.
    pub fn timeout(duration: Duration, operation: impl Into<String>) -> Self {
        CourierError::Timeout {
            duration,
            operation: operation.into(),
        }
    }

    /// Creates a user-not-found error for a recipient address.
    pub fn user_not_found(email: impl Into<String>) -> Self {
        CourierError::UserNotFound {
            email: email.into(),
        }
    }

    /// Sanitizes an error message to remove any occurrence of the password.
    ///
    /// This is critical for security - credentials must never appear in logs,
    /// error messages, or responses to users.
    ///
    /// # Arguments
    ///
    /// * `message` - The message to sanitize
    /// * `password` - The password to strip from the message
    ///
    /// # Returns
    ///
    /// The message with any occurrence of the password replaced with `[REDACTED]`
    #[must_use]
    pub fn sanitize_message(message: &str, password: &str) -> String {
        if password.is_empty() {
            return message.to_string();
        }
        message.replace(password, "[REDACTED]")
    }

    /// Creates a sanitized version of this error's display message.
    ///
    /// Use this when you need to include error details in logs or responses
    /// and want to ensure no sensitive data is leaked.
    #[must_use]
    pub fn sanitized_display(&self, password: &str) -> String {
        Self::sanitize_message(&self.to_string(), password)
    }
}
