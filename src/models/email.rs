//! Email request and delivery result models.

use serde::{Deserialize, Serialize};

/// A request to deliver one email.
///
/// `to`, `subject`, and `body` are required and must be non-empty; absence is
/// a client input error surfaced by the dispatcher, never a delivery failure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailRequest {
    /// Recipient email address.
    pub to: String,

    /// Subject line.
    pub subject: String,

    /// Body content; may contain HTML markup.
    pub body: String,

    /// Optional sender address. When absent the configured default sender,
    /// then the API username, is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl EmailRequest {
    /// Checks that all required fields are present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns a message naming the missing fields, suitable for an
    /// invalid-params response.
    pub fn validate(&self) -> Result<(), String> {
        if self.to.trim().is_empty() || self.subject.trim().is_empty() || self.body.trim().is_empty()
        {
            return Err(
                "Missing required parameters (to, subject, body)".to_string(),
            );
        }
        Ok(())
    }
}

/// Terminal status of a delivery attempt chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// The message was handed to a backend delivery mechanism.
    Sent,
    /// The message was only recorded in the instance's audit journal.
    ///
    /// Retained on the wire for consumers of the previous service; the
    /// current fallback chain does not produce it.
    Logged,
    /// All delivery strategies failed.
    Error,
}

/// Which delivery strategy produced the backend record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMethod {
    /// Direct record in the outbound mail queue (`sys_email`).
    #[serde(rename = "mail-queue")]
    MailQueue,
    /// Notification-preference record for the recipient user.
    #[serde(rename = "notification")]
    Notification,
    /// Incident record created as a delivery substitute.
    #[serde(rename = "incident")]
    Incident,
}

/// Normalized outcome of a delivery attempt chain.
///
/// Exactly one of `{method, message_id}` or `error` is populated in a
/// terminal result. A failed delivery is a valid application-level outcome:
/// the dispatcher still answers the transport call successfully and carries
/// this result in the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// Terminal status of the chain.
    pub status: DeliveryStatus,

    /// Strategy that succeeded (present when status is `sent`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<DeliveryMethod>,

    /// Opaque identifier of the backend record that was created.
    #[serde(
        rename = "messageId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub message_id: Option<String>,

    /// Raw backend payload for the created record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Failure message (present when status is `error`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryResult {
    /// Builds a successful result for the given strategy.
    pub fn sent(
        method: DeliveryMethod,
        message_id: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            status: DeliveryStatus::Sent,
            method: Some(method),
            message_id: Some(message_id.into()),
            details: Some(details),
            error: None,
        }
    }

    /// Builds a terminal failure result.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::Error,
            method: None,
            message_id: None,
            details: None,
            error: Some(error.into()),
        }
    }
}
