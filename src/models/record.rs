//! ServiceNow Table API envelope and record models.

use serde::Deserialize;

/// Envelope for Table API list responses: `{ "result": [ ... ] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct TableListResponse<T> {
    /// The matching records.
    #[serde(default = "Vec::new")]
    pub result: Vec<T>,
}

/// Envelope for Table API single-record responses: `{ "result": { ... } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct TableRecordResponse<T> {
    /// The created or fetched record.
    pub result: T,
}

/// The slice of a `sys_user` record the delivery engine needs.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// Internal record identifier.
    pub sys_id: String,

    /// Display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
}

/// Error body shape returned by the Table API on failure.
///
/// `{ "error": { "message": "...", "detail": "..." }, "status": "failure" }`
#[derive(Debug, Clone, Deserialize)]
pub struct TableErrorResponse {
    /// The error block.
    pub error: TableErrorDetail,
}

/// Message/detail pair inside a Table API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct TableErrorDetail {
    /// Short error message.
    #[serde(default)]
    pub message: String,

    /// Longer explanation, if any.
    #[serde(default)]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_envelope_deserializes() {
        let body = r#"{"result": [{"sys_id": "u1", "name": "Abel Tuter", "email": "abel@example.com"}]}"#;
        let parsed: TableListResponse<User> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.result.len(), 1);
        assert_eq!(parsed.result[0].sys_id, "u1");
        assert_eq!(parsed.result[0].email.as_deref(), Some("abel@example.com"));
    }

    #[test]
    fn test_list_envelope_tolerates_missing_result() {
        let parsed: TableListResponse<User> = serde_json::from_str("{}").unwrap();
        assert!(parsed.result.is_empty());
    }

    #[test]
    fn test_record_envelope_deserializes_opaque_value() {
        let body = r#"{"result": {"sys_id": "abc", "number": "INC0010001"}}"#;
        let parsed: TableRecordResponse<serde_json::Value> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.result["number"], "INC0010001");
    }

    #[test]
    fn test_error_body_deserializes() {
        let body = r#"{"error": {"message": "User Not Authenticated", "detail": "Required to provide Auth information"}, "status": "failure"}"#;
        let parsed: TableErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.message, "User Not Authenticated");
        assert!(parsed.error.detail.is_some());
    }
}
