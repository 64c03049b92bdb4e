//! Tiered email delivery through the ServiceNow Table API.
//!
//! Not every instance accepts direct writes to the outbound mail queue, so
//! delivery tries three strategies in strict order and falls through to the
//! next only when the previous one fails:
//!
//! 1. **Mail queue** - create a `sys_email` record that the instance's own
//!    mail infrastructure picks up and sends.
//! 2. **Notification** - look up the recipient's `sys_user` record and create
//!    a `sys_notification` preference record addressed to them.
//! 3. **Incident** - create an `incident` assigned to and reported by the
//!    recipient, carrying the message in its description.
//!
//! If all three fail the engine returns a terminal `{status: "error"}` result
//! carrying the first operation's failure message. Callers always get a
//! [`DeliveryResult`], never an error: a failed delivery is a valid
//! application-level outcome and must not fail the transport call.

use serde_json::{json, Value};

use crate::config::Config;
use crate::error::CourierError;
use crate::models::{DeliveryMethod, DeliveryResult, EmailRequest, User};
use crate::snow_client::SnowClient;

/// Priority weight stamped on outbound mail records.
const MAIL_WEIGHT: &str = "100";

/// Delivery engine for a single ServiceNow instance.
///
/// Holds no per-request state; one engine is shared read-only across all
/// concurrent requests.
#[derive(Clone)]
pub struct DeliveryEngine {
    /// Table API client.
    client: SnowClient,

    /// Sender used when a request carries no `from` address.
    default_sender: Option<String>,

    /// Final sender fallback: the API username.
    username: String,
}

impl DeliveryEngine {
    /// Creates a delivery engine over the given client.
    pub fn new(client: SnowClient, config: &Config) -> Self {
        Self {
            client,
            default_sender: config.default_sender.clone(),
            username: config.username.clone(),
        }
    }

    /// Delivers one email, falling through the strategy chain as needed.
    ///
    /// Never returns an error: every failure mode collapses into a terminal
    /// [`DeliveryResult`] for the dispatcher to pass through.
    pub async fn send_email(&self, request: &EmailRequest) -> DeliveryResult {
        let sender = self.resolve_sender(request);

        tracing::info!(to = %request.to, subject = %request.subject, "Sending email via mail queue");

        let primary_err = match self.queue_mail(request, &sender).await {
            Ok(result) => return result,
            Err(e) => {
                tracing::warn!(
                    error = %self.sanitize(&e),
                    "Mail queue record creation failed, trying user notification"
                );
                e
            }
        };

        match self.notify_user(request).await {
            Ok(result) => return result,
            Err(e) => {
                tracing::warn!(
                    error = %self.sanitize(&e),
                    "Notification fallback failed, trying incident creation"
                );
            }
        }

        match self.create_incident(request, &sender).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    error = %self.sanitize(&e),
                    "All delivery methods failed"
                );
                // The primary failure is the meaningful one to report.
                DeliveryResult::failed(self.sanitize(&primary_err))
            }
        }
    }

    /// Resolves the sender address: request `from`, then the configured
    /// default, then the API username.
    fn resolve_sender(&self, request: &EmailRequest) -> String {
        request
            .from
            .clone()
            .or_else(|| self.default_sender.clone())
            .unwrap_or_else(|| self.username.clone())
    }

    /// Operation 1: create an outbound mail-queue record (`sys_email`).
    async fn queue_mail(
        &self,
        request: &EmailRequest,
        sender: &str,
    ) -> Result<DeliveryResult, CourierError> {
        let body = format_body(&request.body);
        let is_html = body.contains('<');

        let payload = json!({
            // Required for the instance's mail sender to pick the record up.
            "type": "email",
            "state": "ready",
            "mailbox": "outbox",

            "recipients": request.to,
            "subject": request.subject,
            "body": body,

            // Sender must be a valid address for SMTP relaying.
            "from": sender,
            "fromAddress": sender,

            "weight": MAIL_WEIGHT,
            "notification_type": "SMTP",
            "direct": if is_html { "true" } else { "false" },

            // Raw headers block; From/To must match fromAddress/recipients.
            "headers": format!(
                "To: {}\r\nFrom: {}\r\nSubject: {}\r\nImportance: High\r\nContent-Type: {}; charset=UTF-8",
                request.to,
                sender,
                request.subject,
                if is_html { "text/html" } else { "text/plain" },
            ),
        });

        let record = self.client.create_record("sys_email", &payload).await?;
        let sys_id = record_field(&record, "sys_email", "sys_id")?;

        tracing::info!(sys_id = %sys_id, "Mail queue record created");

        Ok(DeliveryResult::sent(DeliveryMethod::MailQueue, sys_id, record))
    }

    /// Operation 2: create a notification-preference record for the
    /// recipient's user (`sys_notification`).
    async fn notify_user(&self, request: &EmailRequest) -> Result<DeliveryResult, CourierError> {
        let user = self.require_user(&request.to).await?;

        let payload = json!({
            "user": user.sys_id,
            "state": "ready",
            "device_type": "email",
            "notification_type": "email",
            "message": request.body,
            "description": request.subject,
            "action_insert": true,
            "action_update": true,
            "active": true,
        });

        let record = self.client.create_record("sys_notification", &payload).await?;
        let sys_id = record_field(&record, "sys_notification", "sys_id")?;

        tracing::info!(sys_id = %sys_id, user = %user.sys_id, "Notification record created");

        Ok(DeliveryResult::sent(
            DeliveryMethod::Notification,
            sys_id,
            record,
        ))
    }

    /// Operation 3: create an incident assigned to the recipient.
    async fn create_incident(
        &self,
        request: &EmailRequest,
        sender: &str,
    ) -> Result<DeliveryResult, CourierError> {
        let user = self.require_user(&request.to).await?;

        let payload = json!({
            "short_description": format!("[Email] {}", request.subject),
            "description": request.body,
            "urgency": "2",
            "impact": "3",
            "priority": "3",
            "assigned_to": user.sys_id,
            "caller_id": user.sys_id,
            "category": "inquiry",
            "contact_type": "email",
            "comments": format!("This incident was created to deliver an email from {}", sender),
        });

        let record = self.client.create_record("incident", &payload).await?;
        // Incidents are reported by their human-readable number.
        let number = record_field(&record, "incident", "number")?;

        tracing::info!(number = %number, user = %user.sys_id, "Incident record created");

        Ok(DeliveryResult::sent(DeliveryMethod::Incident, number, record))
    }

    /// Looks up the backend user for a recipient, failing the strategy when
    /// no user exists.
    async fn require_user(&self, email: &str) -> Result<User, CourierError> {
        self.client
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| CourierError::user_not_found(email))
    }

    /// Sanitizes an error message for logs and result bodies.
    fn sanitize(&self, error: &CourierError) -> String {
        error.sanitized_display(self.client.password_for_sanitization())
    }
}

/// Wraps a plain-text body in a minimal markup tag so downstream rendering
/// is consistent. Bodies that already contain markup pass through untouched.
fn format_body(body: &str) -> String {
    if body.contains('<') {
        body.to_string()
    } else {
        format!("<p>{}</p>", body)
    }
}

/// Extracts a string identifier field from a created record.
fn record_field(record: &Value, table: &str, field: &str) -> Result<String, CourierError> {
    record
        .get(field)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CourierError::MissingRecordField {
            table: table.to_string(),
            field: field.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::DeliveryStatus;
    use std::path::PathBuf;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(instance_url: &str) -> Config {
        Config {
            instance_url: instance_url.to_string(),
            username: "api.user".to_string(),
            password: "test_pw_12345".to_string(),
            api_version: "v1".to_string(),
            timeout: Duration::from_secs(5),
            // No retries: delivery tests exercise the fallback chain, not backoff.
            retry_attempts: 0,
            default_sender: Some("noreply@example.com".to_string()),
            port: 8080,
            schema_path: PathBuf::from("mcp-schema.json"),
        }
    }

    fn test_engine(config: &Config) -> DeliveryEngine {
        DeliveryEngine::new(SnowClient::new(config).unwrap(), config)
    }

    fn email() -> EmailRequest {
        EmailRequest {
            to: "abel@example.com".to_string(),
            subject: "Maintenance window".to_string(),
            body: "Servers restart at 22:00".to_string(),
            from: None,
        }
    }

    #[test]
    fn test_format_body_wraps_plain_text() {
        assert_eq!(format_body("hello"), "<p>hello</p>");
    }

    #[test]
    fn test_format_body_keeps_markup() {
        assert_eq!(format_body("<h1>hi</h1>"), "<h1>hi</h1>");
    }

    #[tokio::test]
    async fn test_mail_queue_success_short_circuits() {
        let server = MockServer::start().await;
        let config = test_config(&server.uri());

        Mock::given(method("POST"))
            .and(path("/api/now/v1/table/sys_email"))
            .and(body_partial_json(serde_json::json!({
                "mailbox": "outbox",
                "recipients": "abel@example.com",
                "from": "noreply@example.com",
                "body": "<p>Servers restart at 22:00</p>",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "result": {"sys_id": "mail1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        // Fallbacks must not be attempted on success.
        Mock::given(method("GET"))
            .and(path("/api/now/v1/table/sys_user"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = test_engine(&config).send_email(&email()).await;

        assert_eq!(result.status, DeliveryStatus::Sent);
        assert_eq!(result.method, Some(DeliveryMethod::MailQueue));
        assert_eq!(result.message_id.as_deref(), Some("mail1"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_explicit_from_overrides_default_sender() {
        let server = MockServer::start().await;
        let config = test_config(&server.uri());

        Mock::given(method("POST"))
            .and(path("/api/now/v1/table/sys_email"))
            .and(body_partial_json(serde_json::json!({
                "from": "alerts@example.com",
                "fromAddress": "alerts@example.com",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "result": {"sys_id": "mail2"}
            })))
            .mount(&server)
            .await;

        let mut request = email();
        request.from = Some("alerts@example.com".to_string());
        let result = test_engine(&config).send_email(&request).await;

        assert_eq!(result.status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn test_fallback_to_notification() {
        let server = MockServer::start().await;
        let config = test_config(&server.uri());

        Mock::given(method("POST"))
            .and(path("/api/now/v1/table/sys_email"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"message": "Insufficient rights"}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/now/v1/table/sys_user"))
            .and(query_param("sysparm_query", "email=abel@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": [{"sys_id": "u1", "email": "abel@example.com"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/now/v1/table/sys_notification"))
            .and(body_partial_json(serde_json::json!({"user": "u1"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "result": {"sys_id": "notif1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        // The incident tier must not run when the notification tier works.
        Mock::given(method("POST"))
            .and(path("/api/now/v1/table/incident"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let result = test_engine(&config).send_email(&email()).await;

        assert_eq!(result.status, DeliveryStatus::Sent);
        assert_eq!(result.method, Some(DeliveryMethod::Notification));
        assert_eq!(result.message_id.as_deref(), Some("notif1"));
    }

    #[tokio::test]
    async fn test_fallback_to_incident_reports_number() {
        let server = MockServer::start().await;
        let config = test_config(&server.uri());

        Mock::given(method("POST"))
            .and(path("/api/now/v1/table/sys_email"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/now/v1/table/sys_user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": [{"sys_id": "u1", "email": "abel@example.com"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/now/v1/table/sys_notification"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/now/v1/table/incident"))
            .and(body_partial_json(serde_json::json!({
                "short_description": "[Email] Maintenance window",
                "assigned_to": "u1",
                "caller_id": "u1",
                "contact_type": "email",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "result": {"sys_id": "inc-sys", "number": "INC0010042"}
            })))
            .mount(&server)
            .await;

        let result = test_engine(&config).send_email(&email()).await;

        assert_eq!(result.status, DeliveryStatus::Sent);
        assert_eq!(result.method, Some(DeliveryMethod::Incident));
        assert_eq!(result.message_id.as_deref(), Some("INC0010042"));
    }

    #[tokio::test]
    async fn test_all_tiers_fail_reports_first_error() {
        let server = MockServer::start().await;
        let config = test_config(&server.uri());

        Mock::given(method("POST"))
            .and(path("/api/now/v1/table/sys_email"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"message": "Insufficient rights"}
            })))
            .mount(&server)
            .await;

        // Recipient has no user record: both fallback tiers fail structurally.
        Mock::given(method("GET"))
            .and(path("/api/now/v1/table/sys_user"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": []})),
            )
            .mount(&server)
            .await;

        let result = test_engine(&config).send_email(&email()).await;

        assert_eq!(result.status, DeliveryStatus::Error);
        assert!(result.method.is_none());
        assert!(result.message_id.is_none());
        // The terminal error is operation 1's failure, not the last one seen.
        let error = result.error.expect("error message");
        assert!(error.contains("Insufficient rights"), "got: {}", error);
    }

    #[tokio::test]
    async fn test_missing_sys_id_counts_as_failure() {
        let server = MockServer::start().await;
        let config = test_config(&server.uri());

        // Created "successfully" but without an identifier.
        Mock::given(method("POST"))
            .and(path("/api/now/v1/table/sys_email"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"result": {}})),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/now/v1/table/sys_user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": [{"sys_id": "u1"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/now/v1/table/sys_notification"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "result": {"sys_id": "notif1"}
            })))
            .mount(&server)
            .await;

        let result = test_engine(&config).send_email(&email()).await;

        assert_eq!(result.method, Some(DeliveryMethod::Notification));
    }
}
