//! Protocol dispatcher: one HTTP endpoint speaking two request flavors.
//!
//! `POST /mcp` bodies carrying `jsonrpc: "2.0"` are dispatched through the
//! JSON-RPC state machine (`initialize`, `notifications/initialized`,
//! `tools/list`, `executeFunction`); everything else is treated as a legacy
//! flat call (`{function_name, parameters}`) and answered with plain HTTP
//! status codes. `GET /mcp` serves a static tool manifest for out-of-band
//! discovery, `GET /mcp/schema` a schema document loaded from disk, and
//! `GET /health` a liveness summary.
//!
//! Delivery failures are application-level outcomes: the dispatcher answers
//! the transport call successfully and carries `{status: "error"}` in the
//! body. Only dispatcher-internal faults become 500-class responses.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::timeout::TimeoutLayer;

use crate::delivery::DeliveryEngine;
use crate::error::{rpc_codes, CourierError};
use crate::models::{
    EmailRequest, ExecuteFunctionParams, LegacyRequest, RpcRequest, RpcResponse, JSONRPC_VERSION,
};

/// The single function this bridge exposes.
const FUNCTION_NAME: &str = "send_email";

/// Protocol version reported during the initialize handshake.
const PROTOCOL_VERSION: &str = "2025-06-18";

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Delivery engine invoked by `executeFunction` and legacy calls.
    pub engine: DeliveryEngine,

    /// Instance URL echoed (without secrets) by the health endpoint.
    pub instance_url: String,

    /// Table API version echoed by the health endpoint.
    pub api_version: String,

    /// Path of the static schema document served at `/mcp/schema`.
    pub schema_path: PathBuf,
}

/// Timeout for the read-only discovery and health endpoints.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the application router.
///
/// The read-only endpoints carry a short timeout. `POST /mcp` does not:
/// the delivery chain's own per-call timeouts and bounded retries cap its
/// latency, and cutting it off mid-tier would lose the fallback guarantee.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/mcp", get(get_manifest))
        .route("/mcp/schema", get(get_schema))
        .route("/health", get(get_health))
        .layer(TimeoutLayer::new(READ_TIMEOUT))
        .route("/mcp", post(post_mcp))
        .with_state(Arc::new(state))
}

/// JSON parameter schema for the `send_email` function.
///
/// Shared between the manifest, the initialize handshake, and `tools/list`.
fn parameter_schema() -> Value {
    json!({
        "type": ["object"],
        "properties": {
            "to": {
                "type": ["string"],
                "description": "Email address of the recipient"
            },
            "subject": {
                "type": ["string"],
                "description": "Subject of the email"
            },
            "body": {
                "type": ["string"],
                "description": "Body content of the email (can include HTML)"
            },
            "from": {
                "type": ["string"],
                "description": "Optional sender email address"
            }
        },
        "required": ["to", "subject", "body"],
        "additionalProperties": false
    })
}

/// The function descriptor used by `initialize` and the manifest.
fn function_descriptor() -> Value {
    json!({
        "name": FUNCTION_NAME,
        "description": "Send an email through ServiceNow",
        "parameters": parameter_schema()
    })
}

/// `GET /mcp` - static tool manifest for out-of-band discovery.
async fn get_manifest(headers: HeaderMap) -> Json<Value> {
    tracing::debug!("Serving tool manifest");

    let host = headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    Json(json!({
        "schema_version": "v1",
        "name_for_human": "ServiceNow Email",
        "name_for_model": "servicenow_email",
        "description_for_human": "Send emails through ServiceNow",
        "description_for_model": "Use this tool to send emails through the ServiceNow platform.",
        "auth": { "type": "none" },
        "api": {
            "type": "openapi",
            "url": format!("http://{}/mcp/schema", host)
        },
        "tools": [function_descriptor()]
    }))
}

/// `POST /mcp` - classify the body and dispatch per flavor.
async fn post_mcp(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Response {
    if body.get("jsonrpc").and_then(Value::as_str) == Some(JSONRPC_VERSION) {
        return dispatch_rpc(&state, body).await.into_response();
    }

    dispatch_legacy(&state, body).await
}

/// Dispatches a JSON-RPC 2.0 request by method name.
///
/// Every outcome, including errors, is an HTTP 200 carrying a JSON-RPC
/// envelope; the transport call itself never fails for protocol reasons.
async fn dispatch_rpc(state: &AppState, body: Value) -> Json<RpcResponse> {
    let request: RpcRequest = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(e) => {
            return Json(RpcResponse::error(
                None,
                rpc_codes::INVALID_PARAMS,
                format!("Invalid params: {}", e),
            ));
        }
    };

    tracing::info!(method = %request.method, "Handling JSON-RPC request");

    let response = match request.method.as_str() {
        "initialize" => RpcResponse::result(
            request.id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": "ServiceNow MCP",
                    "version": env!("CARGO_PKG_VERSION")
                },
                "capabilities": {
                    "functions": [function_descriptor()]
                }
            }),
        ),

        // One-way notification: acknowledge with a bare envelope.
        "notifications/initialized" => RpcResponse::ack(),

        "tools/list" => RpcResponse::result(
            request.id,
            json!({
                "tools": [{
                    "name": FUNCTION_NAME,
                    "description": "Send an email through ServiceNow",
                    "is_declarative": false,
                    "input_schema": parameter_schema()
                }]
            }),
        ),

        "executeFunction" => execute_function(state, request.id, request.params).await,

        other => RpcResponse::error(
            request.id,
            rpc_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", other),
        ),
    };

    Json(response)
}

/// Handles `executeFunction`: validate the call, run the delivery engine,
/// and map its result into the JSON-RPC envelope.
async fn execute_function(state: &AppState, id: Option<Value>, params: Option<Value>) -> RpcResponse {
    let params: ExecuteFunctionParams = match params.map(serde_json::from_value).transpose() {
        Ok(params) => params.unwrap_or(ExecuteFunctionParams {
            name: None,
            parameters: None,
        }),
        Err(e) => {
            return RpcResponse::error(
                id,
                rpc_codes::INVALID_PARAMS,
                format!("Invalid params: {}", e),
            );
        }
    };

    let name = params.name.as_deref().unwrap_or_default();
    if name != FUNCTION_NAME {
        return RpcResponse::error(
            id,
            rpc_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", name),
        );
    }

    let Some(parameters) = params.parameters else {
        return RpcResponse::error(
            id,
            rpc_codes::INVALID_PARAMS,
            "Invalid params: Missing parameters",
        );
    };

    let email = match parse_email_request(parameters) {
        Ok(email) => email,
        Err(message) => {
            return RpcResponse::error(id, rpc_codes::INVALID_PARAMS, message);
        }
    };

    tracing::info!(to = %email.to, "Executing send_email");

    let result = state.engine.send_email(&email).await;

    match serde_json::to_value(&result) {
        Ok(value) => RpcResponse::result(id, value),
        Err(e) => RpcResponse::error(
            id,
            rpc_codes::INTERNAL_ERROR,
            format!("Internal error: {}", e),
        ),
    }
}

/// Extracts and validates an [`EmailRequest`] from raw call parameters.
fn parse_email_request(parameters: Value) -> Result<EmailRequest, String> {
    let email: EmailRequest = serde_json::from_value(parameters)
        .map_err(|_| "Invalid params: Missing required parameters (to, subject, body)".to_string())?;
    email
        .validate()
        .map_err(|message| format!("Invalid params: {}", message))?;
    Ok(email)
}

/// Dispatches a legacy flat request (`{function_name, parameters}`).
async fn dispatch_legacy(state: &AppState, body: Value) -> Response {
    // Non-object bodies carry no function_name either.
    let request: LegacyRequest = serde_json::from_value(body).unwrap_or(LegacyRequest {
        function_name: None,
        parameters: None,
    });

    let Some(function_name) = request.function_name else {
        return error_response(
            StatusCode::BAD_REQUEST,
            json!({"error": "Missing function_name in request"}),
        );
    };

    if function_name != FUNCTION_NAME {
        return error_response(
            StatusCode::NOT_FOUND,
            json!({"error": format!("Unknown function: {}", function_name)}),
        );
    }

    let Some(parameters) = request.parameters else {
        return error_response(
            StatusCode::BAD_REQUEST,
            json!({"error": "Missing parameters for send_email function"}),
        );
    };

    let email = match parse_email_request(parameters) {
        Ok(email) => email,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                json!({"error": "Missing required parameters: to, subject, and body are required"}),
            );
        }
    };

    tracing::info!(to = %email.to, "Executing legacy send_email");

    let result = state.engine.send_email(&email).await;
    Json(result).into_response()
}

/// `GET /mcp/schema` - raw schema document from external static configuration.
async fn get_schema(State(state): State<Arc<AppState>>) -> Response {
    match load_schema(&state.schema_path).await {
        Ok(schema) => Json(schema).into_response(),
        Err(e) => {
            tracing::error!(path = %state.schema_path.display(), error = %e, "Failed to load MCP schema");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "Failed to load MCP schema", "message": e.to_string()}),
            )
        }
    }
}

/// Reads and parses the schema document.
async fn load_schema(path: &Path) -> Result<Value, CourierError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        CourierError::invalid_config(format!("cannot read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&raw).map_err(CourierError::Serialization)
}

/// `GET /health` - liveness summary; never exposes credentials.
async fn get_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "serverTime": chrono::Utc::now().to_rfc3339(),
        "config": {
            "instanceUrl": state.instance_url,
            "apiVersion": state.api_version
        }
    }))
}

/// Builds a JSON error response with the given status.
fn error_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}
