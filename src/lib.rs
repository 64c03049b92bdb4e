//! # Courier
//!
//! Courier is an MCP (Model Context Protocol) bridge that exposes a single
//! `send_email` function over JSON-RPC-on-HTTP, backed by the ServiceNow
//! Table API.
//!
//! ## Features
//!
//! - **Email delivery**: Queues outbound mail through the `sys_email` table
//! - **Fallback chain**: Falls back to a user notification record, then an
//!   incident, so a request always lands somewhere visible
//! - **Two request flavors**: JSON-RPC 2.0 (`initialize`, `tools/list`,
//!   `executeFunction`) and a legacy flat `{function_name, parameters}` shape
//! - **Error handling**: Automatic retry for failed backend calls with
//!   exponential backoff
//! - **Security**: The instance password is never logged or exposed in
//!   error messages
//!
//! ## Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`config`] - Configuration loading from environment variables
//! - [`error`] - Error types with security-conscious message sanitization
//! - [`retry`] - Retry policy with exponential backoff
//! - [`snow_client`] - HTTP client for the ServiceNow Table API
//! - [`delivery`] - The three-tier fallback delivery engine
//! - [`server`] - HTTP dispatcher for both request flavors
//! - [`models`] - Data models for requests, results, and API envelopes
//!
//! ## Usage
//!
//! Courier is primarily used as a binary. To run:
//!
//! ```bash
//! # Set required environment variables
//! export SERVICENOW_INSTANCE_URL=https://dev12345.service-now.com
//! export SERVICENOW_USERNAME=api.user
//! export SERVICENOW_PASSWORD=secret
//!
//! # Run the bridge
//! ./courier
//! ```
//!
//! ## Configuration
//!
//! Courier requires three environment variables:
//!
//! - `SERVICENOW_INSTANCE_URL`: Base URL of the ServiceNow instance
//! - `SERVICENOW_USERNAME`: API username for basic authentication
//! - `SERVICENOW_PASSWORD`: API password for basic authentication
//!
//! Optional:
//! - `SERVICENOW_API_VERSION` (default `v1`)
//! - `SERVICENOW_TIMEOUT` per-call timeout in milliseconds (default `30000`)
//! - `SERVICENOW_RETRY_ATTEMPTS` (default `3`)
//! - `SERVICENOW_DEFAULT_SENDER_EMAIL` fallback sender address
//! - `PORT` HTTP listen port (default `8080`)
//! - `MCP_SCHEMA_PATH` schema document path (default `mcp-schema.json`)
//! - `RUST_LOG` log level (e.g., `courier=debug`)
//!
//! ## Security Considerations
//!
//! The instance password is stored only in memory and is:
//! - Never logged at any log level
//! - Sanitized from all error messages
//! - Not included in any response body
//!
//! ## Example
//!
//! Using the [`DeliveryEngine`](delivery::DeliveryEngine) directly:
//!
//! ```ignore
//! use courier::config::Config;
//! use courier::delivery::DeliveryEngine;
//! use courier::models::EmailRequest;
//! use courier::snow_client::SnowClient;
//!
//! async fn example() -> Result<(), courier::error::CourierError> {
//!     let config = Config::from_env()?;
//!     let client = SnowClient::new(&config)?;
//!     let engine = DeliveryEngine::new(client, &config);
//!
//!     let result = engine
//!         .send_email(&EmailRequest {
//!             to: "abel.tuter@example.com".to_string(),
//!             subject: "Maintenance window".to_string(),
//!             body: "<p>Tonight at 22:00.</p>".to_string(),
//!             from: None,
//!         })
//!         .await;
//!
//!     println!("delivered via {:?}: {:?}", result.method, result.message_id);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod delivery;
pub mod error;
pub mod models;
pub mod retry;
pub mod server;
pub mod snow_client;
