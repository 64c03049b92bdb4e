//! Courier - ServiceNow email bridge
//!
//! This binary runs an HTTP server exposing the `send_email` function over
//! JSON-RPC 2.0 and a legacy flat request shape, delivering mail through
//! the ServiceNow Table API with a three-tier fallback chain.
//!
//! # Configuration
//!
//! Set the following environment variables (or use a `.env` file):
//!
//! - `SERVICENOW_INSTANCE_URL`: Base URL of the ServiceNow instance
//! - `SERVICENOW_USERNAME`: API username for basic authentication
//! - `SERVICENOW_PASSWORD`: API password for basic authentication
//!
//! # Usage
//!
//! ```bash
//! # Direct execution
//! ./courier
//!
//! # With environment variables
//! SERVICENOW_INSTANCE_URL=https://dev12345.service-now.com \
//! SERVICENOW_USERNAME=api.user SERVICENOW_PASSWORD=xxx ./courier
//! ```

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use courier::{config, delivery, server, snow_client};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore errors if not found)
    dotenvy::dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("courier=info")),
        )
        .init();

    tracing::info!("Starting Courier bridge v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration from environment
    let config = config::Config::from_env().context("Failed to load configuration")?;

    tracing::debug!("Configuration loaded, instance_url: {}", config.instance_url);

    // Create the ServiceNow client
    let client =
        snow_client::SnowClient::new(&config).context("Failed to create ServiceNow client")?;

    // Test connection before starting
    tracing::info!("Testing connection to ServiceNow...");
    if let Err(e) = client.test_connection().await {
        tracing::error!(error = %e, "Connection test failed");
        // Continue anyway - the instance might become available later
        tracing::warn!(
            "Server will start but may not be able to reach ServiceNow. \
             Check configuration and network connectivity."
        );
    }

    let engine = delivery::DeliveryEngine::new(client, &config);

    let app = server::router(server::AppState {
        engine,
        instance_url: config.instance_url.clone(),
        api_version: config.api_version.clone(),
        schema_path: config.schema_path.clone(),
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error during operation")?;

    tracing::info!("Server shutting down");

    Ok(())
}

/// Resolves when the process receives Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl-C handler");
    }
}
