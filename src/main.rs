//! Socratic Tutor · K-12 tutoring backend
//!
//! - Axum HTTP API under `/api/v1`
//! - Guidance policy: hint levels, Socratic prompts, phrase de-duplication
//! - OpenAI chat completions (disabled until a key is configured)
//! - Teacher analytics: usage series and daily insights
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   OPENAI_API_KEY    : enables the tutor if present
//!   OPENAI_BASE_URL   : default "https://api.openai.com/v1"
//!   AI_MODEL          : default "gpt-4o-mini"
//!   TUTOR_CONFIG_PATH : optional TOML file (port, [llm], [tutor])
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod config;
mod domain;
mod error;
mod guidance;
mod insights;
mod openai;
mod protocol;
mod routes;
mod sanitizer;
mod state;
mod store;
mod telemetry;
mod tutor;
mod util;

#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::AppConfig;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let config = AppConfig::load();
  let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

  // Shared state: store, optional OpenAI client, resolved config.
  let state = Arc::new(AppState::new(config));
  let app = build_router(state);

  let listener = TcpListener::bind(addr).await?;
  info!(target: "socratic_tutor", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "socratic_tutor", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "socratic_tutor", error = %e, "Failed to listen for shutdown signal");
  }
}
