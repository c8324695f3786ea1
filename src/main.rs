//! Application entry point for the `kobo-forms-adapter` service.
//!
//! This binary orchestrates the startup sequence for the Kobo forms API:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Building the shared outbound HTTP client
//! - Mounting all API routes via the `routes` gateway (EMBP pattern)
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! - `KOBO_USERNAME`, `KOBO_PW` (**required per request**) – KoboToolbox basic-auth credentials
//! - `PORT` (optional) – listen port (default: 8080)
//! - `KOBO_USER_AGENT` (optional) – user agent for outbound Kobo calls
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! This module follows the Explicit Module Boundary Pattern (EMBP): the
//! pipeline stages live in sibling modules and routes only see the names
//! re-exported here.
use std::{env, net::SocketAddr};

use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

mod config;
mod dates;
mod error;
mod filter;
mod kobo;
mod models;
mod params;
mod routes;

// Re-exported for routes/*.rs, which only know their parent module.
pub use error::ApiError;
pub use filter::{filter_and_sort, DateWindow};
pub use models::{FormResponse, NormalizedRecord};
pub use params::FormsQuery;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let client = reqwest::Client::builder()
        .user_agent(cfg.user_agent.clone())
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(client);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Install the global `tracing` subscriber (compact, with target/file/line).
///
/// `RUST_LOG` wins when set. Otherwise the level comes from `AXUM_LOG_LEVEL`
/// (default `debug`) with `hyper_util` and `reqwest` capped at `info`, so the
/// three outbound Kobo calls per request do not flood the log with connection
/// pool chatter. `AXUM_SPAN_EVENTS` (`full` | `enter_exit`) selects span
/// events and `FORCE_COLOR` overrides TTY detection.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AXUM_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},hyper_util=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
