//! Configuration loader for the `kobo-forms-adapter` service.
//!
//! Centralizes every `env::var` lookup. Service-level settings are read once
//! at startup into [`Config`]; the Kobo credentials are read on every request
//! through [`load_credentials`] so a missing secret surfaces as a server
//! configuration error on the request that needed it.
use std::env;

use anyhow::{anyhow, Result};

use crate::error::ApiError;

/// Parse an optional `u16` environment variable with a default value.
macro_rules! parse_env_u16 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u16>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Read a required secret, mapping absence to a configuration error.
macro_rules! require_secret {
    ($var_name:expr) => {
        env::var($var_name).map_err(|_| ApiError::Configuration($var_name))?
    };
}

pub const USERNAME_VAR: &str = "KOBO_USERNAME";
pub const PASSWORD_VAR: &str = "KOBO_PW";

/// Strongly typed service configuration, immutable after loading.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Port the HTTP server listens on.
    pub port: u16,

    /// User agent sent on every outbound Kobo request.
    pub user_agent: String,
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `PORT` – listen port (default: 8080)
/// - `KOBO_USER_AGENT` – outbound user agent (default: `kobo-forms-adapter/<version>`)
pub fn load_from_env() -> Result<Config> {
    // ---
    let port = parse_env_u16!("PORT", 8080);
    let user_agent = env::var("KOBO_USER_AGENT")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")));

    Ok(Config { port, user_agent })
}

impl Config {
    /// Log the loaded configuration.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  PORT            : {}", self.port);
        tracing::info!("  KOBO_USER_AGENT : {}", self.user_agent);
    }
}

/// Basic-auth credentials for the Kobo API.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// Read `KOBO_USERNAME` and `KOBO_PW` from the process environment.
pub fn load_credentials() -> Result<Credentials, ApiError> {
    // ---
    let username = require_secret!(USERNAME_VAR);
    let password = require_secret!(PASSWORD_VAR);

    Ok(Credentials { username, password })
}
