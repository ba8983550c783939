//! Command-line and environment configuration for the sales API.
//!
//! Every option can also be set through an environment variable with the
//! `SALES_` prefix, e.g. `SALES_ADDRESS=0.0.0.0:8080`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;

/// Default API listen address.
pub const DEFAULT_ADDRESS: &str = "0.0.0.0:3000";

/// Default debug listen address. Keep it off public interfaces.
pub const DEFAULT_DEBUG_ADDRESS: &str = "127.0.0.1:4000";

/// Default drain budget on shutdown, in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT: u64 = 5;

/// Default token lifetime, in seconds.
pub const DEFAULT_TOKEN_TTL: u64 = 3600;

/// Longest token lifetime accepted, in seconds (one year).
pub const MAX_TOKEN_TTL: u64 = 365 * 24 * 3600;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} cannot be blank")]
    Blank(&'static str),

    #[error("{0} must be greater than 0")]
    Zero(&'static str),

    #[error("token ttl cannot exceed {} seconds", MAX_TOKEN_TTL)]
    TokenTtlTooLong,

    #[error("rotated key {0:?} is listed more than once, or reuses the active key id")]
    DuplicateKeyId(String),
}

/// A verification key kept around for tokens signed before a rotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RotatedKey {
    pub kid: String,
    pub path: PathBuf,
}

impl FromStr for RotatedKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kid, path) = s
            .split_once('=')
            .ok_or_else(|| format!("expected `kid=path`, got {s:?}"))?;
        let (kid, path) = (kid.trim(), path.trim());
        if kid.is_empty() || path.is_empty() {
            return Err(format!("expected `kid=path`, got {s:?}"));
        }
        Ok(Self { kid: kid.to_owned(), path: PathBuf::from(path) })
    }
}

/// Sales API - products, sales and users over JSON.
#[derive(Parser, Debug, Clone)]
#[command(name = "sales-api")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // ── Web ──────────────────────────────────────────────────────────────
    /// Address the API listens on.
    #[arg(long, default_value = DEFAULT_ADDRESS, env = "SALES_ADDRESS")]
    pub address: SocketAddr,

    /// Address of the debug service (`/debug/vars`).
    #[arg(long, default_value = DEFAULT_DEBUG_ADDRESS, env = "SALES_DEBUG_ADDRESS")]
    pub debug_address: SocketAddr,

    /// Seconds in-flight requests get to finish on shutdown.
    #[arg(long, default_value_t = DEFAULT_SHUTDOWN_TIMEOUT, env = "SALES_SHUTDOWN_TIMEOUT")]
    pub shutdown_timeout: u64,

    // ── Auth ─────────────────────────────────────────────────────────────
    /// Key id written into the header of every issued token.
    #[arg(long, default_value = "1", env = "SALES_AUTH_KEY_ID")]
    pub auth_key_id: String,

    /// PEM file with the signing key.
    #[arg(long, default_value = "private.pem", env = "SALES_AUTH_PRIVATE_KEY_FILE")]
    pub auth_private_key_file: PathBuf,

    /// PEM file with the key that verifies tokens signed under the active id.
    #[arg(long, default_value = "public.pem", env = "SALES_AUTH_PUBLIC_KEY_FILE")]
    pub auth_public_key_file: PathBuf,

    /// Signing algorithm. Tokens declaring any other algorithm are rejected.
    #[arg(long, default_value = "RS256", env = "SALES_AUTH_ALGORITHM")]
    pub auth_algorithm: String,

    /// Extra verification key as `kid=path`. Repeat for several.
    #[arg(long = "auth-rotated-key", env = "SALES_AUTH_ROTATED_KEYS", value_delimiter = ',')]
    pub auth_rotated_keys: Vec<RotatedKey>,

    /// Lifetime of issued tokens, in seconds.
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL, env = "SALES_TOKEN_TTL")]
    pub token_ttl: u64,

    // ── Logging ──────────────────────────────────────────────────────────
    /// Log at debug level.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Rejects values the service cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth_key_id.trim().is_empty() {
            return Err(ConfigError::Blank("auth key id"));
        }
        if self.auth_algorithm.trim().is_empty() {
            return Err(ConfigError::Blank("auth algorithm"));
        }
        if self.shutdown_timeout == 0 {
            return Err(ConfigError::Zero("shutdown timeout"));
        }
        if self.token_ttl == 0 {
            return Err(ConfigError::Zero("token ttl"));
        }
        if self.token_ttl > MAX_TOKEN_TTL {
            return Err(ConfigError::TokenTtlTooLong);
        }

        let mut seen = std::collections::HashSet::from([self.auth_key_id.as_str()]);
        for key in &self.auth_rotated_keys {
            if !seen.insert(key.kid.as_str()) {
                return Err(ConfigError::DuplicateKeyId(key.kid.clone()));
            }
        }
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        // Capped so the cast and the expiry arithmetic cannot overflow.
        chrono::Duration::seconds(self.token_ttl.min(MAX_TOKEN_TTL) as i64)
    }
}
