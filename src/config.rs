//! Application configuration loaded from environment variables.
//!
//! Required variables:
//! - `VANTAGE_MASTER_KEY` — base64-encoded 32-byte key for the credential store
//! - `VANTAGE_SESSION_TOKENS` — comma-separated `token=user` pairs
//!
//! Optional variables override the bind address, exchange endpoints, the
//! signed-request receive window, and the credential store location.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::credentials::MasterKey;

/// Default HTTP bind address.
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Default exchange REST endpoint.
const DEFAULT_EXCHANGE_URL: &str = "https://api.binance.com";

/// Default exchange testnet REST endpoint.
const DEFAULT_TESTNET_URL: &str = "https://testnet.binance.vision";

/// Default receive window for signed requests, in milliseconds.
const DEFAULT_RECV_WINDOW_MS: u64 = 5_000;

/// Default credential store location.
const DEFAULT_STORE_PATH: &str = "credentials.json";

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub exchange: ExchangeConfig,
    pub store: StoreConfig,
}

/// HTTP server configuration.
#[derive(Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Bearer token → user id table for session resolution.
    pub session_tokens: HashMap<String, String>,
}

/// Exchange endpoint configuration.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub rest_url: String,
    pub testnet_rest_url: String,
    pub recv_window_ms: u64,
}

/// Credential store configuration.
#[derive(Debug)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub master_key: MasterKey,
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`VantageError::Config`](crate::VantageError::Config) if the
/// master key is missing or not a base64-encoded 32-byte value, if the
/// session token table is missing or malformed, or if the bind address or
/// receive window cannot be parsed.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let bind_addr = non_empty_var("VANTAGE_BIND_ADDR")
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
        .parse::<SocketAddr>()
        .map_err(|e| crate::VantageError::Config(format!("invalid VANTAGE_BIND_ADDR: {e}")))?;

    let rest_url =
        non_empty_var("VANTAGE_EXCHANGE_URL").unwrap_or_else(|| DEFAULT_EXCHANGE_URL.to_string());
    let testnet_rest_url = non_empty_var("VANTAGE_EXCHANGE_TESTNET_URL")
        .unwrap_or_else(|| DEFAULT_TESTNET_URL.to_string());

    let recv_window_ms = match non_empty_var("VANTAGE_RECV_WINDOW_MS") {
        Some(raw) => raw.parse::<u64>().map_err(|e| {
            crate::VantageError::Config(format!("invalid VANTAGE_RECV_WINDOW_MS: {e}"))
        })?,
        None => DEFAULT_RECV_WINDOW_MS,
    };

    let master_key = non_empty_var("VANTAGE_MASTER_KEY")
        .ok_or_else(|| crate::VantageError::Config("VANTAGE_MASTER_KEY is not set".to_string()))?;
    let master_key = MasterKey::from_base64(&master_key)
        .map_err(|e| crate::VantageError::Config(format!("invalid VANTAGE_MASTER_KEY: {e}")))?;

    let session_tokens = non_empty_var("VANTAGE_SESSION_TOKENS").ok_or_else(|| {
        crate::VantageError::Config("VANTAGE_SESSION_TOKENS is not set".to_string())
    })?;
    let session_tokens = parse_session_tokens(&session_tokens)?;

    let path = non_empty_var("VANTAGE_STORE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));

    Ok(AppConfig {
        server: ServerConfig {
            bind_addr,
            session_tokens,
        },
        exchange: ExchangeConfig {
            rest_url,
            testnet_rest_url,
            recv_window_ms,
        },
        store: StoreConfig { path, master_key },
    })
}

/// Parses a comma-separated `token=user` table.
fn parse_session_tokens(raw: &str) -> crate::Result<HashMap<String, String>> {
    let mut tokens = HashMap::new();
    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((token, user)) = pair.split_once('=') else {
            return Err(crate::VantageError::Config(format!(
                "malformed VANTAGE_SESSION_TOKENS entry (expected token=user): {pair:?}"
            )));
        };
        if token.is_empty() || user.is_empty() {
            return Err(crate::VantageError::Config(format!(
                "empty token or user in VANTAGE_SESSION_TOKENS entry: {pair:?}"
            )));
        }
        tokens.insert(token.to_string(), user.to_string());
    }
    if tokens.is_empty() {
        return Err(crate::VantageError::Config(
            "VANTAGE_SESSION_TOKENS contains no token=user pairs".to_string(),
        ));
    }
    Ok(tokens)
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
