//! Portfolio valuation service for spot exchange accounts.
//!
//! Wraps a Binance-compatible REST API behind two HTTP endpoints: a
//! priced holdings list and a value-over-time series. Exchange API
//! credentials are stored encrypted at rest and decrypted per request;
//! nothing derived from market data is cached or persisted.

pub mod config;
pub mod credentials;
pub mod error;
pub mod exchange;
pub mod models;
pub mod portfolio;
pub mod server;
pub mod tls;

pub use error::{Result, VantageError};
