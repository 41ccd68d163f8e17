//! Exchange REST client.
//!
//! [`client`] issues the signed and unsigned calls; [`error`] is the typed
//! taxonomy every call resolves its failures into. Aggregators depend on
//! the [`MarketSource`] trait rather than the concrete client so they can
//! be exercised against scripted sources in tests.

pub mod client;
pub mod error;

pub use client::{AccountInformation, ExchangeClient, MarketSource, RateLimitInfo};
pub use error::{ApiError, ApiErrorKind};
