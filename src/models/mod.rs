//! Wire models for the exchange REST API.
//!
//! Contains the account snapshot, ticker price, and candlestick shapes as
//! the exchange sends them. Quantities and prices arrive as decimal
//! strings; parsing helpers live next to the types that own them.

pub mod account;
pub mod market;

pub use account::{AccountSnapshot, RawBalance};
pub use market::{Kline, PriceQuote};
