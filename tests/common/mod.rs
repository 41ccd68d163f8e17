//! Shared test utilities: a scripted market-data source and builders for
//! account fixtures.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use vantage::exchange::{AccountInformation, ApiError, MarketSource, RateLimitInfo};
use vantage::models::{AccountSnapshot, Kline, PriceQuote, RawBalance};

/// Market-data source driven entirely by scripted state.
///
/// Symbols present in `prices` are traded; any other symbol is treated
/// the way the exchange treats it — a batch containing one is rejected
/// whole with the unknown-symbol code, and a single fetch of one fails
/// the same way.
pub struct ScriptedSource {
    pub account: Result<AccountInformation, ApiError>,
    pub prices: HashMap<String, f64>,
    pub klines: HashMap<String, Vec<Kline>>,
    /// Error returned for kline fetches of symbols absent from `klines`.
    pub kline_error: Option<ApiError>,
    /// Number of price API calls issued (batch and single).
    pub price_calls: Mutex<usize>,
    /// Sizes of each explicit price batch requested.
    pub batch_sizes: Mutex<Vec<usize>>,
    /// Symbols whose klines were fetched, in call order.
    pub kline_calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new(account: AccountInformation) -> Self {
        Self {
            account: Ok(account),
            prices: HashMap::new(),
            klines: HashMap::new(),
            kline_error: None,
            price_calls: Mutex::new(0),
            batch_sizes: Mutex::new(Vec::new()),
            kline_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ApiError) -> Self {
        Self {
            account: Err(error),
            prices: HashMap::new(),
            klines: HashMap::new(),
            kline_error: None,
            price_calls: Mutex::new(0),
            batch_sizes: Mutex::new(Vec::new()),
            kline_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_price(mut self, symbol: &str, price: f64) -> Self {
        self.prices.insert(symbol.to_string(), price);
        self
    }

    pub fn with_klines(mut self, symbol: &str, klines: Vec<Kline>) -> Self {
        self.klines.insert(symbol.to_string(), klines);
        self
    }

    pub fn price_call_count(&self) -> usize {
        *self.price_calls.lock().unwrap()
    }
}

#[async_trait]
impl MarketSource for ScriptedSource {
    async fn get_account_information(&self) -> Result<AccountInformation, ApiError> {
        self.account.clone()
    }

    async fn get_ticker_prices(
        &self,
        symbols: Option<&[String]>,
    ) -> Result<Vec<PriceQuote>, ApiError> {
        *self.price_calls.lock().unwrap() += 1;
        match symbols {
            None => Ok(self
                .prices
                .iter()
                .map(|(symbol, price)| PriceQuote {
                    symbol: symbol.clone(),
                    price: *price,
                })
                .collect()),
            Some(batch) => {
                self.batch_sizes.lock().unwrap().push(batch.len());
                if batch.iter().any(|s| !self.prices.contains_key(s)) {
                    return Err(unknown_symbol_error());
                }
                Ok(batch
                    .iter()
                    .map(|symbol| PriceQuote {
                        symbol: symbol.clone(),
                        price: self.prices[symbol],
                    })
                    .collect())
            }
        }
    }

    async fn get_ticker_price(&self, symbol: &str) -> Result<PriceQuote, ApiError> {
        *self.price_calls.lock().unwrap() += 1;
        match self.prices.get(symbol) {
            Some(price) => Ok(PriceQuote {
                symbol: symbol.to_string(),
                price: *price,
            }),
            None => Err(unknown_symbol_error()),
        }
    }

    async fn get_klines(
        &self,
        symbol: &str,
        _interval: &str,
        limit: u32,
    ) -> Result<Vec<Kline>, ApiError> {
        self.kline_calls.lock().unwrap().push(symbol.to_string());
        match self.klines.get(symbol) {
            Some(series) => {
                let limit = limit as usize;
                let start = series.len().saturating_sub(limit);
                Ok(series[start..].to_vec())
            }
            None => match &self.kline_error {
                Some(e) => Err(e.clone()),
                None => Err(unknown_symbol_error()),
            },
        }
    }
}

/// Delegating wrapper so one scripted source can back a factory that
/// hands out a fresh `Box<dyn MarketSource>` per request.
pub struct SharedSource(pub Arc<ScriptedSource>);

#[async_trait]
impl MarketSource for SharedSource {
    async fn get_account_information(&self) -> Result<AccountInformation, ApiError> {
        self.0.get_account_information().await
    }

    async fn get_ticker_prices(
        &self,
        symbols: Option<&[String]>,
    ) -> Result<Vec<PriceQuote>, ApiError> {
        self.0.get_ticker_prices(symbols).await
    }

    async fn get_ticker_price(&self, symbol: &str) -> Result<PriceQuote, ApiError> {
        self.0.get_ticker_price(symbol).await
    }

    async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Kline>, ApiError> {
        self.0.get_klines(symbol, interval, limit).await
    }
}

/// Builds an account snapshot from `(asset, free, locked)` triples.
pub fn account_with(balances: &[(&str, &str, &str)]) -> AccountInformation {
    AccountInformation {
        snapshot: AccountSnapshot {
            balances: balances
                .iter()
                .map(|(asset, free, locked)| RawBalance {
                    asset: (*asset).to_string(),
                    free: (*free).to_string(),
                    locked: (*locked).to_string(),
                })
                .collect(),
            update_time: 1_700_000_000_000,
        },
        rate_limit: RateLimitInfo::default(),
    }
}

/// The error the exchange reports for an untraded symbol.
pub fn unknown_symbol_error() -> ApiError {
    ApiError::from_response(400, Some(-1121), "Invalid symbol.".to_string(), None)
}

/// A time-ordered kline series with the given closes, one step apart.
pub fn kline_series(end_ms: i64, step_ms: i64, closes: &[f64]) -> Vec<Kline> {
    let n = closes.len() as i64;
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            let close_time = end_ms - (n - 1 - i as i64) * step_ms;
            Kline {
                open_time: close_time - step_ms,
                close_time,
                close_price: *close,
            }
        })
        .collect()
}
