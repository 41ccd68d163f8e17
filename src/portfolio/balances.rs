//! Balance aggregation: account snapshot → priced holdings list.
//!
//! Price resolution is two-tier: one batched call per chunk of lookup
//! symbols, then a per-symbol fallback when a batch is rejected because it
//! contains a symbol the exchange does not trade. Genuinely unsupported
//! symbols become a typed [`PriceResolution::Unsupported`] outcome rather
//! than a failure, so one delisted asset never sinks the whole request.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::debug;

use super::{QUOTE_SUFFIX, is_stable};
use crate::exchange::{ApiError, ApiErrorKind, MarketSource, RateLimitInfo};

/// Maximum symbols per batched price request (the exchange's per-call
/// ceiling).
pub const PRICE_BATCH_LIMIT: usize = 100;

/// One asset's aggregate position with its computed USD value.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub asset: String,
    pub free: f64,
    pub locked: f64,
    /// `free + locked`. Holdings with a non-positive total are excluded
    /// from the output entirely.
    pub total: f64,
    pub unit_price: Option<f64>,
    /// The symbol the unit price came from: the lookup pair for priced
    /// assets, the literal `USD` for pegged ones.
    pub unit_price_symbol: String,
    /// `total * unit_price`, or `None` when no price was resolvable.
    pub value: Option<f64>,
}

/// Portfolio-level rollup of a holdings list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingsSummary {
    /// Sum of all non-null holding values.
    pub total_value: f64,
    /// Assets whose lookup symbol the exchange does not trade, suffix
    /// stripped. Listed here rather than silently dropped.
    pub missing_price_assets: Vec<String>,
    pub computed_at: DateTime<Utc>,
}

/// Result of one balances aggregation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedBalances {
    pub holdings: Vec<Holding>,
    pub summary: HoldingsSummary,
    /// Rate-limit usage reported by the exchange on the account call.
    pub rate_limit: RateLimitInfo,
}

/// Outcome of resolving one price-lookup symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PriceResolution {
    Priced(f64),
    /// The exchange does not trade this symbol.
    Unsupported,
}

/// Fetches the account snapshot and joins it with spot prices.
///
/// # Errors
///
/// Returns [`ApiError`] when the account fetch fails or a price fetch
/// fails for a reason other than an unsupported symbol (rate limit,
/// timeout, auth). Unsupported symbols are recovered internally.
pub async fn aggregate_balances(source: &dyn MarketSource) -> Result<AggregatedBalances, ApiError> {
    let account = source.get_account_information().await?;

    // Positions with a non-positive total are dropped before pricing.
    let positions: Vec<(String, f64, f64)> = account
        .snapshot
        .balances
        .iter()
        .map(|b| (b.asset.clone(), b.free_qty(), b.locked_qty()))
        .filter(|(_, free, locked)| free + locked > 0.0)
        .collect();

    let mut lookups: Vec<String> = positions
        .iter()
        .filter(|(asset, _, _)| !is_stable(asset))
        .map(|(asset, _, _)| format!("{asset}{QUOTE_SUFFIX}"))
        .collect();
    lookups.sort();
    lookups.dedup();

    let prices = resolve_prices(source, &lookups).await?;

    let mut holdings = Vec::with_capacity(positions.len());
    let mut missing_price_assets = Vec::new();
    let mut total_value = 0.0;

    for (asset, free, locked) in positions {
        let total = free + locked;
        let holding = if is_stable(&asset) {
            Holding {
                asset,
                free,
                locked,
                total,
                unit_price: Some(1.0),
                unit_price_symbol: "USD".to_string(),
                value: Some(total),
            }
        } else {
            let lookup = format!("{asset}{QUOTE_SUFFIX}");
            let unit_price = match prices.get(&lookup) {
                Some(PriceResolution::Priced(price)) => Some(*price),
                Some(PriceResolution::Unsupported) | None => {
                    missing_price_assets.push(asset.clone());
                    None
                }
            };
            Holding {
                asset,
                free,
                locked,
                total,
                unit_price,
                unit_price_symbol: lookup,
                value: unit_price.map(|p| total * p),
            }
        };

        if let Some(value) = holding.value {
            total_value += value;
        }
        holdings.push(holding);
    }

    debug!(
        holdings = holdings.len(),
        unsupported = missing_price_assets.len(),
        "aggregated balances"
    );

    Ok(AggregatedBalances {
        holdings,
        summary: HoldingsSummary {
            total_value,
            missing_price_assets,
            computed_at: Utc::now(),
        },
        rate_limit: account.rate_limit,
    })
}

/// Resolves every lookup symbol, batching up to [`PRICE_BATCH_LIMIT`] per
/// call and issuing the batches concurrently.
pub(crate) async fn resolve_prices(
    source: &dyn MarketSource,
    symbols: &[String],
) -> Result<HashMap<String, PriceResolution>, ApiError> {
    let batches = symbols
        .chunks(PRICE_BATCH_LIMIT)
        .map(|chunk| resolve_batch(source, chunk));

    let mut resolved = HashMap::with_capacity(symbols.len());
    for batch in join_all(batches).await {
        resolved.extend(batch?);
    }
    Ok(resolved)
}

/// First tier: one batched call. When the exchange rejects the batch for
/// containing an untraded symbol, fall back to resolving each symbol on
/// its own so the supported ones still price.
async fn resolve_batch(
    source: &dyn MarketSource,
    chunk: &[String],
) -> Result<Vec<(String, PriceResolution)>, ApiError> {
    match source.get_ticker_prices(Some(chunk)).await {
        Ok(quotes) => {
            let mut by_symbol: HashMap<&str, f64> = quotes
                .iter()
                .map(|q| (q.symbol.as_str(), q.price))
                .collect();
            Ok(chunk
                .iter()
                .map(|symbol| {
                    let resolution = match by_symbol.remove(symbol.as_str()) {
                        Some(price) => PriceResolution::Priced(price),
                        None => PriceResolution::Unsupported,
                    };
                    (symbol.clone(), resolution)
                })
                .collect())
        }
        Err(e) if e.kind == ApiErrorKind::UnknownSymbol => {
            debug!(batch = chunk.len(), "price batch rejected, resolving per symbol");
            let singles = chunk.iter().map(|symbol| resolve_single(source, symbol));
            join_all(singles).await.into_iter().collect()
        }
        Err(e) => Err(e),
    }
}

/// Second tier: a single-symbol fetch where only "unsupported" is a
/// tolerated failure.
async fn resolve_single(
    source: &dyn MarketSource,
    symbol: &str,
) -> Result<(String, PriceResolution), ApiError> {
    match source.get_ticker_price(symbol).await {
        Ok(quote) => Ok((symbol.to_string(), PriceResolution::Priced(quote.price))),
        Err(e) if e.kind == ApiErrorKind::UnknownSymbol => {
            Ok((symbol.to_string(), PriceResolution::Unsupported))
        }
        Err(e) => Err(e),
    }
}
