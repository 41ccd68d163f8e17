//! History aggregation: candlestick closes → portfolio value over time.
//!
//! The series is a reconstruction, not a ledger: held quantities are
//! assumed constant across the window and multiplied by each candle's
//! close price. Stablecoin holdings contribute a constant additive value
//! at every point.

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use super::balances::{PriceResolution, resolve_prices};
use super::ranges::{ChartRange, RangeProfile};
use super::{QUOTE_SUFFIX, is_stable};
use crate::exchange::{ApiError, ApiErrorKind, MarketSource};
use crate::models::Kline;

/// Holdings below this quantity are ignored as dust.
const DUST_THRESHOLD: f64 = 1e-6;

/// Candlesticks are fetched for at most this many assets, ranked by
/// current notional value, to bound fetch volume.
const MAX_CHART_ASSETS: usize = 6;

/// Spacing inserted before each kline fetch after the first. Best-effort
/// rate-limit spacing, not a correctness mechanism.
const KLINE_FETCH_STAGGER_MS: u64 = 50;

/// Rescale only when the reconstructed endpoint drifts more than this
/// fraction from the caller-supplied live value.
const ALIGNMENT_TOLERANCE: f64 = 0.01;

/// One chart point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDatum {
    pub label: String,
    pub value: f64,
}

/// Series-level detail returned alongside the points.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMetadata {
    pub range: &'static str,
    pub interval: &'static str,
    pub points: u32,
    /// Whether the rescale-to-current-value step fired. The rescale is a
    /// known approximation (a uniform factor cannot correct proportional
    /// drift), so it is reported rather than applied silently.
    pub scaled: bool,
}

/// Result of one history aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryReport {
    pub data: Vec<ChartDatum>,
    pub metadata: HistoryMetadata,
}

/// Reconstructs the portfolio value series for `range`.
///
/// `current_value`, when supplied by the caller, anchors the series tail:
/// if the reconstructed endpoint differs from it by more than 1%, every
/// point is scaled by `current_value / endpoint` so the chart's rightmost
/// point matches the live total shown next to it.
///
/// # Errors
///
/// Returns [`ApiError`] when the account fetch fails, when pricing fails
/// for a reason other than an unsupported symbol, or when every
/// candlestick fetch hard-fails. Unsupported symbols are excluded from
/// the timeline instead of failing the request.
pub async fn build_history(
    source: &dyn MarketSource,
    range: ChartRange,
    current_value: Option<f64>,
) -> Result<HistoryReport, ApiError> {
    let profile = range.profile();
    let account = source.get_account_information().await?;

    let mut stable_value = 0.0;
    let mut priced: Vec<(String, f64)> = Vec::new();
    for balance in &account.snapshot.balances {
        let qty = balance.total_qty();
        if qty < DUST_THRESHOLD {
            continue;
        }
        if is_stable(&balance.asset) {
            stable_value += qty;
        } else {
            priced.push((balance.asset.clone(), qty));
        }
    }

    let retained = rank_by_notional(source, priced).await?;
    let fetched = fetch_kline_series(source, &retained, profile).await;

    let mut with_data: Vec<(f64, Vec<Kline>)> = Vec::new();
    let mut first_failure: Option<ApiError> = None;
    for (symbol, qty, result) in fetched {
        match result {
            Ok(klines) if !klines.is_empty() => with_data.push((qty, klines)),
            Ok(_) => {}
            Err(e) if e.kind == ApiErrorKind::UnknownSymbol => {
                debug!(%symbol, "symbol not charted by the exchange, excluding");
            }
            Err(e) => {
                warn!(%symbol, error = %e, "candlestick fetch failed");
                first_failure.get_or_insert(e);
            }
        }
    }

    let mut scaled = false;
    let data = if let Some((_, timeline)) = with_data.first() {
        let timeline = timeline.clone();
        let mut data = chart_points(&timeline, &with_data, stable_value, profile);
        scaled = rescale_to_current(&mut data, current_value);
        data
    } else if let Some(failure) = first_failure {
        // Every fetch that could have produced data failed outright.
        return Err(failure);
    } else {
        // No priced asset produced candle data (stable-only account,
        // delisted symbols, or empty candle windows).
        let mut data = synthetic_points(profile, stable_value, Utc::now().timestamp_millis());
        scaled = rescale_to_current(&mut data, current_value);
        data
    };

    Ok(HistoryReport {
        data,
        metadata: HistoryMetadata {
            range: range.as_str(),
            interval: profile.interval,
            points: profile.points,
            scaled,
        },
    })
}

/// Ranks priced holdings by current notional value and keeps the top
/// [`MAX_CHART_ASSETS`], returning `(lookup_symbol, quantity)` pairs.
/// Assets whose lookup symbol the exchange does not trade are excluded
/// here; they cannot produce candles either.
async fn rank_by_notional(
    source: &dyn MarketSource,
    priced: Vec<(String, f64)>,
) -> Result<Vec<(String, f64)>, ApiError> {
    if priced.is_empty() {
        return Ok(Vec::new());
    }

    let mut lookups: Vec<String> = priced
        .iter()
        .map(|(asset, _)| format!("{asset}{QUOTE_SUFFIX}"))
        .collect();
    lookups.sort();
    lookups.dedup();
    let prices = resolve_prices(source, &lookups).await?;

    let mut ranked: Vec<(String, f64, f64)> = priced
        .into_iter()
        .filter_map(|(asset, qty)| {
            let lookup = format!("{asset}{QUOTE_SUFFIX}");
            match prices.get(&lookup) {
                Some(PriceResolution::Priced(price)) => Some((lookup, qty, qty * price)),
                Some(PriceResolution::Unsupported) | None => None,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.2.total_cmp(&a.2));
    ranked.truncate(MAX_CHART_ASSETS);
    Ok(ranked
        .into_iter()
        .map(|(lookup, qty, _)| (lookup, qty))
        .collect())
}

/// Issues every kline fetch concurrently, the first immediately and each
/// subsequent one after a fixed stagger.
async fn fetch_kline_series(
    source: &dyn MarketSource,
    retained: &[(String, f64)],
    profile: &RangeProfile,
) -> Vec<(String, f64, Result<Vec<Kline>, ApiError>)> {
    let fetches = retained.iter().enumerate().map(|(i, (symbol, qty))| {
        let symbol = symbol.clone();
        let qty = *qty;
        async move {
            if i > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(
                    KLINE_FETCH_STAGGER_MS * i as u64,
                ))
                .await;
            }
            let result = source
                .get_klines(&symbol, profile.interval, profile.points)
                .await;
            (symbol, qty, result)
        }
    });
    join_all(fetches).await
}

/// Builds the labeled series from the shared timeline.
///
/// Series are aligned by position from the most recent sample backward,
/// not by timestamp equality: candle grids across trading pairs are not
/// guaranteed to share close times, so each series is overlapped from the
/// tail and slots before its first sample contribute nothing. A
/// timestamp-bucket join would remove that assumption; with a single
/// interval per request the two only differ for assets listed mid-window.
fn chart_points(
    timeline: &[Kline],
    series: &[(f64, Vec<Kline>)],
    stable_value: f64,
    profile: &RangeProfile,
) -> Vec<ChartDatum> {
    let n = timeline.len();
    let mut data = Vec::with_capacity(n);

    for (i, candle) in timeline.iter().enumerate() {
        let mut value = stable_value;
        for (qty, klines) in series {
            // Tail alignment: slot i sits (n - 1 - i) samples from the end.
            let from_end = n - 1 - i;
            if from_end < klines.len() {
                let j = klines.len() - 1 - from_end;
                value += qty * klines[j].close_price;
            }
        }
        let value = round2(value);
        if value.is_finite() && value >= 0.0 {
            data.push(ChartDatum {
                label: profile.format_label(candle.close_time),
                value,
            });
        }
    }
    data
}

/// Evenly spaced zero-value timeline ending now, used when no priced
/// asset produced candle data.
fn synthetic_points(profile: &RangeProfile, stable_value: f64, now_ms: i64) -> Vec<ChartDatum> {
    let points = profile.points as i64;
    let mut data = Vec::with_capacity(profile.points as usize);
    for i in 0..points {
        let ts = now_ms - (points - 1 - i) * profile.step_ms;
        let value = round2(stable_value);
        if value.is_finite() && value >= 0.0 {
            data.push(ChartDatum {
                label: profile.format_label(ts),
                value,
            });
        }
    }
    data
}

/// Uniformly rescales the series so its endpoint matches the live total,
/// when the caller supplied one and the drift exceeds the tolerance.
/// Returns whether scaling was applied.
fn rescale_to_current(data: &mut [ChartDatum], current_value: Option<f64>) -> bool {
    let Some(current) = current_value else {
        return false;
    };
    let Some(last) = data.last().map(|d| d.value) else {
        return false;
    };
    if !(last > 0.0) || !current.is_finite() {
        return false;
    }

    let ratio = current / last;
    if (ratio - 1.0).abs() <= ALIGNMENT_TOLERANCE {
        return false;
    }
    for datum in data.iter_mut() {
        datum.value = round2(datum.value * ratio);
    }
    true
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
