//! Ticker price and candlestick models.

use serde::{Deserialize, Deserializer};

/// Latest traded price for one symbol. The exchange encodes the price as a
/// decimal string; it is exposed here as an `f64`.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    #[serde(deserialize_with = "price_from_string")]
    pub price: f64,
}

fn price_from_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    struct PriceVisitor;

    impl serde::de::Visitor<'_> for PriceVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a price as a decimal string or number")
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<f64, E> {
            v.parse::<f64>()
                .map_err(|_| E::custom(format!("invalid price string: {v:?}")))
        }

        fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }
    }

    deserializer.deserialize_any(PriceVisitor)
}

/// One candlestick, reduced to the fields the aggregators consume.
///
/// The exchange sends klines as positional arrays
/// `[open_time, open, high, low, close, volume, close_time, ...]`;
/// [`Kline::from_row`] maps those rows into named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Kline {
    /// Candle open time, epoch milliseconds.
    pub open_time: i64,
    /// Candle close time, epoch milliseconds.
    pub close_time: i64,
    pub close_price: f64,
}

impl Kline {
    /// Maps one positional kline row into named fields.
    ///
    /// Requires at least 7 elements: open time at index 0, close price
    /// (decimal string) at index 4, close time at index 6. Returns `None`
    /// for rows that are shorter or carry non-numeric fields.
    pub fn from_row(row: &serde_json::Value) -> Option<Self> {
        let row = row.as_array()?;
        if row.len() < 7 {
            return None;
        }
        let open_time = row[0].as_i64()?;
        let close_time = row[6].as_i64()?;
        let close_price = row[4]
            .as_str()?
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())?;
        Some(Self {
            open_time,
            close_time,
            close_price,
        })
    }
}
