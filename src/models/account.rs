//! Account endpoint models.

use serde::{Deserialize, Serialize};

/// Snapshot of a spot account: one entry per asset plus the server-side
/// update time. Fetched fresh per request, never cached.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSnapshot {
    pub balances: Vec<RawBalance>,
    #[serde(rename = "updateTime", default)]
    pub update_time: u64,
}

/// One asset's balance as sent by the exchange. `free` and `locked` are
/// decimal strings on the wire.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawBalance {
    pub asset: String,
    pub free: String,
    pub locked: String,
}

impl RawBalance {
    /// Freely tradable quantity. Unparsable or non-finite values count as zero.
    pub fn free_qty(&self) -> f64 {
        parse_qty(&self.free)
    }

    /// Quantity locked in open orders. Unparsable or non-finite values count as zero.
    pub fn locked_qty(&self) -> f64 {
        parse_qty(&self.locked)
    }

    /// Total held quantity (`free + locked`).
    pub fn total_qty(&self) -> f64 {
        self.free_qty() + self.locked_qty()
    }
}

fn parse_qty(raw: &str) -> f64 {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(free: &str, locked: &str) -> RawBalance {
        RawBalance {
            asset: "BTC".to_string(),
            free: free.to_string(),
            locked: locked.to_string(),
        }
    }

    #[test]
    fn parses_decimal_strings() {
        let b = balance("0.50000000", "0.25");
        assert_eq!(b.free_qty(), 0.5);
        assert_eq!(b.locked_qty(), 0.25);
        assert_eq!(b.total_qty(), 0.75);
    }

    #[test]
    fn unparsable_quantities_count_as_zero() {
        assert_eq!(balance("garbage", "1.0").total_qty(), 1.0);
        assert_eq!(balance("NaN", "inf").total_qty(), 0.0);
        assert_eq!(balance("", "").total_qty(), 0.0);
    }
}
