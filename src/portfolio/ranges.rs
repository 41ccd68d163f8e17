//! Chart range profiles.
//!
//! Each requested range maps to a fixed candlestick interval, point count,
//! step size, and label format. The table is immutable and lives here so
//! the aggregator receives it as a constant dependency rather than
//! consulting mutable module state.

use chrono::DateTime;

/// Requested history window, as sent by the client (`1Hr`, `1D`, `1W`,
/// `1M`, `1Y`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartRange {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

/// Candlestick fetch and label parameters for one range.
#[derive(Debug, PartialEq)]
pub struct RangeProfile {
    /// Exchange kline interval name.
    pub interval: &'static str,
    /// Points requested from the exchange and returned to the client.
    pub points: u32,
    /// Spacing between synthetic timeline points, in milliseconds.
    pub step_ms: i64,
    /// chrono format string for point labels.
    pub label_format: &'static str,
}

const HOUR: RangeProfile = RangeProfile {
    interval: "1m",
    points: 60,
    step_ms: 60_000,
    label_format: "%H:%M",
};

const DAY: RangeProfile = RangeProfile {
    interval: "1h",
    points: 24,
    step_ms: 3_600_000,
    label_format: "%H:%M",
};

const WEEK: RangeProfile = RangeProfile {
    interval: "4h",
    points: 42,
    step_ms: 14_400_000,
    label_format: "%b %-d",
};

const MONTH: RangeProfile = RangeProfile {
    interval: "1d",
    points: 30,
    step_ms: 86_400_000,
    label_format: "%b %-d",
};

const YEAR: RangeProfile = RangeProfile {
    interval: "1w",
    points: 52,
    step_ms: 604_800_000,
    label_format: "%b %Y",
};

impl ChartRange {
    /// Every range, in display order.
    pub const ALL: [ChartRange; 5] = [
        Self::Hour,
        Self::Day,
        Self::Week,
        Self::Month,
        Self::Year,
    ];

    /// Parses the wire form. Returns `None` for unrecognized values.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "1Hr" => Some(Self::Hour),
            "1D" => Some(Self::Day),
            "1W" => Some(Self::Week),
            "1M" => Some(Self::Month),
            "1Y" => Some(Self::Year),
            _ => None,
        }
    }

    /// Returns the wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "1Hr",
            Self::Day => "1D",
            Self::Week => "1W",
            Self::Month => "1M",
            Self::Year => "1Y",
        }
    }

    /// Returns this range's immutable fetch/format profile.
    pub fn profile(&self) -> &'static RangeProfile {
        match self {
            Self::Hour => &HOUR,
            Self::Day => &DAY,
            Self::Week => &WEEK,
            Self::Month => &MONTH,
            Self::Year => &YEAR,
        }
    }
}

impl RangeProfile {
    /// Formats an epoch-millisecond timestamp as a point label (UTC).
    pub fn format_label(&self, timestamp_ms: i64) -> String {
        DateTime::from_timestamp_millis(timestamp_ms)
            .map(|dt| dt.format(self.label_format).to_string())
            .unwrap_or_default()
    }
}
