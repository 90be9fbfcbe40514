use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;

/// How far back a gain or chart looks from the newest sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    Last(i64),
    Unbounded,
}

/// Chart window selectable from the overlay controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    ThreeMinutes,
    FifteenMinutes,
    OneHour,
    All,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::ThreeMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::OneHour,
        Timeframe::All,
    ];

    pub fn lookback(self) -> Lookback {
        match self {
            Timeframe::ThreeMinutes => Lookback::Last(3 * MINUTE_MS),
            Timeframe::FifteenMinutes => Lookback::Last(15 * MINUTE_MS),
            Timeframe::OneHour => Lookback::Last(HOUR_MS),
            Timeframe::All => Lookback::Unbounded,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::ThreeMinutes => "3m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::All => "All",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "3m" => Ok(Timeframe::ThreeMinutes),
            "15m" => Ok(Timeframe::FifteenMinutes),
            "1h" => Ok(Timeframe::OneHour),
            "all" => Ok(Timeframe::All),
            other => Err(format!("unknown timeframe: {}", other)),
        }
    }
}

/// Fixed windows shown in the summary panel, newest-first resolution.
pub const SUMMARY_INTERVALS: [(&str, Lookback); 6] = [
    ("1min", Lookback::Last(MINUTE_MS)),
    ("5min", Lookback::Last(5 * MINUTE_MS)),
    ("15min", Lookback::Last(15 * MINUTE_MS)),
    ("1hr", Lookback::Last(HOUR_MS)),
    ("4hr", Lookback::Last(4 * HOUR_MS)),
    ("24hr", Lookback::Last(24 * HOUR_MS)),
];
