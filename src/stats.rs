//! Rolling gains over fixed lookback windows and the summary panel model.

use serde::Serialize;

use crate::history::Sample;
use crate::source::Totals;
use crate::timeframe::{Lookback, SUMMARY_INTERVALS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "delta", rename_all = "snake_case")]
pub enum IntervalGain {
    NotEnoughData,
    Delta(f64),
}

impl IntervalGain {
    pub fn delta(&self) -> Option<f64> {
        match self {
            IntervalGain::Delta(d) => Some(*d),
            IntervalGain::NotEnoughData => None,
        }
    }

    /// Zero counts as positive.
    pub fn sign(&self) -> Option<Sign> {
        self.delta().map(|d| if d >= 0.0 { Sign::Positive } else { Sign::Negative })
    }

    /// `+$12.34`, `-$0.50` or `N/A`.
    pub fn display(&self) -> String {
        match self {
            IntervalGain::NotEnoughData => "N/A".to_string(),
            IntervalGain::Delta(d) => {
                let sign = if *d >= 0.0 { '+' } else { '-' };
                format!("{}${:.2}", sign, d.abs())
            }
        }
    }
}

/// Pnl change from the sample at least `window` older than the newest one.
///
/// Samples must be sorted by timestamp (the history store guarantees it).
pub fn gain_over_interval(samples: &[Sample], window: Lookback) -> IntervalGain {
    if samples.len() < 2 {
        return IntervalGain::NotEnoughData;
    }
    let first = samples[0];
    let last = samples[samples.len() - 1];
    let start = match window {
        Lookback::Unbounded => first,
        Lookback::Last(ms) => {
            let target = last.timestamp.saturating_sub(ms);
            // index of the first sample strictly newer than target
            let idx = samples.partition_point(|s| s.timestamp <= target);
            if idx == 0 {
                return IntervalGain::NotEnoughData;
            }
            samples[idx - 1]
        }
    };
    IntervalGain::Delta(last.pnl - start.pnl)
}

pub fn percent_gain(total_wager: f64, total_pnl: f64) -> f64 {
    if total_wager > 0.0 {
        total_pnl / total_wager * 100.0
    } else {
        0.0
    }
}

/// Everything the summary panel shows for one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_wager: f64,
    pub total_pnl: f64,
    pub percent_gain: f64,
    pub row_count: usize,
    pub interval_gains: Vec<(&'static str, IntervalGain)>,
}

impl Summary {
    pub fn build(totals: &Totals, samples: &[Sample]) -> Self {
        Self {
            total_wager: totals.total_wager,
            total_pnl: totals.total_pnl,
            percent_gain: percent_gain(totals.total_wager, totals.total_pnl),
            row_count: totals.row_count,
            interval_gains: interval_gains(samples),
        }
    }
}

pub fn interval_gains(samples: &[Sample]) -> Vec<(&'static str, IntervalGain)> {
    SUMMARY_INTERVALS
        .iter()
        .map(|(label, window)| (*label, gain_over_interval(samples, *window)))
        .collect()
}
