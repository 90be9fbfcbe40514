//! Maps a window of samples onto plot coordinates.
//!
//! Pure geometry: colors and markup belong to the display.

use serde::Serialize;

use crate::history::Sample;
use crate::timeframe::{Lookback, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartGeometry {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineColor {
    Gain,
    Loss,
}

impl LineColor {
    pub fn hex(self) -> &'static str {
        match self {
            LineColor::Gain => "#4caf50",
            LineColor::Loss => "#f44336",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Insufficient {
    /// Fewer than two samples recorded at all.
    NoData,
    /// History exists but fewer than two samples fall in the window.
    OutsideWindow,
}

impl Insufficient {
    pub fn placeholder(self) -> &'static str {
        match self {
            Insufficient::NoData => "Collecting P&L data...",
            Insufficient::OutsideWindow => "Not enough data for selected timeframe...",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPlot {
    pub points: Vec<Point>,
    pub line_color: LineColor,
    pub zero_line_y: Option<f64>,
    pub min_pnl: f64,
    pub max_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartProjection {
    Insufficient { reason: Insufficient },
    Plot(ChartPlot),
}

/// Samples visible in `timeframe`, measured back from `now_ms`.
pub fn window(samples: &[Sample], timeframe: Timeframe, now_ms: i64) -> &[Sample] {
    match timeframe.lookback() {
        Lookback::Unbounded => samples,
        Lookback::Last(ms) => {
            // sorted by timestamp, so the visible samples are a suffix
            let start = samples.partition_point(|s| now_ms - s.timestamp > ms);
            &samples[start..]
        }
    }
}

pub fn project(
    samples: &[Sample],
    timeframe: Timeframe,
    now_ms: i64,
    geometry: &ChartGeometry,
) -> ChartProjection {
    if samples.len() < 2 {
        return ChartProjection::Insufficient { reason: Insufficient::NoData };
    }
    let visible = window(samples, timeframe, now_ms);
    if visible.len() < 2 {
        return ChartProjection::Insufficient { reason: Insufficient::OutsideWindow };
    }
    ChartProjection::Plot(plot(visible, geometry))
}

/// Plot an already-filtered run of at least two samples.
pub fn plot(visible: &[Sample], geometry: &ChartGeometry) -> ChartPlot {
    let (min_pnl, max_pnl) = visible
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| (lo.min(s.pnl), hi.max(s.pnl)));
    // spreads under one unit are drawn against a unit range
    let pnl_range = (max_pnl - min_pnl).max(1.0);

    let first_ts = visible.first().map(|s| s.timestamp).unwrap_or(0);
    let last_ts = visible.last().map(|s| s.timestamp).unwrap_or(0);
    let time_range = (last_ts - first_ts).max(1) as f64;

    let ChartGeometry { width, height, padding } = *geometry;
    let plot_w = width - 2.0 * padding;
    let plot_h = height - 2.0 * padding;
    let y_of = |pnl: f64| height - ((pnl - min_pnl) / pnl_range * plot_h + padding);

    let points = visible
        .iter()
        .map(|s| Point {
            x: (s.timestamp - first_ts) as f64 / time_range * plot_w + padding,
            y: y_of(s.pnl),
        })
        .collect();

    let last_pnl = visible.last().map(|s| s.pnl).unwrap_or(0.0);
    let line_color = if last_pnl >= 0.0 { LineColor::Gain } else { LineColor::Loss };

    let zero_line_y = if min_pnl < 0.0 && max_pnl > 0.0 {
        let y = y_of(0.0);
        (y > padding && y < height - padding).then_some(y)
    } else {
        None
    };

    ChartPlot {
        points,
        line_color,
        zero_line_y,
        min_pnl,
        max_pnl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GEO: ChartGeometry = ChartGeometry { width: 450.0, height: 80.0, padding: 5.0 };

    fn s(timestamp: i64, pnl: f64) -> Sample {
        Sample { timestamp, pnl }
    }

    fn plotted(p: ChartProjection) -> ChartPlot {
        match p {
            ChartProjection::Plot(plot) => plot,
            other => panic!("expected plot, got {:?}", other),
        }
    }

    #[test]
    fn maps_corners_to_padded_box() {
        let samples = [s(0, 0.0), s(1_000, 10.0)];
        let plot = plotted(project(&samples, Timeframe::All, 1_000, &GEO));
        assert_eq!(plot.points[0], Point { x: 5.0, y: 75.0 });
        assert_eq!(plot.points[1], Point { x: 445.0, y: 5.0 });
        assert_eq!(plot.line_color, LineColor::Gain);
        assert_eq!(plot.zero_line_y, None);
    }

    #[test]
    fn flat_series_uses_unit_range() {
        let samples = [s(0, 3.0), s(0, 3.0)];
        let plot = plotted(project(&samples, Timeframe::All, 0, &GEO));
        for p in &plot.points {
            assert_eq!(*p, Point { x: 5.0, y: 75.0 });
        }
    }

    #[test]
    fn sub_unit_spread_is_drawn_against_unit_range() {
        let samples = [s(0, 0.0), s(1_000, 0.5)];
        let plot = plotted(project(&samples, Timeframe::All, 1_000, &GEO));
        assert_eq!(plot.points[0], Point { x: 5.0, y: 75.0 });
        assert_eq!(plot.points[1], Point { x: 445.0, y: 40.0 });
    }

    #[test]
    fn zero_line_only_when_range_straddles_zero() {
        let crossing = plotted(project(&[s(0, -5.0), s(1, 10.0)], Timeframe::All, 1, &GEO));
        let y = crossing.zero_line_y.expect("zero line");
        assert!(y > 5.0 && y < 75.0);
        // 0 sits a third of the way up the plot
        assert!((y - (80.0 - (5.0 / 15.0 * 70.0 + 5.0))).abs() < 1e-9);

        let positive = plotted(project(&[s(0, 2.0), s(1, 10.0)], Timeframe::All, 1, &GEO));
        assert_eq!(positive.zero_line_y, None);
    }

    #[test]
    fn line_color_follows_last_visible_sample() {
        let plot = plotted(project(&[s(0, 5.0), s(1, -0.01)], Timeframe::All, 1, &GEO));
        assert_eq!(plot.line_color, LineColor::Loss);
        assert_eq!(plot.line_color.hex(), "#f44336");
    }

    #[test]
    fn projection_is_repeatable() {
        let samples: Vec<Sample> = (0..50).map(|i| s(i * 2_000, ((i * 7) % 13) as f64 - 6.0)).collect();
        let a = project(&samples, Timeframe::ThreeMinutes, 98_000, &GEO);
        let b = project(&samples, Timeframe::ThreeMinutes, 98_000, &GEO);
        assert_eq!(a, b);
    }

    #[test]
    fn distinguishes_no_data_from_empty_window() {
        assert_eq!(
            project(&[s(0, 1.0)], Timeframe::All, 0, &GEO),
            ChartProjection::Insufficient { reason: Insufficient::NoData }
        );
        let old = [s(0, 1.0), s(1_000, 2.0)];
        let far_later = 10 * 60 * 1000;
        assert_eq!(
            project(&old, Timeframe::ThreeMinutes, far_later, &GEO),
            ChartProjection::Insufficient { reason: Insufficient::OutsideWindow }
        );
        assert!(matches!(project(&old, Timeframe::All, far_later, &GEO), ChartProjection::Plot(_)));
    }

    #[test]
    fn window_keeps_inclusive_suffix() {
        let samples = [s(0, 0.0), s(60_000, 1.0), s(180_000, 2.0), s(200_000, 3.0)];
        // the sample at 60_000 is exactly 3 minutes old and stays visible
        let visible = window(&samples, Timeframe::ThreeMinutes, 240_000);
        assert_eq!(visible.len(), 3);
        assert_eq!(visible[0].timestamp, 60_000);
    }
}
