use crate::chart::ChartGeometry;
use crate::timeframe::Timeframe;

pub const SAMPLE_INTERVAL_MS: u64 = 2_000;
pub const STARTUP_DELAY_MS: u64 = 1_500;
/// About 24 hours of samples at the default cadence.
pub const MAX_POINTS: usize = 43_200;
pub const SAVE_BATCH_SIZE: u32 = 15;
pub const CHART_WIDTH: f64 = 450.0;
pub const CHART_HEIGHT: f64 = 80.0;
pub const CHART_PADDING: f64 = 5.0;
pub const HISTORY_KEY: &str = "pnlHistory";
/// Pending history snapshots the write-behind queue holds before refusing writes.
pub const WRITE_QUEUE_CAPACITY: usize = 4;

#[derive(Debug, Clone)]
pub struct Config {
    pub sample_interval_ms: u64,
    pub startup_delay_ms: u64,
    pub max_points: usize,
    pub save_batch_size: u32,
    pub chart_width: f64,
    pub chart_height: f64,
    pub chart_padding: f64,
    pub default_timeframe: Timeframe,
    pub sqlite_path: String,
    pub history_key: String,
    /// Tab-separated table export polled every pass.
    pub table_path: String,
    pub overlay_dir: String,
    pub write_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_interval_ms: SAMPLE_INTERVAL_MS,
            startup_delay_ms: STARTUP_DELAY_MS,
            max_points: MAX_POINTS,
            save_batch_size: SAVE_BATCH_SIZE,
            chart_width: CHART_WIDTH,
            chart_height: CHART_HEIGHT,
            chart_padding: CHART_PADDING,
            default_timeframe: Timeframe::OneHour,
            sqlite_path: "./pnlwatch.sqlite".to_string(),
            history_key: HISTORY_KEY.to_string(),
            table_path: "./bets.tsv".to_string(),
            overlay_dir: "./overlay".to_string(),
            write_queue_capacity: WRITE_QUEUE_CAPACITY,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            sample_interval_ms: std::env::var("SAMPLE_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).filter(|v| *v > 0).unwrap_or(d.sample_interval_ms),
            startup_delay_ms: std::env::var("STARTUP_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.startup_delay_ms),
            max_points: std::env::var("MAX_POINTS").ok().and_then(|v| v.parse().ok()).filter(|v| *v > 0).unwrap_or(d.max_points),
            save_batch_size: std::env::var("SAVE_BATCH_SIZE").ok().and_then(|v| v.parse().ok()).filter(|v| *v > 0).unwrap_or(d.save_batch_size),
            chart_width: std::env::var("CHART_WIDTH").ok().and_then(|v| v.parse().ok()).unwrap_or(d.chart_width),
            chart_height: std::env::var("CHART_HEIGHT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.chart_height),
            chart_padding: std::env::var("CHART_PADDING").ok().and_then(|v| v.parse().ok()).unwrap_or(d.chart_padding),
            default_timeframe: std::env::var("DEFAULT_TIMEFRAME").ok().and_then(|v| v.parse().ok()).unwrap_or(d.default_timeframe),
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or(d.sqlite_path),
            history_key: std::env::var("HISTORY_KEY").unwrap_or(d.history_key),
            table_path: std::env::var("TABLE_PATH").unwrap_or(d.table_path),
            overlay_dir: std::env::var("OVERLAY_DIR").unwrap_or(d.overlay_dir),
            write_queue_capacity: std::env::var("WRITE_QUEUE_CAP").ok().and_then(|v| v.parse().ok()).filter(|v| *v > 0).unwrap_or(d.write_queue_capacity),
        }
    }

    pub fn geometry(&self) -> ChartGeometry {
        ChartGeometry {
            width: self.chart_width,
            height: self.chart_height,
            padding: self.chart_padding,
        }
    }
}
