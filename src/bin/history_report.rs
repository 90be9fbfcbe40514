//! Print a JSON report of the persisted pnl history.
//!
//! Usage: history_report [sqlite_path]

use anyhow::{bail, Result};
use serde_json::json;

use pnlwatch::config::Config;
use pnlwatch::history::HistoryStore;
use pnlwatch::stats::{gain_over_interval, interval_gains};
use pnlwatch::storage::SqliteStore;
use pnlwatch::timeframe::Lookback;

fn main() -> Result<()> {
    let cfg = Config::from_env();
    let path = std::env::args().nth(1).unwrap_or_else(|| cfg.sqlite_path.clone());
    if !std::path::Path::new(&path).exists() {
        bail!("no history database at {}", path);
    }

    let mut store = SqliteStore::open(&path)?;
    store.init()?;
    let mut history = HistoryStore::new(store, &cfg.history_key, cfg.max_points, cfg.save_batch_size);
    history.load()?;

    let samples = history.samples();
    let span_ms = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => last.timestamp - first.timestamp,
        _ => 0,
    };
    let gains: serde_json::Map<String, serde_json::Value> = interval_gains(samples)
        .into_iter()
        .map(|(label, gain)| (label.to_string(), json!(gain.display())))
        .collect();

    let report = json!({
        "path": path,
        "key": cfg.history_key,
        "samples": samples.len(),
        "span_ms": span_ms,
        "first": samples.first(),
        "last": samples.last(),
        "all_time": gain_over_interval(samples, Lookback::Unbounded).display(),
        "gains": gains,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
