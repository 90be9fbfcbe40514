use anyhow::Result;
use serde_json::json;
use std::io::BufRead;
use tokio::sync::mpsc;

use pnlwatch::config::Config;
use pnlwatch::display::FileOverlay;
use pnlwatch::history::HistoryStore;
use pnlwatch::logging::{json_log, log, obj, v_str, Domain, Level};
use pnlwatch::source::TsvTableSource;
use pnlwatch::storage::{SqliteStore, WriteBehindStore};
use pnlwatch::tracker::{ControlEvent, Tracker};

/// Forward stdin lines (`3m`, `15m`, `1h`, `all`, `reset`) as control events.
///
/// Runs on a plain thread so a pending read never holds up runtime shutdown.
fn read_controls(tx: mpsc::Sender<ControlEvent>) {
    for line in std::io::stdin().lock().lines().map_while(|line| line.ok()) {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<ControlEvent>() {
            Ok(event) => {
                if tx.blocking_send(event).is_err() {
                    break;
                }
            }
            Err(err) => log(
                Level::Warn,
                Domain::Control,
                "bad_control",
                obj(&[("input", v_str(&line)), ("msg", v_str(&err))]),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    json_log(
        "startup",
        obj(&[
            ("sqlite_path", v_str(&cfg.sqlite_path)),
            ("table_path", v_str(&cfg.table_path)),
            ("overlay_dir", v_str(&cfg.overlay_dir)),
            ("interval_ms", json!(cfg.sample_interval_ms)),
            ("max_points", json!(cfg.max_points)),
        ]),
    );

    let mut sqlite = SqliteStore::open(&cfg.sqlite_path)?;
    sqlite.init()?;
    let (store, writer) = WriteBehindStore::spawn(sqlite, cfg.write_queue_capacity);

    let mut history = HistoryStore::new(store, &cfg.history_key, cfg.max_points, cfg.save_batch_size);
    // a bad or unreadable record starts an empty history; already logged
    let _ = history.load();

    let tracker = Tracker::new(
        history,
        TsvTableSource::new(&cfg.table_path),
        FileOverlay::new(&cfg.overlay_dir),
        &cfg,
    );

    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || read_controls(tx));

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    if let Err(err) = tracker.run(rx, shutdown).await {
        log(
            Level::Warn,
            Domain::Storage,
            "final_flush_failed",
            obj(&[("msg", v_str(&err.to_string()))]),
        );
    }

    // tracker is gone, so the writer drains its queue and exits
    writer.await?;
    json_log("shutdown", obj(&[("msg", v_str("history flushed"))]));
    Ok(())
}
