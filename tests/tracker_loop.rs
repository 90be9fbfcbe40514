//! Tracker passes and control handling with scripted collaborators.

use std::cell::Cell;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pnlwatch::chart::{ChartGeometry, ChartProjection, Insufficient};
use pnlwatch::config::Config;
use pnlwatch::display::DisplayController;
use pnlwatch::error::{DisplayError, SourceError};
use pnlwatch::history::{HistoryStore, Sample};
use pnlwatch::source::{DataSource, Totals};
use pnlwatch::stats::{IntervalGain, Summary};
use pnlwatch::storage::MemoryStore;
use pnlwatch::timeframe::Timeframe;
use pnlwatch::tracker::{ControlEvent, PassMode, PassOutcome, Tracker};
use tokio::sync::mpsc;

const KEY: &str = "pnlHistory";

thread_local! {
    static NOW: Cell<i64> = Cell::new(0);
}

fn test_clock() -> i64 {
    NOW.with(|n| n.get())
}

fn set_now(ms: i64) {
    NOW.with(|n| n.set(ms));
}

/// Scripted page: `None` until a test sets totals.
#[derive(Clone, Default)]
struct Page {
    state: Arc<Mutex<PageState>>,
}

#[derive(Default)]
struct PageState {
    totals: Option<Totals>,
    fail: bool,
}

impl Page {
    fn show(&self, total_wager: f64, total_pnl: f64) {
        self.state.lock().unwrap().totals = Some(Totals { total_wager, total_pnl, row_count: 1 });
    }

    fn hide(&self) {
        self.state.lock().unwrap().totals = None;
    }

    fn break_source(&self) {
        self.state.lock().unwrap().fail = true;
    }
}

impl DataSource for Page {
    fn fetch(&mut self) -> Result<Option<Totals>, SourceError> {
        let state = self.state.lock().unwrap();
        if state.fail {
            return Err(SourceError::Unavailable("document gone".to_string()));
        }
        Ok(state.totals)
    }
}

#[derive(Default)]
struct Recorder {
    summaries: Vec<(Summary, Timeframe)>,
    charts: Vec<ChartProjection>,
    removals: usize,
}

impl DisplayController for Recorder {
    fn render_summary(&mut self, summary: &Summary, selected: Timeframe) -> Result<(), DisplayError> {
        self.summaries.push((summary.clone(), selected));
        Ok(())
    }

    fn render_chart(&mut self, chart: &ChartProjection, _geometry: &ChartGeometry) -> Result<(), DisplayError> {
        self.charts.push(chart.clone());
        Ok(())
    }

    fn remove_overlay(&mut self) -> Result<(), DisplayError> {
        self.removals += 1;
        Ok(())
    }
}

fn tracker(store: MemoryStore, page: Page) -> Tracker<MemoryStore, Page, Recorder> {
    let cfg = Config::default();
    let history = HistoryStore::new(store, KEY, cfg.max_points, cfg.save_batch_size);
    Tracker::new(history, page, Recorder::default(), &cfg).with_clock(test_clock)
}

fn gain(summary: &Summary, label: &str) -> IntervalGain {
    summary
        .interval_gains
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, g)| *g)
        .unwrap()
}

#[test]
fn refresh_pass_renders_without_recording() {
    let page = Page::default();
    page.show(100.0, 5.0);
    let mut t = tracker(MemoryStore::new(), page);
    set_now(1_000);

    let out = t.run_pass(PassMode::Refresh);
    assert!(matches!(out, PassOutcome::Rendered { appended: false, .. }));
    assert!(t.history().is_empty());
    let shown = t.display();
    assert_eq!(shown.charts, vec![ChartProjection::Insufficient { reason: Insufficient::NoData }]);
    assert_eq!(shown.summaries.len(), 1);
    assert_eq!(shown.summaries[0].0.percent_gain, 5.0);
}

#[test]
fn recording_passes_feed_interval_gains() {
    let page = Page::default();
    let mut t = tracker(MemoryStore::new(), page.clone());
    for (ts, pnl) in [(0, 100.0), (60_000, 150.0), (120_000, 90.0)] {
        set_now(ts);
        page.show(1_000.0, pnl);
        assert!(matches!(t.run_pass(PassMode::Record), PassOutcome::Rendered { appended: true, .. }));
    }
    assert_eq!(t.history().len(), 3);

    let (summary, selected) = t.display().summaries.last().unwrap();
    assert_eq!(*selected, Timeframe::OneHour);
    assert_eq!(gain(summary, "1min"), IntervalGain::Delta(-60.0));
    assert_eq!(gain(summary, "5min"), IntervalGain::NotEnoughData);
    assert!(matches!(t.display().charts.last(), Some(ChartProjection::Plot(_))));
}

#[test]
fn missing_table_removes_overlay_and_keeps_history() {
    let page = Page::default();
    let mut t = tracker(MemoryStore::new(), page.clone());
    page.show(10.0, 1.0);
    t.run_pass(PassMode::Record);
    page.hide();

    assert_eq!(t.run_pass(PassMode::Record), PassOutcome::NoTable);
    assert_eq!(t.display().removals, 1);
    assert_eq!(t.history().len(), 1);
}

#[test]
fn source_failure_skips_the_pass() {
    let page = Page::default();
    page.show(10.0, 1.0);
    page.break_source();
    let mut t = tracker(MemoryStore::new(), page);

    assert_eq!(t.run_pass(PassMode::Record), PassOutcome::SourceFailed);
    assert!(t.history().is_empty());
    assert_eq!(t.display().removals, 0);
    assert!(t.display().charts.is_empty());
}

#[test]
fn reset_empties_history_and_refreshes() {
    let store = MemoryStore::new();
    let probe = store.handle();
    let page = Page::default();
    let mut t = tracker(store, page.clone());
    for ts in 0..4 {
        set_now(ts * 2_000);
        page.show(50.0, ts as f64);
        t.run_pass(PassMode::Record);
    }
    let summaries_before = t.display().summaries.len();

    t.handle_control(ControlEvent::ResetRequested);

    assert!(t.history().is_empty());
    assert_eq!(probe.raw(KEY).as_deref(), Some("[]"));
    let shown = t.display();
    assert_eq!(shown.summaries.len(), summaries_before + 1);
    let (summary, _) = shown.summaries.last().unwrap();
    assert!(summary.interval_gains.iter().all(|(_, g)| *g == IntervalGain::NotEnoughData));
    assert_eq!(
        shown.charts.last(),
        Some(&ChartProjection::Insufficient { reason: Insufficient::NoData })
    );
}

#[test]
fn timeframe_change_only_redraws_chart() {
    let page = Page::default();
    let mut t = tracker(MemoryStore::new(), page.clone());
    page.show(50.0, 1.0);
    set_now(0);
    t.run_pass(PassMode::Record);
    set_now(10 * 60 * 1000);
    page.show(50.0, 2.0);
    t.run_pass(PassMode::Record);
    let (summaries, charts) = (t.display().summaries.len(), t.display().charts.len());

    t.handle_control(ControlEvent::TimeframeSelected(Timeframe::ThreeMinutes));

    assert_eq!(t.timeframe(), Timeframe::ThreeMinutes);
    assert_eq!(t.history().len(), 2);
    assert_eq!(t.display().summaries.len(), summaries);
    assert_eq!(t.display().charts.len(), charts + 1);
    assert_eq!(
        t.display().charts.last(),
        Some(&ChartProjection::Insufficient { reason: Insufficient::OutsideWindow })
    );
}

#[tokio::test(start_paused = true)]
async fn run_loop_refreshes_first_then_records_each_interval() {
    set_now(5_000);
    let store = MemoryStore::new();
    let probe = store.handle();
    let page = Page::default();
    page.show(100.0, 7.0);
    let t = tracker(store, page);

    let (tx, rx) = mpsc::channel(4);
    tx.send(ControlEvent::TimeframeSelected(Timeframe::All)).await.unwrap();

    // startup pass at 1.5s, recording passes at 2s, 4s and 6s
    let shutdown = tokio::time::sleep(Duration::from_millis(7_000));
    t.run(rx, shutdown).await.unwrap();

    let saved: Vec<Sample> = serde_json::from_str(&probe.raw(KEY).unwrap()).unwrap();
    assert_eq!(saved.len(), 3);
    assert!(saved.iter().all(|s| s.pnl == 7.0 && s.timestamp == 5_000));
    drop(tx);
}
