//! The periodic pass: read totals, record a sample, redraw.
//!
//! The tracker is the single owner of the history. Control events and timer
//! ticks are handled one at a time on the task that drives `run`.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::chart::{project, ChartGeometry, ChartProjection};
use crate::config::Config;
use crate::display::DisplayController;
use crate::error::StoreError;
use crate::history::{HistoryStore, PersistOutcome};
use crate::logging::{agg_increment, log, log_totals, obj, tick_aggregator, v_str, Domain, Level, ProfileScope};
use crate::source::{DataSource, Totals};
use crate::stats::Summary;
use crate::storage::KvStore;
use crate::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// Append the observed pnl, then redraw.
    Record,
    /// Redraw only; used for the first pass and right after a reset.
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    TimeframeSelected(Timeframe),
    ResetRequested,
}

impl FromStr for ControlEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("reset") {
            return Ok(ControlEvent::ResetRequested);
        }
        s.parse().map(ControlEvent::TimeframeSelected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassOutcome {
    Rendered { totals: Totals, appended: bool },
    NoTable,
    SourceFailed,
}

pub fn wall_clock_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub struct Tracker<S, D, V> {
    history: HistoryStore<S>,
    source: D,
    display: V,
    timeframe: Timeframe,
    geometry: ChartGeometry,
    sample_interval: Duration,
    startup_delay: Duration,
    clock: fn() -> i64,
}

impl<S, D, V> Tracker<S, D, V>
where
    S: KvStore,
    D: DataSource,
    V: DisplayController,
{
    pub fn new(history: HistoryStore<S>, source: D, display: V, cfg: &Config) -> Self {
        Self {
            history,
            source,
            display,
            timeframe: cfg.default_timeframe,
            geometry: cfg.geometry(),
            sample_interval: Duration::from_millis(cfg.sample_interval_ms),
            startup_delay: Duration::from_millis(cfg.startup_delay_ms),
            clock: wall_clock_ms,
        }
    }

    /// Swap the time source used for new samples and chart windows.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn history(&self) -> &HistoryStore<S> {
        &self.history
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn display(&self) -> &V {
        &self.display
    }

    pub fn run_pass(&mut self, mode: PassMode) -> PassOutcome {
        let _scope = ProfileScope::with_context("pass", &[("mode", v_str(&format!("{:?}", mode)))]);
        agg_increment("pass");
        let outcome = match self.source.fetch() {
            Err(err) => {
                log(
                    Level::Warn,
                    Domain::Source,
                    "fetch_failed",
                    obj(&[("msg", v_str(&err.to_string()))]),
                );
                PassOutcome::SourceFailed
            }
            Ok(None) => {
                if let Err(err) = self.display.remove_overlay() {
                    log_display_failure("remove_overlay", &err);
                }
                PassOutcome::NoTable
            }
            Ok(Some(totals)) => {
                log_totals(totals.total_wager, totals.total_pnl, totals.row_count);
                let appended = mode == PassMode::Record;
                if appended {
                    // failures are logged by the history; memory stays authoritative
                    let _ = self.history.append_at((self.clock)(), totals.total_pnl);
                }
                self.redraw_chart();
                let summary = Summary::build(&totals, self.history.samples());
                if let Err(err) = self.display.render_summary(&summary, self.timeframe) {
                    log_display_failure("render_summary", &err);
                }
                PassOutcome::Rendered { totals, appended }
            }
        };
        tick_aggregator();
        outcome
    }

    pub fn handle_control(&mut self, event: ControlEvent) {
        log(
            Level::Info,
            Domain::Control,
            "control",
            obj(&[("event", v_str(&format!("{:?}", event)))]),
        );
        match event {
            ControlEvent::TimeframeSelected(tf) => {
                self.timeframe = tf;
                self.redraw_chart();
            }
            ControlEvent::ResetRequested => {
                let _ = self.history.reset();
                self.redraw_chart();
                self.run_pass(PassMode::Refresh);
            }
        }
    }

    pub fn projection(&self) -> ChartProjection {
        project(self.history.samples(), self.timeframe, (self.clock)(), &self.geometry)
    }

    fn redraw_chart(&mut self) {
        let projection = self.projection();
        if let Err(err) = self.display.render_chart(&projection, &self.geometry) {
            log_display_failure("render_chart", &err);
        }
    }

    /// Drive passes until `shutdown` resolves, then flush the history.
    ///
    /// The first pass runs after the startup delay in refresh mode so the
    /// initial observation is not counted twice; after that one recording
    /// pass runs per sample interval.
    pub async fn run<F>(
        mut self,
        mut controls: mpsc::Receiver<ControlEvent>,
        shutdown: F,
    ) -> Result<PersistOutcome, StoreError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        log(
            Level::Info,
            Domain::System,
            "tracker_start",
            obj(&[
                ("samples", json!(self.history.len())),
                ("interval_ms", json!(self.sample_interval.as_millis() as u64)),
                ("timeframe", v_str(self.timeframe.label())),
            ]),
        );

        let mut ticker = interval(self.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately; periodic passes start one interval in
        ticker.tick().await;

        let mut stopped = false;
        tokio::select! {
            _ = &mut shutdown => stopped = true,
            _ = sleep(self.startup_delay) => {
                self.run_pass(PassMode::Refresh);
            }
        }

        while !stopped {
            tokio::select! {
                _ = &mut shutdown => stopped = true,
                _ = ticker.tick() => {
                    self.run_pass(PassMode::Record);
                }
                Some(event) = controls.recv() => self.handle_control(event),
            }
        }

        log(
            Level::Info,
            Domain::System,
            "tracker_stop",
            obj(&[("samples", json!(self.history.len()))]),
        );
        self.history.dispose()
    }
}

fn log_display_failure(op: &str, err: &dyn std::fmt::Display) {
    log(
        Level::Warn,
        Domain::Chart,
        "display_failed",
        obj(&[("op", v_str(op)), ("msg", v_str(&err.to_string()))]),
    );
}
