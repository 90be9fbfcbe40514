//! Presentation of summaries and chart projections.
//!
//! `FileOverlay` writes the overlay as two files: `summary.txt` (the text
//! panel with its timeframe controls) and `chart.svg`.

use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::chart::{ChartGeometry, ChartProjection};
use crate::error::DisplayError;
use crate::stats::Summary;
use crate::timeframe::Timeframe;

const BACKGROUND: &str = "#333a40";
const BORDER: &str = "#4a5258";
const PLACEHOLDER: &str = "#888";
const ZERO_LINE: &str = "#666";

pub trait DisplayController {
    fn render_summary(&mut self, summary: &Summary, selected: Timeframe) -> Result<(), DisplayError>;
    fn render_chart(
        &mut self,
        chart: &ChartProjection,
        geometry: &ChartGeometry,
    ) -> Result<(), DisplayError>;
    fn remove_overlay(&mut self) -> Result<(), DisplayError>;
}

impl<D: DisplayController + ?Sized> DisplayController for Box<D> {
    fn render_summary(&mut self, summary: &Summary, selected: Timeframe) -> Result<(), DisplayError> {
        (**self).render_summary(summary, selected)
    }

    fn render_chart(
        &mut self,
        chart: &ChartProjection,
        geometry: &ChartGeometry,
    ) -> Result<(), DisplayError> {
        (**self).render_chart(chart, geometry)
    }

    fn remove_overlay(&mut self) -> Result<(), DisplayError> {
        (**self).remove_overlay()
    }
}

pub fn summary_text(summary: &Summary, selected: Timeframe) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total Wager: ${:.2}", summary.total_wager);
    let _ = writeln!(
        out,
        "% Gain: {:.2}%    Total P&L: ${:.2}    Bets: {}",
        summary.percent_gain, summary.total_pnl, summary.row_count
    );
    for row in summary.interval_gains.chunks(3) {
        let cells: Vec<String> = row
            .iter()
            .map(|(label, gain)| format!("{}: {}", label, gain.display()))
            .collect();
        let _ = writeln!(out, "{}", cells.join("    "));
    }
    let controls: Vec<String> = Timeframe::ALL
        .iter()
        .map(|tf| {
            if *tf == selected {
                format!("[*{}*]", tf.label())
            } else {
                format!("[{}]", tf.label())
            }
        })
        .collect();
    let _ = writeln!(out, "{} [Reset Data]", controls.join(" "));
    out
}

pub fn chart_svg(chart: &ChartProjection, geometry: &ChartGeometry) -> String {
    let ChartGeometry { width, height, padding } = *geometry;
    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" style="background-color:{bg};border:1px solid {border};border-radius:3px">"#,
        w = width,
        h = height,
        bg = BACKGROUND,
        border = BORDER,
    );
    match chart {
        ChartProjection::Insufficient { reason } => {
            let _ = writeln!(
                out,
                r#"  <text x="{x}" y="{y}" fill="{fill}" font-size="10px" text-anchor="middle" dominant-baseline="middle">{text}</text>"#,
                x = width / 2.0,
                y = height / 2.0,
                fill = PLACEHOLDER,
                text = reason.placeholder().replace('&', "&amp;"),
            );
        }
        ChartProjection::Plot(plot) => {
            let points: Vec<String> = plot
                .points
                .iter()
                .map(|p| format!("{:.2},{:.2}", p.x, p.y))
                .collect();
            let _ = writeln!(
                out,
                r#"  <polyline points="{}" fill="none" stroke="{}" stroke-width="1.5"/>"#,
                points.join(" "),
                plot.line_color.hex(),
            );
            if let Some(y) = plot.zero_line_y {
                let _ = writeln!(
                    out,
                    r#"  <line x1="{x1}" y1="{y:.2}" x2="{x2}" y2="{y:.2}" stroke="{c}" stroke-width="0.5" stroke-dasharray="2,2"/>"#,
                    x1 = padding,
                    x2 = width - padding,
                    y = y,
                    c = ZERO_LINE,
                );
            }
        }
    }
    out.push_str("</svg>\n");
    out
}

#[derive(Debug, Clone)]
pub struct FileOverlay {
    dir: PathBuf,
}

impl FileOverlay {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join("summary.txt")
    }

    pub fn chart_path(&self) -> PathBuf {
        self.dir.join("chart.svg")
    }

    fn write(&self, path: &Path, body: &str) -> Result<(), DisplayError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(path, body)?;
        Ok(())
    }
}

fn remove_if_present(path: &Path) -> Result<(), DisplayError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

impl DisplayController for FileOverlay {
    fn render_summary(&mut self, summary: &Summary, selected: Timeframe) -> Result<(), DisplayError> {
        self.write(&self.summary_path(), &summary_text(summary, selected))
    }

    fn render_chart(
        &mut self,
        chart: &ChartProjection,
        geometry: &ChartGeometry,
    ) -> Result<(), DisplayError> {
        self.write(&self.chart_path(), &chart_svg(chart, geometry))
    }

    fn remove_overlay(&mut self) -> Result<(), DisplayError> {
        remove_if_present(&self.summary_path())?;
        remove_if_present(&self.chart_path())
    }
}
