//! Locating the bet table and summing its wager and pnl columns.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::Serialize;

use crate::currency::parse_currency;
use crate::error::SourceError;

pub const WAGER_LABEL: &str = "WAGER";
pub const PNL_LABEL: &str = "P&L";

/// Text content of one table: header cells plus body rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Totals {
    pub total_wager: f64,
    pub total_pnl: f64,
    pub row_count: usize,
}

/// Where a pass reads the current table from.
pub trait DataSource {
    /// `Ok(None)` means no matching table is on the page right now.
    fn fetch(&mut self) -> Result<Option<Totals>, SourceError>;
}

impl<D: DataSource + ?Sized> DataSource for Box<D> {
    fn fetch(&mut self) -> Result<Option<Totals>, SourceError> {
        (**self).fetch()
    }
}

fn column(header: &[String], label: &str) -> Option<usize> {
    header.iter().position(|cell| cell.trim().eq_ignore_ascii_case(label))
}

/// Sum the first table whose header has both a wager and a pnl column.
pub fn extract_totals(tables: &[Table]) -> Option<Totals> {
    tables.iter().find_map(|table| {
        let wager_col = column(&table.header, WAGER_LABEL)?;
        let pnl_col = column(&table.header, PNL_LABEL)?;
        let mut totals = Totals {
            total_wager: 0.0,
            total_pnl: 0.0,
            row_count: table.rows.len(),
        };
        for row in &table.rows {
            totals.total_wager += parse_currency(row.get(wager_col).map(String::as_str));
            totals.total_pnl += parse_currency(row.get(pnl_col).map(String::as_str));
        }
        Some(totals)
    })
}

/// Parse tab-separated tables. Blank lines separate tables and the first
/// line of each block is its header.
pub fn parse_tsv_tables(text: &str) -> Vec<Table> {
    let mut tables = Vec::new();
    let mut current: Option<Table> = None;
    for line in text.lines() {
        if line.trim().is_empty() {
            if let Some(table) = current.take() {
                tables.push(table);
            }
            continue;
        }
        let cells: Vec<String> = line.split('\t').map(|c| c.to_string()).collect();
        if let Some(table) = current.as_mut() {
            table.rows.push(cells);
        } else {
            current = Some(Table {
                header: cells,
                rows: Vec::new(),
            });
        }
    }
    if let Some(table) = current {
        tables.push(table);
    }
    tables
}

/// Reads a tab-separated table export from disk on every fetch.
#[derive(Debug, Clone)]
pub struct TsvTableSource {
    path: PathBuf,
}

impl TsvTableSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DataSource for TsvTableSource {
    fn fetch(&mut self) -> Result<Option<Totals>, SourceError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(extract_totals(&parse_tsv_tables(&text)))
    }
}
