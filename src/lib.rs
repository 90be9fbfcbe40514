pub mod chart;
pub mod config;
pub mod currency;
pub mod display;
pub mod error;
pub mod history;
pub mod logging;
pub mod source;
pub mod stats;
pub mod storage;
pub mod timeframe;
pub mod tracker;
