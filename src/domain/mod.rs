//! Core domain types and logic.

pub mod backtest;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod history;
pub mod indicator;
pub mod metrics;
pub mod multi_asset;
pub mod portfolio;
pub mod price;
pub mod schedule;
pub mod signal;
pub mod simulator;
pub mod sweep;
pub mod trade;
