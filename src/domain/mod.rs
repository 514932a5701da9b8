//! Core domain types and logic. No I/O happens below this module.

pub mod price;
pub mod lot;
pub mod transaction;
pub mod percent;
pub mod params;
pub mod beta;
pub mod grid;
pub mod trailing;
pub mod execution;
pub mod engine;
pub mod metrics;
pub mod buy_and_hold;
pub mod backtest;
pub mod universe;
pub mod portfolio;
pub mod batch;
pub mod config_validation;
pub mod error;
