//! Core domain types and logic.

pub mod price;
pub mod series;
pub mod indicator;
pub mod signal;
pub mod relative_strength;
pub mod position;
pub mod portfolio;
pub mod backtest;
pub mod rotation;
pub mod single;
pub mod metrics;
pub mod universe;
pub mod config_validation;
pub mod error;
