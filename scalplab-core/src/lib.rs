//! ScalpLab Core — domain types, EMA, signal detection, trade simulation.
//!
//! This crate contains the heart of the backtester:
//! - Domain types (bars, signal tags, open positions, closed trades)
//! - Strategy configuration and its validation
//! - EMA indicator and the EMA-augmented bar view
//! - Exhaustion-reversal signal detector
//! - Single-position simulator with take-profit, stop-loss and trailing stop

pub mod config;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod signals;
