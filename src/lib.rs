//! Soko Market Data Gateway
//!
//! Rate-limit-aware caching and dispatch layer between market data
//! consumers and exchange APIs. Call results are cached per destination
//! update interval, trade history is polled into rolling windows, and
//! outbound requests are spread across a rated proxy pool.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
