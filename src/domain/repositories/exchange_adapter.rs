//! Exchange Adapter Trait
//!
//! Defines the `ExchangeAdapter` trait, the only contract the gateway has
//! with an exchange. Request formats, signatures and symbol spellings live
//! behind it; the gateway sees canonical pairs and canonical market data.
//!
//! Adapters must not cache and must not retry. Both concerns belong to the
//! gateway so polling cadence stays under one roof.

use crate::domain::entities::destination::DestinationProfile;
use crate::domain::entities::trade::Trade;
use crate::domain::value_objects::market::{Depth, Ticker};
use crate::domain::value_objects::pair::Pair;
use crate::domain::value_objects::timestamp::TimestampMicros;
use async_trait::async_trait;
use thiserror::Error;

/// Common result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors an adapter can report. The facade collapses all of them into
/// its uniform unavailability error; the variants exist for logging.
#[derive(Debug, Error, Clone)]
pub enum AdapterError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Pair not listed on this destination: {0}")]
    UnknownPair(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),
}

/// Contract between the gateway and one destination.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Rate-limit contract of this destination. Snapshotted once at
    /// registration; adapters should return stable values.
    fn profile(&self) -> DestinationProfile;

    /// Fetch the current order book for a pair.
    async fn depth(&self, pair: &Pair) -> AdapterResult<Depth>;

    /// Fetch the current top-of-book ticker for a pair.
    async fn ticker(&self, pair: &Pair) -> AdapterResult<Ticker>;

    /// Fetch trades executed at or after `since`, sorted ascending by
    /// execution time. An empty batch is a valid answer.
    async fn trades(&self, pair: &Pair, since: TimestampMicros) -> AdapterResult<Vec<Trade>>;
}
