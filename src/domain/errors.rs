use thiserror::Error;

/// Errors surfaced by the proxy scheduler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Every proxy known to the destination is deactivated, or the pool
    /// never held one. Retryable once proxies recover.
    #[error("No proxy available for destination: {destination}")]
    NoProxyAvailable { destination: String },

    #[error("Destination not registered with scheduler: {destination}")]
    UnknownDestination { destination: String },
}

/// Errors surfaced by the market data facade.
///
/// Adapter failures of any shape are collapsed into `DataNotAvailable`;
/// callers decide whether and when to retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarketDataError {
    #[error("Data not available from {destination}: {detail}")]
    DataNotAvailable { destination: String, detail: String },

    #[error("Destination not registered: {destination}")]
    UnknownDestination { destination: String },

    #[error("Invalid pair: {0}")]
    InvalidPair(String),
}

impl MarketDataError {
    pub fn data_not_available(destination: impl std::fmt::Display, detail: impl ToString) -> Self {
        MarketDataError::DataNotAvailable {
            destination: destination.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Row-level diagnostics from proxy list import. Collected per row and
/// reported, never fatal to the import.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProxyImportError {
    #[error("Expected 'address port [kind]', got {fields} fields")]
    WrongFieldCount { fields: usize },

    #[error("Invalid proxy address: {0}")]
    BadAddress(String),

    #[error("Invalid proxy port: {0}")]
    BadPort(String),

    #[error("Unknown proxy kind: {0}")]
    BadKind(String),
}
