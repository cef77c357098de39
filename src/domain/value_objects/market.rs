use crate::domain::value_objects::amount::Amount;
use crate::domain::value_objects::price::Price;
use serde::{Deserialize, Serialize};

/// One price level of an order book side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Price,
    pub amount: Amount,
}

/// Order book snapshot.
///
/// Both sides are ordered best-first: `bids` descending by price, `asks`
/// ascending. Adapters are responsible for delivering that order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Depth {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

impl Depth {
    pub fn new(bids: Vec<DepthLevel>, asks: Vec<DepthLevel>) -> Self {
        Depth { bids, asks }
    }

    pub fn best_bid(&self) -> Option<&DepthLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&DepthLevel> {
        self.asks.first()
    }

    /// Best ask minus best bid. None when either side is empty.
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price.value() - bid.price.value()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Top-of-book summary for one instrument on one destination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub bid: Price,
    pub ask: Price,
    pub last: Price,
    /// Rolling 24h volume in base currency units.
    pub volume: f64,
}
