use crate::domain::value_objects::amount::Amount;
use crate::domain::value_objects::price::Price;
use crate::domain::value_objects::timestamp::TimestampMicros;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// One executed trade as reported by a destination.
///
/// Identified by `(executed_at, trade_id)`; venues recycle id formats but
/// never reuse an id within the same microsecond.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub executed_at: TimestampMicros,
    pub trade_id: String,
    pub price: Price,
    pub amount: Amount,
    pub side: TradeSide,
}

impl Trade {
    pub fn new(
        executed_at: TimestampMicros,
        trade_id: impl Into<String>,
        price: Price,
        amount: Amount,
        side: TradeSide,
    ) -> Self {
        Trade {
            executed_at,
            trade_id: trade_id.into(),
            price,
            amount,
            side,
        }
    }
}
