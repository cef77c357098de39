use crate::domain::entities::trade::Trade;
use crate::domain::value_objects::timestamp::TimestampMicros;
use std::collections::VecDeque;

/// Rolling, duplicate-free history of trades for one instrument on one
/// destination, ordered ascending by execution time.
///
/// The only way in is [`TradeWindow::merge`], which ignores every record
/// not strictly newer than the current newest entry. Combined with
/// ascending batches from adapters this keeps the window strictly
/// ascending with no duplicate (timestamp, id) pair, even when fetch
/// ranges overlap.
#[derive(Debug, Default)]
pub struct TradeWindow {
    trades: VecDeque<Trade>,
}

impl TradeWindow {
    pub fn new() -> Self {
        TradeWindow {
            trades: VecDeque::new(),
        }
    }

    /// Append the strictly-newer suffix of an ascending batch. Returns the
    /// number of trades appended.
    ///
    /// The newest bound is re-evaluated as the window grows, so repeated
    /// timestamps inside one batch collapse to their first record.
    pub fn merge(&mut self, batch: Vec<Trade>) -> usize {
        let mut appended = 0;
        for trade in batch {
            if let Some(newest) = self.trades.back() {
                if trade.executed_at <= newest.executed_at {
                    continue;
                }
            }
            self.trades.push_back(trade);
            appended += 1;
        }
        appended
    }

    /// Drop every trade executed before `cutoff`. Returns the number
    /// dropped.
    pub fn evict_older_than(&mut self, cutoff: TimestampMicros) -> usize {
        let mut evicted = 0;
        while let Some(front) = self.trades.front() {
            if front.executed_at >= cutoff {
                break;
            }
            self.trades.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Whether the window fully covers `[start, end]`: non-empty, oldest
    /// at or before `start`, newest at or after `end`. Partial overlap
    /// does not count.
    pub fn contains(&self, start: TimestampMicros, end: TimestampMicros) -> bool {
        match (self.trades.front(), self.trades.back()) {
            (Some(oldest), Some(newest)) => {
                oldest.executed_at <= start && newest.executed_at >= end
            }
            _ => false,
        }
    }

    /// Trades executed within `[start, end]`, both bounds inclusive.
    pub fn trades_between(&self, start: TimestampMicros, end: TimestampMicros) -> Vec<Trade> {
        self.trades
            .iter()
            .filter(|t| t.executed_at >= start && t.executed_at <= end)
            .cloned()
            .collect()
    }

    pub fn oldest(&self) -> Option<&Trade> {
        self.trades.front()
    }

    pub fn newest(&self) -> Option<&Trade> {
        self.trades.back()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}
