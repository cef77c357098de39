pub mod health_checker;
pub mod market_data;
pub mod trade_history;
