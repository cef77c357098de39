pub mod call_cache;
pub mod proxy_pool;
pub mod proxy_scheduler;
pub mod trade_window;
