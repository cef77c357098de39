pub mod exchange_adapter;
pub mod proxy_probe;
