pub mod destination;
pub mod proxy;
pub mod trade;
