pub mod amount;
pub mod market;
pub mod pair;
pub mod price;
pub mod timestamp;
