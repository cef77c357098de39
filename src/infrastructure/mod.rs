pub mod egress;
pub mod probe;
pub mod proxy_import;
