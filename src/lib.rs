pub mod aggregator;
pub mod cache;
pub mod clock;
pub mod config;
pub mod duration;
pub mod models;
pub mod prices;
pub mod rpc;
pub mod sources;
