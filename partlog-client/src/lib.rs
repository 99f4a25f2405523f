pub mod client;
pub mod config;
pub mod consumer;
pub mod offset_store;
pub mod producer;
