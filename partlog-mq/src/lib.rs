pub mod config;
pub mod engine;
pub mod message;
pub mod partition;
