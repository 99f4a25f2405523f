pub mod broker;
pub mod common;
pub mod group;
pub mod handler;
pub mod server;
