pub mod common;
pub mod data;
pub mod net;
