pub mod api;
pub mod config;
pub mod contracts;
pub mod guard;
pub mod metrics;
pub mod storage;
