pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod hub;
pub mod models;
pub mod observability;
pub mod presence;
pub mod rides;
pub mod state;
pub mod storage;
