//! The ambient stack around the C1-C5 core: YAML/env configuration,
//! sqlite persistence, and an axum HTTP/WS control surface exposing the
//! executor API. Adapted from `orchestrator`.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod executors;
pub mod learning;

pub use config::Config;
pub use error::{Result, ServerError};
