//! Mutuals - mutual-follow exchange engine
//!
//! Members trade follows on an external social graph: each acquisition pairs
//! a member with others who follow back, and one-sided follows are undone.
//!
//! ## Modules
//!
//! - **Engine**: quota, candidate selection, reciprocal follow coordination, release
//! - **Store**: member persistence (MongoDB or in-memory)
//! - **Graph**: follow graph client (GitHub REST or in-memory)
//! - **Registration**: onboarding from a graph credential
//! - **Logging**: JSONL activity trail

pub mod config;
pub mod db;
pub mod engine;
pub mod graph;
pub mod logging;
pub mod member;
pub mod registration;
pub mod store;
pub mod types;

pub use config::Args;
pub use engine::Exchange;
pub use types::{ExchangeError, Result};
