//! HTTP upload and streaming server for reel.
//!
//! This crate provides:
//! - The session registry for in-flight uploads and active viewers
//! - The chunked upload pipeline
//! - The byte-range streaming engine
//! - The reclaimer evicting idle sessions
//! - HTTP routes and Prometheus metrics

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod reclaim;
pub mod registry;
pub mod routes;
pub mod state;
pub mod streaming;
pub mod upload;

pub use error::ApiError;
pub use reclaim::{Reclaimer, SweepStats};
pub use registry::SessionRegistry;
pub use routes::create_router;
pub use state::AppState;
