//! HTTP request handlers.

pub mod common;
pub mod health;
pub mod upload;
pub mod watch;

pub use common::*;
pub use health::*;
pub use upload::*;
pub use watch::*;
