//! Common test utilities and fixtures.

pub mod mocks;
pub mod server;

#[allow(unused_imports)]
pub use mocks::*;
#[allow(unused_imports)]
pub use server::*;
