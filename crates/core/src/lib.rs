//! Core domain types and shared logic for the reel media service.
//!
//! This crate defines the data model used across all other crates:
//! - Media identifiers and their storage keys
//! - Byte-range parsing and resolution against a file size
//! - Application configuration

pub mod config;
pub mod error;
pub mod media_id;
pub mod range;

pub use error::{Error, Result};
pub use media_id::MediaId;
pub use range::{ByteRange, RangeRequest, ResolvedRange, UnsatisfiableRange};

/// Default bounded write size for upload ingestion: 2 MiB
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Default bounded read size for range streaming: 2 MiB
pub const DEFAULT_STREAM_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Maximum accepted length of a media identifier in bytes.
pub const MAX_MEDIA_ID_LEN: usize = 128;
