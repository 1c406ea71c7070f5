//! Core types and traits for the Shorty URL shortener.
//!
//! This crate holds the record model, the storage contract shared by every
//! backend, and the error taxonomy callers match on. It performs no I/O.

pub mod error;
pub mod record;
pub mod storage;

pub use error::{Result, StorageError};
pub use record::{Lookup, Record, Stats, SYSTEM_OWNER};
pub use storage::Storage;
