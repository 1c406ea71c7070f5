//! URL shortener service.
//!
//! This crate provides the service layer on top of the storage contract
//! and the short id generators. Storage types are re-exported from
//! `shorty_core`.

pub mod error;
pub mod generator;
pub mod service;

pub use error::{Result, ShortenerError};
pub use generator::random::RandomGenerator;
pub use generator::seq::SeqGenerator;
pub use generator::Generator;
pub use service::{BatchItem, BatchResult, Shortened, ShortenerService, UserUrl};
pub use shorty_core::{Stats, Storage, StorageError};
