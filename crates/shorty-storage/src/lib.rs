//! Storage backends for the Shorty URL shortener.
//!
//! Three backends implement [`Storage`]: a pure in-memory map, the same map
//! fronted by batched snapshot persistence, and PostgreSQL. [`open_storage`]
//! picks one from [`StorageSettings`] at startup.

pub mod backend;
pub mod error;
pub mod file;
pub mod memory;
pub mod postgres;
pub mod snapshot;
pub mod writer;

pub use backend::{open_storage, StorageSettings};
pub use error::SnapshotError;
pub use file::FileStorage;
pub use memory::InMemoryStorage;
pub use postgres::PostgresStorage;
pub use shorty_core::{Lookup, Result, Stats, Storage, StorageError};
pub use writer::{BatchWriter, WriterRegistry, WriterSettings};
