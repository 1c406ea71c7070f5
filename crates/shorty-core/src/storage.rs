use crate::error::Result;
use crate::record::{Lookup, Stats};
use async_trait::async_trait;
use std::collections::HashMap;

/// The contract every storage backend implements.
///
/// The request layer only ever talks to this trait, so the in-memory,
/// snapshot-backed and relational backends are interchangeable by
/// configuration alone.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Creates or replaces the record for `short_id` (last writer wins).
    ///
    /// The in-memory backends never fail with `AlreadyExists` here; the
    /// relational backend does when another short id already holds
    /// `original_url`, because it enforces URL uniqueness in its schema.
    async fn put(&self, short_id: &str, original_url: &str, owner_id: &str) -> Result<()>;

    /// Applies [`put`](Storage::put) to every entry of a short id to URL map.
    ///
    /// Each key becomes visible atomically; concurrent readers may observe a
    /// prefix of the batch.
    async fn put_many(&self, entries: &HashMap<String, String>, owner_id: &str) -> Result<()>;

    /// Creates the record unless a live record already holds `original_url`.
    ///
    /// Returns `Err(AlreadyExists)` carrying the short id that holds the URL.
    async fn insert(&self, short_id: &str, original_url: &str, owner_id: &str) -> Result<()>;

    /// Resolves a short id, distinguishing missing from deleted records.
    async fn get(&self, short_id: &str) -> Result<Lookup>;

    /// Returns the short id of a live record holding `original_url`, if any.
    async fn find_short_id(&self, original_url: &str) -> Result<Option<String>>;

    /// Returns every live record created by `owner_id` as short id to URL.
    async fn list_by_owner(&self, owner_id: &str) -> Result<HashMap<String, String>>;

    /// Marks each listed record deleted if it exists and belongs to `owner_id`.
    ///
    /// Ids that are unknown or owned by someone else are skipped silently.
    async fn soft_delete(&self, short_ids: &[String], owner_id: &str) -> Result<()>;

    /// Counts every record and distinct owner, tombstones included.
    async fn stats(&self) -> Result<Stats>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<()>;

    /// Forces pending writes to durable storage, where the backend has any.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Releases backend resources, flushing anything still pending.
    async fn close(&self) -> Result<()>;
}
