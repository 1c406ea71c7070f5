use crate::memory::InMemoryStorage;
use crate::writer::{BatchWriter, WriterRegistry, WriterSettings};
use async_trait::async_trait;
use shorty_core::{Lookup, Result, Stats, Storage, SYSTEM_OWNER};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// In-memory storage whose writes are persisted to a snapshot file.
///
/// Reads are served entirely from memory. Successful writes are mirrored
/// into the snapshot writer's pending buffer after the store's lock has been
/// released, and reach disk on the writer's next flush. Soft deletes are not
/// part of the snapshot format and only live in memory.
#[derive(Debug)]
pub struct FileStorage {
    inner: InMemoryStorage,
    writer: Arc<BatchWriter>,
    // Held across a write and its mirror so the pending buffer agrees with
    // the map on the last writer. The map and pending locks are still taken
    // one after the other, never together.
    write_order: Mutex<()>,
}

impl FileStorage {
    /// Opens the snapshot at `settings.path` and replays it into memory.
    ///
    /// Replayed records belong to [`SYSTEM_OWNER`]. A missing file yields an
    /// empty store.
    pub async fn open(settings: WriterSettings, registry: &WriterRegistry) -> Result<Self> {
        let writer = registry.open(settings).await?;
        let entries = writer.entries().await;

        let inner = InMemoryStorage::with_capacity(entries.len());
        inner.put_many(&entries, SYSTEM_OWNER).await?;

        info!(
            path = %writer.path().display(),
            entries = entries.len(),
            "replayed snapshot into memory"
        );
        Ok(Self {
            inner,
            writer,
            write_order: Mutex::new(()),
        })
    }

    /// The writer persisting this store.
    pub fn writer(&self) -> &Arc<BatchWriter> {
        &self.writer
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn put(&self, short_id: &str, original_url: &str, owner_id: &str) -> Result<()> {
        let _order = self.write_order.lock().await;
        self.inner.put(short_id, original_url, owner_id).await?;
        self.writer.record(short_id, original_url);
        Ok(())
    }

    async fn put_many(&self, entries: &HashMap<String, String>, owner_id: &str) -> Result<()> {
        let _order = self.write_order.lock().await;
        self.inner.put_many(entries, owner_id).await?;
        self.writer.record_many(entries);
        Ok(())
    }

    async fn insert(&self, short_id: &str, original_url: &str, owner_id: &str) -> Result<()> {
        let _order = self.write_order.lock().await;
        self.inner.insert(short_id, original_url, owner_id).await?;
        self.writer.record(short_id, original_url);
        Ok(())
    }

    async fn get(&self, short_id: &str) -> Result<Lookup> {
        self.inner.get(short_id).await
    }

    async fn find_short_id(&self, original_url: &str) -> Result<Option<String>> {
        self.inner.find_short_id(original_url).await
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<HashMap<String, String>> {
        self.inner.list_by_owner(owner_id).await
    }

    async fn soft_delete(&self, short_ids: &[String], owner_id: &str) -> Result<()> {
        self.inner.soft_delete(short_ids, owner_id).await
    }

    async fn stats(&self) -> Result<Stats> {
        self.inner.stats().await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    /// Writes pending entries synchronously. Failures are logged by the
    /// writer and never reach the caller.
    async fn flush(&self) -> Result<()> {
        let _ = self.writer.flush().await;
        Ok(())
    }

    /// Stops the background flush and writes what is still pending.
    ///
    /// The writer is shared by every store opened on the same path through
    /// one registry, so this stops background flushing for all of them.
    async fn close(&self) -> Result<()> {
        let _ = self.writer.close().await;
        Ok(())
    }
}
