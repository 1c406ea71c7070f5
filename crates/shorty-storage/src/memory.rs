use async_trait::async_trait;
use parking_lot::RwLock;
use shorty_core::{Lookup, Record, Result, Stats, Storage, StorageError};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// In-memory implementation of the [`Storage`] contract.
///
/// A single reader/writer lock guards the whole map: lookups take the shared
/// lock, mutations take the exclusive one. No I/O ever happens under the
/// lock. Records are never removed; a soft delete only flips their flag.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    records: RwLock<HashMap<String, Record>>,
}

impl InMemoryStorage {
    /// Creates a new, empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory storage with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Number of records held, tombstones included.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn live_holder<'a>(records: &'a HashMap<String, Record>, original_url: &str) -> Option<&'a str> {
    records
        .iter()
        .find(|(_, record)| !record.deleted && record.original_url == original_url)
        .map(|(short_id, _)| short_id.as_str())
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn put(&self, short_id: &str, original_url: &str, owner_id: &str) -> Result<()> {
        trace!(short_id, owner_id, "storing record");
        self.records
            .write()
            .insert(short_id.to_owned(), Record::new(original_url, owner_id));
        Ok(())
    }

    async fn put_many(&self, entries: &HashMap<String, String>, owner_id: &str) -> Result<()> {
        trace!(entries = entries.len(), owner_id, "storing batch");
        let mut records = self.records.write();
        records.reserve(entries.len());
        for (short_id, original_url) in entries {
            records.insert(short_id.clone(), Record::new(original_url.as_str(), owner_id));
        }
        Ok(())
    }

    async fn insert(&self, short_id: &str, original_url: &str, owner_id: &str) -> Result<()> {
        let mut records = self.records.write();

        if let Some(existing) = live_holder(&records, original_url) {
            return Err(StorageError::AlreadyExists {
                short_id: existing.to_owned(),
            });
        }
        if records.contains_key(short_id) {
            return Err(StorageError::AlreadyExists {
                short_id: short_id.to_owned(),
            });
        }

        records.insert(short_id.to_owned(), Record::new(original_url, owner_id));
        Ok(())
    }

    async fn get(&self, short_id: &str) -> Result<Lookup> {
        Ok(self
            .records
            .read()
            .get(short_id)
            .map_or(Lookup::Missing, Record::lookup))
    }

    async fn find_short_id(&self, original_url: &str) -> Result<Option<String>> {
        Ok(live_holder(&self.records.read(), original_url).map(str::to_owned))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<HashMap<String, String>> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|(_, record)| !record.deleted && record.owner_id == owner_id)
            .map(|(short_id, record)| (short_id.clone(), record.original_url.clone()))
            .collect())
    }

    async fn soft_delete(&self, short_ids: &[String], owner_id: &str) -> Result<()> {
        let mut records = self.records.write();
        for short_id in short_ids {
            match records.get_mut(short_id) {
                Some(record) if record.owner_id == owner_id => record.deleted = true,
                Some(_) => trace!(short_id = %short_id, owner_id, "skipping delete of foreign record"),
                None => trace!(short_id = %short_id, "skipping delete of unknown record"),
            }
        }
        Ok(())
    }

    async fn stats(&self) -> Result<Stats> {
        let records = self.records.read();
        let users: HashSet<&str> = records.values().map(|r| r.owner_id.as_str()).collect();
        Ok(Stats {
            urls: records.len(),
            users: users.len(),
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
