use serde::{Deserialize, Serialize};

/// Owner tag given to records replayed from a snapshot.
pub const SYSTEM_OWNER: &str = "system";

/// A stored mapping, addressed by its short id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The destination the short id redirects to.
    pub original_url: String,
    /// The principal that created the record.
    pub owner_id: String,
    /// Set once by a soft delete and never cleared.
    pub deleted: bool,
}

impl Record {
    /// Creates a live record.
    pub fn new(original_url: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            original_url: original_url.into(),
            owner_id: owner_id.into(),
            deleted: false,
        }
    }

    /// Returns the resolution view of this record.
    pub fn lookup(&self) -> Lookup {
        if self.deleted {
            Lookup::Deleted(self.original_url.clone())
        } else {
            Lookup::Live(self.original_url.clone())
        }
    }
}

/// Result of resolving a short id.
///
/// "Never existed" and "existed but soft-deleted" are different outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The record exists and is resolvable.
    Live(String),
    /// The record exists but has been soft-deleted.
    Deleted(String),
    /// No record was ever stored under the short id.
    Missing,
}

impl Lookup {
    /// Whether a record exists, deleted or not.
    pub fn exists(&self) -> bool {
        !matches!(self, Lookup::Missing)
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Lookup::Deleted(_))
    }

    /// Returns the original URL if the record exists, deleted or not.
    pub fn original_url(&self) -> Option<&str> {
        match self {
            Lookup::Live(url) | Lookup::Deleted(url) => Some(url),
            Lookup::Missing => None,
        }
    }

    /// Converts the lookup into the URL to redirect to.
    ///
    /// Missing and deleted records become [`StorageError::NotFound`] and
    /// [`StorageError::Deleted`] respectively.
    pub fn into_live(self, short_id: &str) -> crate::Result<String> {
        match self {
            Lookup::Live(url) => Ok(url),
            Lookup::Deleted(_) => Err(crate::StorageError::Deleted(short_id.to_owned())),
            Lookup::Missing => Err(crate::StorageError::NotFound(short_id.to_owned())),
        }
    }
}

/// Aggregate counts over every record, tombstones included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Number of short ids stored.
    pub urls: usize,
    /// Number of distinct owners across all records.
    pub users: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;

    #[test]
    fn live_record_lookup() {
        let record = Record::new("https://example.com", "u1");
        let lookup = record.lookup();

        assert!(lookup.exists());
        assert!(!lookup.is_deleted());
        assert_eq!(lookup.original_url(), Some("https://example.com"));
        assert_eq!(lookup.into_live("abc").unwrap(), "https://example.com");
    }

    #[test]
    fn deleted_record_keeps_url_but_does_not_resolve() {
        let mut record = Record::new("https://example.com", "u1");
        record.deleted = true;
        let lookup = record.lookup();

        assert!(lookup.exists());
        assert!(lookup.is_deleted());
        assert_eq!(lookup.original_url(), Some("https://example.com"));
        assert_eq!(
            lookup.into_live("abc").unwrap_err(),
            StorageError::Deleted("abc".to_string())
        );
    }

    #[test]
    fn missing_lookup() {
        let lookup = Lookup::Missing;

        assert!(!lookup.exists());
        assert!(!lookup.is_deleted());
        assert_eq!(lookup.original_url(), None);
        assert_eq!(
            lookup.into_live("nope").unwrap_err(),
            StorageError::NotFound("nope".to_string())
        );
    }
}
