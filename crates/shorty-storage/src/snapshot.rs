//! Line-delimited JSON snapshot format.
//!
//! Each line holds one object:
//!
//! ```json
//! {"uuid":"<opaque-id>","short_url":"<id>","original_url":"<url>","user_id":"<owner>"}
//! ```
//!
//! Older files store the same objects as a single JSON array. Decoding tries
//! the array form first, then falls back to reading line by line and
//! skipping lines that do not parse.

use crate::error::SnapshotError;
use serde::{Deserialize, Serialize};
use shorty_core::SYSTEM_OWNER;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, error, warn, Level};
use uuid::Uuid;

/// One persisted mapping as it appears on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Write-time artifact, regenerated on every encode.
    pub uuid: String,
    pub short_url: String,
    pub original_url: String,
    pub user_id: String,
}

impl SnapshotRecord {
    fn system(short_url: &str, original_url: &str) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            short_url: short_url.to_owned(),
            original_url: original_url.to_owned(),
            user_id: SYSTEM_OWNER.to_owned(),
        }
    }
}

/// Encodes `(short id, original url)` pairs as newline-delimited JSON.
pub fn encode<'a, I>(entries: I) -> Result<Vec<u8>, SnapshotError>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut out = Vec::new();
    for (short_url, original_url) in entries {
        serde_json::to_writer(&mut out, &SnapshotRecord::system(short_url, original_url))?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Decodes a snapshot in either the array or the line-delimited form.
///
/// Never fails: unparseable lines are skipped. Later records win when a
/// short id appears more than once.
pub fn decode(data: &[u8]) -> HashMap<String, String> {
    if let Ok(records) = serde_json::from_slice::<Vec<SnapshotRecord>>(data) {
        debug!(records = records.len(), "decoded legacy array snapshot");
        return into_entries(records);
    }

    let (records, skipped) = decode_lines(data);
    match skipped_severity(records.len(), skipped) {
        Some(level) if level == Level::ERROR => error!(
            skipped,
            "no snapshot record could be decoded, starting from an empty store"
        ),
        Some(_) => warn!(skipped, "skipped unparseable snapshot lines"),
        None => {}
    }
    into_entries(records)
}

/// Parses one record per non-blank line, counting the lines that fail.
fn decode_lines(data: &[u8]) -> (Vec<SnapshotRecord>, usize) {
    let mut skipped = 0usize;
    let records: Vec<SnapshotRecord> = data
        .split(|b| *b == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .filter_map(|line| match serde_json::from_slice(line) {
            Ok(record) => Some(record),
            Err(_) => {
                skipped += 1;
                None
            }
        })
        .collect();
    (records, skipped)
}

/// A file where every line failed to parse loses the whole store, which is
/// worse than a few bad lines.
fn skipped_severity(decoded: usize, skipped: usize) -> Option<Level> {
    match (decoded, skipped) {
        (_, 0) => None,
        (0, _) => Some(Level::ERROR),
        _ => Some(Level::WARN),
    }
}

fn into_entries(records: Vec<SnapshotRecord>) -> HashMap<String, String> {
    records
        .into_iter()
        .map(|record| (record.short_url, record.original_url))
        .collect()
}

/// Reads and decodes the snapshot at `path`.
///
/// A missing file is an empty snapshot, not an error.
pub async fn load(path: &Path) -> Result<HashMap<String, String>, SnapshotError> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(decode(&data)),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no snapshot file, starting empty");
            Ok(HashMap::new())
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn encode_writes_one_object_per_line() {
        let data = encode(&entries(&[("abc", "https://a.com"), ("def", "https://d.com")])).unwrap();
        let text = String::from_utf8(data).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(text.ends_with('\n'));
        for line in lines {
            let record: SnapshotRecord = serde_json::from_str(line).unwrap();
            assert_eq!(record.user_id, SYSTEM_OWNER);
            assert_eq!(record.uuid.len(), 36);
        }
    }

    #[test]
    fn encode_then_decode_restores_entries() {
        let original = entries(&[
            ("abc", "https://a.com"),
            ("def", "https://d.com/path?q=1"),
            ("ghi", "https://example.com/\"quoted\""),
        ]);

        let decoded = decode(&encode(&original).unwrap());

        assert_eq!(decoded, original);
    }

    #[test]
    fn encode_generates_fresh_uuids() {
        let original = entries(&[("abc", "https://a.com")]);

        let first = encode(&original).unwrap();
        let second = encode(&original).unwrap();

        assert_ne!(first, second);
        assert_eq!(decode(&first), decode(&second));
    }

    #[test]
    fn decode_legacy_array() {
        let data = br#"[
            {"uuid":"1","short_url":"short1","original_url":"https://example.com","user_id":"user1"},
            {"uuid":"2","short_url":"short2","original_url":"https://google.com","user_id":"user2"}
        ]"#;

        assert_eq!(
            decode(data),
            entries(&[("short1", "https://example.com"), ("short2", "https://google.com")])
        );
    }

    #[test]
    fn decode_lines() {
        let data = b"{\"uuid\":\"1\",\"short_url\":\"short1\",\"original_url\":\"https://example.com\",\"user_id\":\"user1\"}\n\
{\"uuid\":\"2\",\"short_url\":\"short2\",\"original_url\":\"https://google.com\",\"user_id\":\"user2\"}";

        assert_eq!(
            decode(data),
            entries(&[("short1", "https://example.com"), ("short2", "https://google.com")])
        );
    }

    #[test]
    fn decode_skips_garbage_lines() {
        let data = b"{\"uuid\":\"1\",\"short_url\":\"short1\",\"original_url\":\"https://example.com\",\"user_id\":\"user1\"}\n\
invalid json line\n\
\n\
{\"uuid\":\"2\",\"short_url\":\"short2\",\"original_url\":\"https://google.com\",\"user_id\":\"user2\"}\n\
{\"uuid\":\"3\",\"short_url\":\"trunc";

        assert_eq!(
            decode(data),
            entries(&[("short1", "https://example.com"), ("short2", "https://google.com")])
        );
    }

    #[test]
    fn broken_legacy_array_decodes_nothing_and_is_an_error() {
        let data = br#"[
            {"uuid":"1","short_url":"short1","original_url":"https://example.com","user_id":"user1"},
            {"uuid":"2","short_url":"short2","original_url":
        ]"#;

        let (records, skipped) = super::decode_lines(data);

        assert!(records.is_empty());
        assert_eq!(skipped, 4);
        assert_eq!(skipped_severity(records.len(), skipped), Some(Level::ERROR));
        assert!(decode(data).is_empty());
    }

    #[test]
    fn some_bad_lines_are_a_warning() {
        assert_eq!(skipped_severity(3, 1), Some(Level::WARN));
        assert_eq!(skipped_severity(3, 0), None);
        assert_eq!(skipped_severity(0, 0), None);
    }

    #[test]
    fn decode_empty_input() {
        assert!(decode(b"").is_empty());
        assert!(decode(b"\n\n").is_empty());
        assert!(decode(b"[]").is_empty());
    }

    #[tokio::test]
    async fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();

        let loaded = load(&dir.path().join("absent.json")).await.unwrap();

        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn load_reads_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.json");
        let original = entries(&[("abc", "https://a.com")]);
        std::fs::write(&path, encode(&original).unwrap()).unwrap();

        assert_eq!(load(&path).await.unwrap(), original);
    }
}
