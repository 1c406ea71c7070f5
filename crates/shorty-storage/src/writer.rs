//! Batched, asynchronous snapshot persistence.
//!
//! Mutations are mirrored into a pending buffer that a background ticker
//! (or an explicit [`BatchWriter::flush`]) drains into the snapshot file.
//! Every flush writes `<target>.tmp` and renames it over the target, so the
//! target is always either the previous complete snapshot or the new one.

use crate::error::SnapshotError;
use crate::snapshot;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use typed_builder::TypedBuilder;

/// Default interval between background flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Configures a [`BatchWriter`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct WriterSettings {
    /// The snapshot file to maintain.
    #[builder(setter(into))]
    pub path: PathBuf,
    /// How often pending writes are flushed in the background.
    #[builder(default = DEFAULT_FLUSH_INTERVAL)]
    pub flush_interval: Duration,
}

/// Accumulates pending writes and flushes them to one snapshot file.
///
/// The writer remembers what it has already persisted (seeded from the file
/// when it was opened) so each flush rewrites the complete set. When a flush
/// fails, the entries taken for it are dropped rather than requeued.
#[derive(Debug)]
pub struct BatchWriter {
    path: PathBuf,
    tmp_path: PathBuf,
    pending: Mutex<HashMap<String, String>>,
    // Held for the whole flush, which also serializes concurrent flushes.
    persisted: tokio::sync::Mutex<HashMap<String, String>>,
    shutdown_tx: watch::Sender<bool>,
}

impl BatchWriter {
    /// Creates a writer seeded with `persisted` and starts its ticker.
    ///
    /// Must be called from within a tokio runtime.
    fn start(settings: WriterSettings, persisted: HashMap<String, String>) -> Arc<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let writer = Arc::new(Self {
            tmp_path: tmp_path_for(&settings.path),
            path: settings.path,
            pending: Mutex::new(HashMap::new()),
            persisted: tokio::sync::Mutex::new(persisted),
            shutdown_tx,
        });

        tokio::spawn(flush_loop(
            Arc::downgrade(&writer),
            settings.flush_interval,
            shutdown_rx,
        ));

        info!(
            path = %writer.path.display(),
            flush_interval_ms = settings.flush_interval.as_millis() as u64,
            "snapshot writer started"
        );
        writer
    }

    /// The snapshot file this writer maintains.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queues one mapping for the next flush.
    pub fn record(&self, short_id: &str, original_url: &str) {
        self.pending
            .lock()
            .insert(short_id.to_owned(), original_url.to_owned());
    }

    /// Queues every mapping of a batch for the next flush.
    pub fn record_many(&self, entries: &HashMap<String, String>) {
        let mut pending = self.pending.lock();
        pending.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Whether [`close`](BatchWriter::close) has stopped the ticker.
    pub fn is_closed(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Number of mappings waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Everything this writer knows about: persisted entries overlaid with
    /// pending ones.
    pub async fn entries(&self) -> HashMap<String, String> {
        let mut all = self.persisted.lock().await.clone();
        all.extend(
            self.pending
                .lock()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        all
    }

    /// Writes pending mappings to disk now.
    ///
    /// Returns the number of pending mappings flushed; zero means nothing was
    /// pending and the file was left untouched. Failures are logged here
    /// with the size of the lost batch before being returned.
    pub async fn flush(&self) -> Result<usize, SnapshotError> {
        let mut persisted = self.persisted.lock().await;
        let taken = std::mem::take(&mut *self.pending.lock());
        if taken.is_empty() {
            return Ok(0);
        }

        let batch = taken.len();
        let entries = persisted
            .iter()
            .filter(|(short_id, _)| !taken.contains_key(*short_id))
            .chain(taken.iter());

        let written = self.write_atomically(entries).await;
        match written {
            Ok(()) => {
                persisted.extend(taken);
                debug!(
                    path = %self.path.display(),
                    batch,
                    total = persisted.len(),
                    "snapshot flushed"
                );
                Ok(batch)
            }
            Err(err) => {
                error!(
                    path = %self.path.display(),
                    lost = batch,
                    error = %err,
                    "snapshot flush failed, pending entries dropped"
                );
                Err(err)
            }
        }
    }

    /// Stops the background ticker and performs a final flush.
    pub async fn close(&self) -> Result<usize, SnapshotError> {
        let _ = self.shutdown_tx.send(true);
        let flushed = self.flush().await?;
        info!(path = %self.path.display(), flushed, "snapshot writer closed");
        Ok(flushed)
    }

    async fn write_atomically<'a, I>(&self, entries: I) -> Result<(), SnapshotError>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let data = snapshot::encode(entries)?;

        let written = async {
            let mut file = tokio::fs::File::create(&self.tmp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&self.tmp_path, &self.path).await
        }
        .await;

        if written.is_err() {
            let _ = tokio::fs::remove_file(&self.tmp_path).await;
        }
        Ok(written?)
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

async fn flush_loop(
    writer: Weak<BatchWriter>,
    flush_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("snapshot writer received shutdown signal");
                    return;
                }
            }
        }

        let Some(writer) = writer.upgrade() else {
            return;
        };
        // Errors are logged by `flush`.
        let _ = writer.flush().await;
    }
}

/// Hands out at most one [`BatchWriter`] per snapshot path.
///
/// Two writers renaming over the same file would lose each other's pending
/// entries, so every backend instance that persists to a path must get its
/// writer from the same registry. The registry is created once by the
/// composition root and passed to whatever opens storage.
#[derive(Debug, Default)]
pub struct WriterRegistry {
    writers: Mutex<HashMap<PathBuf, Arc<BatchWriter>>>,
}

impl WriterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the writer for `settings.path`, starting it on first use.
    ///
    /// A newly started writer is seeded with the snapshot currently on disk.
    /// A closed writer is replaced by a new one. Settings other than the path
    /// are ignored when a running writer already exists.
    pub async fn open(&self, settings: WriterSettings) -> Result<Arc<BatchWriter>, SnapshotError> {
        if let Some(writer) = self.get(&settings.path) {
            return Ok(writer);
        }

        let persisted = snapshot::load(&settings.path).await?;

        let mut writers = self.writers.lock();
        if let Some(writer) = writers.get(&settings.path).filter(|w| !w.is_closed()) {
            return Ok(Arc::clone(writer));
        }
        let writer = BatchWriter::start(settings, persisted);
        writers.insert(writer.path.clone(), Arc::clone(&writer));
        Ok(writer)
    }

    /// Returns the running writer for `path` if one has been opened.
    pub fn get(&self, path: &Path) -> Option<Arc<BatchWriter>> {
        self.writers
            .lock()
            .get(path)
            .filter(|writer| !writer.is_closed())
            .cloned()
    }

    /// Closes every writer, flushing what is pending.
    ///
    /// Returns the first error after attempting all writers.
    pub async fn close_all(&self) -> Result<(), SnapshotError> {
        let writers: Vec<Arc<BatchWriter>> = self.writers.lock().values().cloned().collect();
        let mut first_error = None;
        for writer in writers {
            if let Err(err) = writer.close().await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
