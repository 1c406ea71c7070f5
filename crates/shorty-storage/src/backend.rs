use crate::file::FileStorage;
use crate::memory::InMemoryStorage;
use crate::postgres::PostgresStorage;
use crate::writer::{WriterRegistry, WriterSettings, DEFAULT_FLUSH_INTERVAL};
use shorty_core::{Result, Storage};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use typed_builder::TypedBuilder;

/// Selects and configures the storage backend at startup.
///
/// A database DSN takes precedence over a snapshot path; with neither, the
/// store lives only in memory. Empty values count as unset.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct StorageSettings {
    #[builder(default, setter(strip_option, into))]
    pub file_storage_path: Option<PathBuf>,
    #[builder(default, setter(strip_option, into))]
    pub database_dsn: Option<String>,
    #[builder(default = DEFAULT_FLUSH_INTERVAL)]
    pub flush_interval: Duration,
    #[builder(default = 10)]
    pub max_connections: u32,
}

impl StorageSettings {
    fn dsn(&self) -> Option<&str> {
        self.database_dsn.as_deref().filter(|dsn| !dsn.is_empty())
    }

    fn snapshot_path(&self) -> Option<&PathBuf> {
        self.file_storage_path
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

/// Opens the backend described by `settings`.
///
/// Snapshot-backed stores obtain their writer from `registry`, which the
/// caller owns for the lifetime of the process.
pub async fn open_storage(
    settings: &StorageSettings,
    registry: &WriterRegistry,
) -> Result<Arc<dyn Storage>> {
    if let Some(dsn) = settings.dsn() {
        info!(backend = "postgres", "opening storage");
        let storage = PostgresStorage::connect(dsn, settings.max_connections).await?;
        return Ok(Arc::new(storage));
    }

    if let Some(path) = settings.snapshot_path() {
        info!(backend = "file", path = %path.display(), "opening storage");
        let writer_settings = WriterSettings::builder()
            .path(path.clone())
            .flush_interval(settings.flush_interval)
            .build();
        let storage = FileStorage::open(writer_settings, registry).await?;
        return Ok(Arc::new(storage));
    }

    info!(backend = "memory", "opening storage");
    Ok(Arc::new(InMemoryStorage::new()))
}
