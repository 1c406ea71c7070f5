use crate::error::{Result, ShortenerError};
use crate::generator::Generator;
use shorty_core::{Stats, Storage, StorageError};
use std::sync::Arc;
use tracing::{debug, info};

/// Attempts made to find an unused short id before giving up.
pub const MAX_ATTEMPTS: usize = 8;

/// Outcome of shortening a single URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortened {
    pub short_url: String,
    /// The URL had already been shortened; `short_url` is the existing one.
    pub already_existed: bool,
}

/// One URL of a batch request, tagged by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub correlation_id: String,
    pub original_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub correlation_id: String,
    pub short_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUrl {
    pub short_url: String,
    pub original_url: String,
}

/// Shortening operations on top of any [`Storage`] backend.
///
/// The service validates input, deduplicates URLs, generates short
/// ids and builds full short URLs from `base_url`. It holds no state of its
/// own beyond the generator.
pub struct ShortenerService<S: ?Sized, G> {
    storage: Arc<S>,
    generator: G,
    base_url: String,
}

impl<S: Storage + ?Sized, G: Generator> ShortenerService<S, G> {
    pub fn new(storage: Arc<S>, generator: G, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            storage,
            generator,
            base_url,
        }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Builds the full short URL for `short_id`.
    pub fn short_url(&self, short_id: &str) -> String {
        format!("{}/{}", self.base_url, short_id)
    }

    /// Validates that the URL has a valid format (has a scheme and host).
    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ShortenerError::InvalidUrl("URL cannot be empty".to_string()));
        }

        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {url}"
            )));
        };
        if scheme.is_empty() || rest.is_empty() {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {url}"
            )));
        }

        let scheme = scheme.to_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL scheme must be http or https: {scheme}"
            )));
        }

        Ok(())
    }

    /// Shortens `original_url` on behalf of `owner_id`.
    ///
    /// A URL that already has a live short id is not stored again; its
    /// existing short URL comes back with `already_existed` set. New records
    /// are flushed to the snapshot inline when the backend has one.
    pub async fn shorten(&self, original_url: &str, owner_id: &str) -> Result<Shortened> {
        Self::validate_url(original_url)?;

        let (short_id, already_existed) = self.place(original_url, owner_id).await?;
        if !already_existed {
            self.storage.flush().await?;
            info!(short_id = %short_id, owner_id, "shortened url");
        }

        Ok(Shortened {
            short_url: self.short_url(&short_id),
            already_existed,
        })
    }

    /// Finds or creates the short id for `original_url`.
    ///
    /// New ids go through the conditional insert, so an id already in the
    /// store is never overwritten. Returns the id and whether it existed.
    async fn place(&self, original_url: &str, owner_id: &str) -> Result<(String, bool)> {
        if let Some(existing) = self.storage.find_short_id(original_url).await? {
            debug!(short_id = %existing, "url already shortened");
            return Ok((existing, true));
        }

        for _ in 0..MAX_ATTEMPTS {
            let candidate = self.generator.generate();

            match self.storage.insert(&candidate, original_url, owner_id).await {
                Ok(()) => return Ok((candidate, false)),
                // Somebody shortened the same URL since the dedup check.
                Err(StorageError::AlreadyExists { short_id }) if short_id != candidate => {
                    debug!(short_id = %short_id, "url already shortened");
                    return Ok((short_id, true));
                }
                Err(StorageError::AlreadyExists { .. }) => {
                    debug!(short_id = %candidate, "short id taken, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ShortenerError::IdsExhausted(MAX_ATTEMPTS))
    }

    /// Shortens every item of a batch.
    ///
    /// Results keep the order and correlation ids of the request. URLs that
    /// already have a live short id, in the store or earlier in the batch,
    /// reuse it, so the outcome is the same on every backend.
    pub async fn shorten_batch(
        &self,
        items: &[BatchItem],
        owner_id: &str,
    ) -> Result<Vec<BatchResult>> {
        if items.is_empty() {
            return Err(ShortenerError::EmptyBatch);
        }
        for item in items {
            Self::validate_url(&item.original_url)?;
        }

        let mut created = 0usize;
        let mut results = Vec::with_capacity(items.len());

        for item in items {
            let (short_id, already_existed) = self.place(&item.original_url, owner_id).await?;
            if !already_existed {
                created += 1;
            }
            results.push(BatchResult {
                correlation_id: item.correlation_id.clone(),
                short_url: self.short_url(&short_id),
            });
        }

        if created > 0 {
            self.storage.flush().await?;
        }
        info!(items = items.len(), created, owner_id, "shortened batch");
        Ok(results)
    }

    /// Returns the URL `short_id` redirects to.
    pub async fn resolve(&self, short_id: &str) -> Result<String> {
        let lookup = self.storage.get(short_id).await?;
        Ok(lookup.into_live(short_id)?)
    }

    /// Lists the live URLs created by `owner_id`, ordered by short id.
    pub async fn user_urls(&self, owner_id: &str) -> Result<Vec<UserUrl>> {
        if owner_id.is_empty() {
            return Err(ShortenerError::MissingOwner);
        }

        let mut urls: Vec<(String, String)> =
            self.storage.list_by_owner(owner_id).await?.into_iter().collect();
        urls.sort_unstable();

        Ok(urls
            .into_iter()
            .map(|(short_id, original_url)| UserUrl {
                short_url: self.short_url(&short_id),
                original_url,
            })
            .collect())
    }

    /// Soft-deletes the given ids. Ids owned by somebody else are skipped.
    pub async fn delete_user_urls(&self, short_ids: &[String], owner_id: &str) -> Result<()> {
        if owner_id.is_empty() {
            return Err(ShortenerError::MissingOwner);
        }

        self.storage.soft_delete(short_ids, owner_id).await?;
        info!(requested = short_ids.len(), owner_id, "deleted urls");
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        Ok(self.storage.ping().await?)
    }

    pub async fn stats(&self) -> Result<Stats> {
        Ok(self.storage.stats().await?)
    }
}
