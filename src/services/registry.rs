//! Picture hash registry.
//!
//! Keeps the set of known signature-image hashes in step with the pictures
//! directory. The directory's modification time, formatted as a `YmdHis`
//! watermark, decides whether the stored set is stale. A refresh rebuilds the
//! whole set: every regular file of the directory plus the documents the host
//! flagged as blacklisted.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use super::hasher::FileHasher;
use crate::Result;
use crate::models::{HashRecord, RegistryStats, Watermark};
use crate::storage::{BlacklistSource, HashStore};

/// What a refresh did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The directory has not changed since the stored watermark.
    Unchanged {
        /// Stored watermark.
        watermark: Watermark,
    },
    /// The registry was rebuilt.
    Refreshed {
        /// Hashes computed from the pictures directory.
        files: usize,
        /// Pairs taken from blacklisted documents.
        blacklisted: usize,
        /// New watermark.
        watermark: Watermark,
    },
    /// The pictures directory cannot be read; the registry was left as is.
    DirectoryUnavailable,
}

impl RefreshOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Unchanged { .. } => "unchanged",
            Self::Refreshed { .. } => "refreshed",
            Self::DirectoryUnavailable => "directory_unavailable",
        }
    }
}

/// Known nuisance-file hashes backed by a [`HashStore`].
pub struct HashRegistry {
    store: Arc<dyn HashStore>,
    blacklist: Arc<dyn BlacklistSource>,
    pictures_dir: PathBuf,
}

impl HashRegistry {
    /// Creates a registry watching `pictures_dir`.
    #[must_use]
    pub fn new(
        store: Arc<dyn HashStore>,
        blacklist: Arc<dyn BlacklistSource>,
        pictures_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            blacklist,
            pictures_dir: pictures_dir.into(),
        }
    }

    /// Watched directory.
    #[must_use]
    pub fn pictures_dir(&self) -> &Path {
        &self.pictures_dir
    }

    /// Rebuilds the registry if the directory changed since the last build.
    ///
    /// Comparison is strict: an equal watermark means nothing to do.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if the store or the blacklist source
    /// fails. A failed rebuild leaves the previous set in place.
    #[instrument(skip(self), fields(pictures_dir = %self.pictures_dir.display()))]
    pub fn refresh_if_stale(&self) -> Result<RefreshOutcome> {
        let Some(candidate) = self.directory_watermark() else {
            return Ok(Self::finish(RefreshOutcome::DirectoryUnavailable));
        };
        let stored = self.store.watermark()?;
        if !candidate.is_newer_than(stored.as_ref()) {
            debug!(watermark = %candidate, "Picture registry is current");
            return Ok(Self::finish(RefreshOutcome::Unchanged {
                watermark: stored.unwrap_or(candidate),
            }));
        }
        self.repopulate(candidate).map(Self::finish)
    }

    /// Rebuilds the registry regardless of the watermark.
    ///
    /// # Errors
    ///
    /// Same as [`Self::refresh_if_stale`].
    #[instrument(skip(self), fields(pictures_dir = %self.pictures_dir.display()))]
    pub fn force_refresh(&self) -> Result<RefreshOutcome> {
        let Some(candidate) = self.directory_watermark() else {
            return Ok(Self::finish(RefreshOutcome::DirectoryUnavailable));
        };
        self.repopulate(candidate).map(Self::finish)
    }

    /// Returns true if `hash` is registered.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if the store cannot be read.
    pub fn is_known(&self, hash: &str) -> Result<bool> {
        self.store.contains(hash)
    }

    /// One consistent snapshot of every registered hash.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if the store cannot be read.
    pub fn known_hashes(&self) -> Result<HashSet<String>> {
        self.store.all_hashes()
    }

    /// Record count and watermark.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if the store cannot be read.
    pub fn stats(&self) -> Result<RegistryStats> {
        Ok(RegistryStats {
            records: self.store.count()?,
            watermark: self.store.watermark()?,
        })
    }

    fn finish(outcome: RefreshOutcome) -> RefreshOutcome {
        metrics::counter!(
            "ticketcleaner_registry_refreshes_total",
            "outcome" => outcome.label()
        )
        .increment(1);
        outcome
    }

    /// Current watermark of the directory, or `None` when it cannot be read.
    fn directory_watermark(&self) -> Option<Watermark> {
        match fs::metadata(&self.pictures_dir).and_then(|m| m.modified()) {
            Ok(mtime) => Some(Watermark::from_system_time(mtime)),
            Err(e) => {
                warn!(
                    pictures_dir = %self.pictures_dir.display(),
                    error = %e,
                    "Pictures directory unavailable, registry not refreshed"
                );
                None
            },
        }
    }

    fn repopulate(&self, watermark: Watermark) -> Result<RefreshOutcome> {
        let start = Instant::now();
        let Some(mut records) = self.scan_directory() else {
            return Ok(RefreshOutcome::DirectoryUnavailable);
        };
        let files = records.len();

        let blacklisted = self.blacklist.blacklisted_documents()?;
        let blacklisted_count = blacklisted.len();
        records.extend(blacklisted);

        self.store.replace_all(&records, &watermark)?;

        if files == 0 {
            info!(pictures_dir = %self.pictures_dir.display(), "No files in pictures directory");
        }
        info!(
            files,
            blacklisted = blacklisted_count,
            watermark = %watermark,
            elapsed_ms = start.elapsed().as_millis(),
            "Picture hashes loaded"
        );
        Ok(RefreshOutcome::Refreshed {
            files,
            blacklisted: blacklisted_count,
            watermark,
        })
    }

    /// Hashes every regular file of the directory, sorted by file name.
    ///
    /// Unreadable entries are skipped. Returns `None` if the directory itself
    /// cannot be listed.
    fn scan_directory(&self) -> Option<Vec<HashRecord>> {
        let entries = match fs::read_dir(&self.pictures_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    pictures_dir = %self.pictures_dir.display(),
                    error = %e,
                    "Cannot list pictures directory"
                );
                return None;
            },
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let records = paths
            .iter()
            .filter_map(|path| {
                let filename = path.file_name()?.to_string_lossy().into_owned();
                match FileHasher::hash_file(path) {
                    Ok(hash) => Some(HashRecord::new(hash, filename)),
                    Err(e) => {
                        warn!(file = %filename, error = %e, "Skipping unreadable picture");
                        None
                    },
                }
            })
            .collect();
        Some(records)
    }
}
