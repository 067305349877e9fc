//! Lifecycle adapter running the cleaner services.

use std::sync::Arc;

use tracing::{info, instrument};

use super::{HookEvent, LifecycleHooks};
use crate::Result;
use crate::config::CleanerConfig;
use crate::models::MutatingRecord;
use crate::services::{AttachmentDeduper, HashRegistry, TicketCleaner};
use crate::storage::SqliteStore;

/// Runs text filters on every event and attachment dedup on creation.
pub struct CleanerHooks {
    cleaner: TicketCleaner,
    deduper: AttachmentDeduper,
}

impl CleanerHooks {
    /// Creates hooks from already wired services.
    #[must_use]
    pub const fn new(cleaner: TicketCleaner, deduper: AttachmentDeduper) -> Self {
        Self { cleaner, deduper }
    }

    /// Opens the configured database and wires every service onto it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if the database cannot be opened.
    pub fn from_config(config: &CleanerConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(config.db_path())?);
        let registry = HashRegistry::new(store.clone(), store.clone(), config.pictures_dir());
        let deduper = AttachmentDeduper::new(Arc::new(registry), config.staging_dir());
        Ok(Self::new(TicketCleaner::new(store), deduper))
    }

    #[instrument(skip(self, record), fields(hook = event.as_str()))]
    fn run(&self, event: HookEvent, record: &MutatingRecord) -> Result<MutatingRecord> {
        let text = self.cleaner.clean_text(record);
        if !event.is_create() {
            return Ok(text.record);
        }

        let (cleaned, report) = self.deduper.dedupe(&text.record)?;
        if let Some(report) = report.filter(|r| r.deleted_count() > 0) {
            info!(
                ticket = %report.title,
                discarded = report.deleted_count(),
                "Signature images discarded"
            );
        }
        Ok(cleaned)
    }
}

impl LifecycleHooks for CleanerHooks {
    fn on_before_create(&self, record: &MutatingRecord) -> Result<MutatingRecord> {
        self.run(HookEvent::BeforeCreate, record)
    }

    fn on_before_create_followup(&self, record: &MutatingRecord) -> Result<MutatingRecord> {
        self.run(HookEvent::BeforeCreateFollowup, record)
    }

    fn on_before_update(&self, record: &MutatingRecord) -> Result<MutatingRecord> {
        self.run(HookEvent::BeforeUpdate, record)
    }

    fn on_before_update_followup(&self, record: &MutatingRecord) -> Result<MutatingRecord> {
        self.run(HookEvent::BeforeUpdateFollowup, record)
    }
}
