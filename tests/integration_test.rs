//! End-to-end tests against a SQLite database file.
//!
//! Covers:
//! - Schema install and uninstall
//! - Filters stored through the CLI path and applied by the hooks
//! - Picture registry refresh from a directory and from blacklisted documents
//! - Attachment dedup on creation only

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use tempfile::TempDir;
use ticketcleaner::hooks::{HookHandler, RecordHookHandler};
use ticketcleaner::models::NewFilter;
use ticketcleaner::services::{FileHasher, RefreshOutcome};
use ticketcleaner::storage::SqliteStore;
use ticketcleaner::{
    CleanerConfig, CleanerHooks, FilterStore, FilterType, HashRegistry, HashStore, HookEvent,
    LifecycleHooks, MutatingRecord,
};

const LOGO: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRcompany-logo";
const PHOTO: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRbroken-printer";
const FOOTER: &[u8] = b"GIF89a-footer-banner";
const PDF: &[u8] = b"%PDF-1.7\ninvoice";

// ============================================================================
// Test Helpers
// ============================================================================

struct Env {
    dir: TempDir,
    config: CleanerConfig,
}

impl Env {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = CleanerConfig::new().with_data_dir(dir.path());
        std::fs::create_dir_all(config.pictures_dir()).unwrap();
        std::fs::create_dir_all(config.staging_dir()).unwrap();
        Self { dir, config }
    }

    fn store(&self) -> Arc<SqliteStore> {
        let store = SqliteStore::open(self.config.db_path()).unwrap();
        store.install().unwrap();
        Arc::new(store)
    }

    fn registry(&self, store: &Arc<SqliteStore>) -> HashRegistry {
        HashRegistry::new(store.clone(), store.clone(), self.config.pictures_dir())
    }

    fn add_picture(&self, name: &str, data: &[u8]) {
        std::fs::write(self.config.pictures_dir().join(name), data).unwrap();
    }

    fn stage(&self, name: &str, data: &[u8]) {
        std::fs::write(self.config.staging_dir().join(name), data).unwrap();
    }

    fn staged(&self, name: &str) -> bool {
        self.config.staging_dir().join(name).exists()
    }

    fn add_filter(
        &self,
        store: &SqliteStore,
        filter_type: FilterType,
        order: i64,
        regex: &str,
        replacement: &str,
    ) -> i64 {
        store
            .insert_filter(&NewFilter {
                name: format!("{filter_type}-{order}"),
                filter_type,
                order: Some(order),
                regex: regex.to_string(),
                replacement: replacement.to_string(),
                is_active: true,
                comment: None,
            })
            .unwrap()
            .id
    }

    fn blacklist_document(&self, sha1sum: &str, filename: &str) {
        let conn = Connection::open(self.config.db_path()).unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY,
                filename TEXT,
                sha1sum TEXT,
                is_blacklisted INTEGER NOT NULL DEFAULT 0
            )",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO documents (filename, sha1sum, is_blacklisted) VALUES (?1, ?2, 1)",
            [filename, sha1sum],
        )
        .unwrap();
    }

    fn hooks(&self) -> CleanerHooks {
        CleanerHooks::from_config(&self.config).unwrap()
    }
}

fn mail_ticket(content: &str, files: &[&str], tags: &[&str]) -> MutatingRecord {
    MutatingRecord::new()
        .with_name("Printer on fire")
        .with_content(content)
        .via_mailgate(3)
        .with_attachments(files.iter().copied(), tags.iter().copied())
}

fn touch_later(path: &Path) {
    let later = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
    std::fs::File::open(path)
        .and_then(|f| f.set_modified(later))
        .unwrap();
}

// ============================================================================
// Schema
// ============================================================================

#[test]
fn test_uninstall_keeps_filters() {
    let env = Env::new();
    let store = env.store();
    env.add_filter(&store, FilterType::BodyContent, 1, "/x/", "");
    env.add_picture("logo.png", LOGO);
    env.registry(&store).refresh_if_stale().unwrap();

    store.uninstall().unwrap();
    assert_eq!(store.list_filters().unwrap().len(), 1);
    assert!(store.count().is_err());

    store.install().unwrap();
    assert_eq!(store.count().unwrap(), 0);
    assert_eq!(store.list_filters().unwrap().len(), 1);
}

#[test]
fn test_install_is_repeatable() {
    let env = Env::new();
    let store = env.store();
    let id = env.add_filter(&store, FilterType::Title, 1, "/^RE: /", "");

    let report = store.install().unwrap();
    assert!(!report.legacy_backed_up);
    assert!(!report.columns_upgraded);
    assert_eq!(store.list_filters().unwrap()[0].id, id);
}

// ============================================================================
// Text filters
// ============================================================================

#[test]
fn test_best_regards_through_hooks() {
    let env = Env::new();
    let store = env.store();
    env.add_filter(&store, FilterType::BodyContent, 1, "/Best regards.*/s", "");

    let record = MutatingRecord::new().with_content("Hello\nBest regards\nJohn");
    let cleaned = env.hooks().on_before_update(&record).unwrap();
    assert_eq!(cleaned.content.as_deref(), Some("Hello\n"));
}

#[test]
fn test_stored_entities_round_trip() {
    let env = Env::new();
    let store = env.store();
    env.add_filter(&store, FilterType::BodyContent, 1, "#<p>--&nbsp;</p>.*#s", "");

    let record = MutatingRecord::new()
        .with_content("&lt;p&gt;Hi&lt;/p&gt;&lt;p&gt;--&amp;nbsp;&lt;/p&gt;&lt;p&gt;John&lt;/p&gt;");
    let cleaned = env.hooks().on_before_update(&record).unwrap();
    assert_eq!(cleaned.content.as_deref(), Some("&#60;p&#62;Hi&#60;/p&#62;"));
}

#[test]
fn test_order_decides_output() {
    let env = Env::new();
    let store = env.store();
    let broad = env.add_filter(&store, FilterType::BodyContent, 1, "/foo.*/", "");
    env.add_filter(&store, FilterType::BodyContent, 2, "/foobar/", "baz");

    let record = MutatingRecord::new().with_content("foobar!");
    assert_eq!(
        env.hooks().on_before_update(&record).unwrap().content.as_deref(),
        Some("")
    );

    store.set_active(broad, false).unwrap();
    env.add_filter(&store, FilterType::BodyContent, 3, "/foo.*/", "");
    assert_eq!(
        env.hooks().on_before_update(&record).unwrap().content.as_deref(),
        Some("baz!")
    );
}

#[test]
fn test_signature_block_between_markers() {
    let env = Env::new();
    let store = env.store();
    env.add_filter(&store, FilterType::SignatureStart, 1, "/^-- $/m", "[signature removed]");
    env.add_filter(&store, FilterType::SignatureEnd, 1, "/^www\\.\\S+$/m", "");

    let record = MutatingRecord::new()
        .with_content("Broken again.\n-- \nJane Roe\nACME\nwww.acme.test\nSent via mail");
    let cleaned = env.hooks().on_before_update_followup(&record).unwrap();
    assert_eq!(
        cleaned.content.as_deref(),
        Some("Broken again.\n[signature removed]\nSent via mail")
    );
}

#[test]
fn test_broken_filter_does_not_block_save() {
    let env = Env::new();
    let store = env.store();
    env.add_filter(&store, FilterType::Title, 1, "/(?<=RE)oops/", "");
    env.add_filter(&store, FilterType::Title, 2, "/^RE: /i", "");

    let record = MutatingRecord::new().with_name("Re: toner");
    let cleaned = env.hooks().on_before_update(&record).unwrap();
    assert_eq!(cleaned.name.as_deref(), Some("toner"));
}

// ============================================================================
// Picture registry
// ============================================================================

#[test]
fn test_refresh_twice_repopulates_once() {
    let env = Env::new();
    let store = env.store();
    env.add_picture("logo.png", LOGO);
    let registry = env.registry(&store);

    assert!(matches!(
        registry.refresh_if_stale().unwrap(),
        RefreshOutcome::Refreshed { files: 1, .. }
    ));
    assert!(matches!(
        registry.refresh_if_stale().unwrap(),
        RefreshOutcome::Unchanged { .. }
    ));
    assert_eq!(registry.stats().unwrap().records, 1);
}

#[test]
fn test_directory_change_triggers_refresh() {
    let env = Env::new();
    let store = env.store();
    env.add_picture("logo.png", LOGO);
    let registry = env.registry(&store);
    registry.refresh_if_stale().unwrap();

    env.add_picture("footer.gif", FOOTER);
    touch_later(&env.config.pictures_dir());

    assert!(matches!(
        registry.refresh_if_stale().unwrap(),
        RefreshOutcome::Refreshed { files: 2, .. }
    ));
    assert!(registry.is_known(&FileHasher::hash_bytes(FOOTER)).unwrap());
}

#[test]
fn test_membership_sources() {
    let env = Env::new();
    let store = env.store();
    env.add_picture("logo.png", LOGO);
    let footer_hash = FileHasher::hash_bytes(FOOTER);
    env.blacklist_document(&footer_hash, "footer.gif");
    env.blacklist_document(&footer_hash, "footer.gif");

    let registry = env.registry(&store);
    assert!(matches!(
        registry.refresh_if_stale().unwrap(),
        RefreshOutcome::Refreshed {
            files: 1,
            blacklisted: 1,
            ..
        }
    ));
    assert!(registry.is_known(&FileHasher::hash_bytes(LOGO)).unwrap());
    assert!(registry.is_known(&footer_hash).unwrap());
    assert!(!registry.is_known(&FileHasher::hash_bytes(PHOTO)).unwrap());
}

#[test]
fn test_watermark_survives_reopen() {
    let env = Env::new();
    {
        let store = env.store();
        env.add_picture("logo.png", LOGO);
        env.registry(&store).refresh_if_stale().unwrap();
    }

    let store = env.store();
    let stats = env.registry(&store).stats().unwrap();
    assert_eq!(stats.records, 1);
    assert_eq!(stats.watermark.unwrap().as_str().len(), 14);
    assert!(matches!(
        env.registry(&store).refresh_if_stale().unwrap(),
        RefreshOutcome::Unchanged { .. }
    ));
}

// ============================================================================
// Attachment dedup
// ============================================================================

#[test]
fn test_known_logo_dropped_on_create() {
    let env = Env::new();
    let store = env.store();
    env.add_filter(&store, FilterType::BodyContent, 1, "/Best regards.*/s", "");
    env.add_picture("logo.png", LOGO);
    env.stage("image001.png", LOGO);
    env.stage("photo.png", PHOTO);
    env.stage("invoice.pdf", PDF);

    let record = mail_ticket(
        "It smokes #P1# #L1#\nBest regards\nJohn #L1#",
        &["photo.png", "image001.png", "invoice.pdf"],
        &["P1", "L1", "I1"],
    );
    let cleaned = env.hooks().on_before_create(&record).unwrap();

    assert_eq!(
        cleaned.filenames,
        Some(vec!["photo.png".to_string(), "invoice.pdf".to_string()])
    );
    assert_eq!(cleaned.tags, Some(vec!["P1".to_string(), "I1".to_string()]));
    assert_eq!(cleaned.content.as_deref(), Some("It smokes #P1# \n"));
    assert!(!env.staged("image001.png"));
    assert!(env.staged("photo.png"));
    assert!(env.staged("invoice.pdf"));
}

#[test]
fn test_update_never_dedupes() {
    let env = Env::new();
    env.store();
    env.add_picture("logo.png", LOGO);
    env.stage("image001.png", LOGO);

    let record = mail_ticket("#L1#", &["image001.png"], &["L1"]);
    let cleaned = env.hooks().on_before_update(&record).unwrap();
    assert_eq!(cleaned, record);
    assert!(env.staged("image001.png"));
}

#[test]
fn test_ticket_without_mailgate_keeps_attachments() {
    let env = Env::new();
    env.store();
    env.add_picture("logo.png", LOGO);
    env.stage("image001.png", LOGO);

    let mut record = mail_ticket("#L1#", &["image001.png"], &["L1"]);
    record.mailgate = None;
    let cleaned = env.hooks().on_before_create(&record).unwrap();
    assert_eq!(cleaned.filenames, Some(vec!["image001.png".to_string()]));
    assert!(env.staged("image001.png"));
}

#[test]
fn test_missing_pictures_directory_still_saves() {
    let env = Env::new();
    env.store();
    std::fs::remove_dir(env.config.pictures_dir()).unwrap();
    env.stage("image001.png", LOGO);

    let record = mail_ticket("body", &["image001.png"], &["L1"]);
    let cleaned = env.hooks().on_before_create(&record).unwrap();
    assert_eq!(cleaned.filenames, Some(vec!["image001.png".to_string()]));
}

#[test]
fn test_missing_schema_is_a_storage_error() {
    let env = Env::new();
    env.add_picture("logo.png", LOGO);
    env.stage("image001.png", LOGO);
    // Database file exists but was never installed.
    drop(SqliteStore::open(env.config.db_path()).unwrap());

    let record = mail_ticket("body", &["image001.png"], &["L1"]);
    let err = env.hooks().on_before_create(&record).unwrap_err();
    assert!(matches!(err, ticketcleaner::Error::Storage { .. }));
    assert!(env.staged("image001.png"));
}

// ============================================================================
// JSON hook surface
// ============================================================================

#[test]
fn test_json_hook_end_to_end() {
    let env = Env::new();
    env.store();
    env.add_picture("logo.png", LOGO);
    env.stage("image001.png", LOGO);

    let handler = RecordHookHandler::new(HookEvent::BeforeCreate, Arc::new(env.hooks()));
    let output = handler
        .handle(
            r#"{"name":"Printer","content":"Hi #L1#","_mailgate":3,
                "_filename":["image001.png"],"_tag":["L1"],"entities_id":0}"#,
        )
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(value["content"], "Hi ");
    assert_eq!(value["_filename"], serde_json::json!([]));
    assert_eq!(value["entities_id"], 0);
    assert!(env.dir.path().join("ticketcleaner.db").exists());
}
