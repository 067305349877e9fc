//! Signature image removal for mail-gate tickets.
//!
//! Mail clients attach the sender's logo to every message. Each image
//! attachment is hashed and compared against the [`HashRegistry`]; known
//! images are dropped from the record, their staged file is removed and the
//! inline `#tag#` placeholder they left in the body goes with them.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::hasher::FileHasher;
use super::registry::HashRegistry;
use crate::models::MutatingRecord;
use crate::{Error, Result};

/// Bytes read from the head of a file for magic detection.
const PROBE_HEADER_LEN: u64 = 8192;

/// MIME type fallback when nothing matches.
const OCTET_STREAM: &str = "application/octet-stream";

/// Content-type detection for staged attachments.
pub trait MimeProbe: Send + Sync {
    /// Returns the MIME type of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Probe`] if the file cannot be read.
    fn probe(&self, path: &Path) -> Result<String>;
}

/// Magic-byte detection with an extension fallback for formats that have no
/// signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicProbe;

impl MagicProbe {
    fn from_extension(path: &Path) -> Option<&'static str> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let mime = match ext.as_str() {
            "svg" => "image/svg+xml",
            "txt" | "log" => "text/plain",
            "htm" | "html" => "text/html",
            "csv" => "text/csv",
            "xml" => "application/xml",
            "json" => "application/json",
            "eml" => "message/rfc822",
            _ => return None,
        };
        Some(mime)
    }
}

impl MimeProbe for MagicProbe {
    fn probe(&self, path: &Path) -> Result<String> {
        let probe_error = |e: std::io::Error| Error::Probe {
            path: path.display().to_string(),
            cause: e.to_string(),
        };
        let mut header = Vec::new();
        File::open(path)
            .map_err(probe_error)?
            .take(PROBE_HEADER_LEN)
            .read_to_end(&mut header)
            .map_err(probe_error)?;

        if let Some(kind) = infer::get(&header) {
            return Ok(kind.mime_type().to_string());
        }
        Ok(Self::from_extension(path)
            .unwrap_or(OCTET_STREAM)
            .to_string())
    }
}

/// What happened to one attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentOutcome {
    /// Staged path.
    pub path: PathBuf,
    /// Detected MIME type, when the probe succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// SHA-1, for images only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// True if the attachment was discarded from the record.
    pub deleted: bool,
    /// Probe, hash or unlink failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttachmentOutcome {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            mime_type: None,
            hash: None,
            deleted: false,
            error: None,
        }
    }

    fn failed(mut self, error: &Error) -> Self {
        self.error = Some(error.to_string());
        self
    }

    fn log(&self) {
        let file = self.path.display();
        match (&self.mime_type, &self.hash) {
            (Some(mime_type), Some(hash)) => {
                info!(%file, %mime_type, sha1 = %hash, deleted = self.deleted, "Attachment checked");
            },
            (Some(mime_type), None) => info!(%file, %mime_type, "Attachment checked"),
            (None, _) => info!(%file, "Attachment not checked"),
        }
    }
}

/// Per-ticket dedup result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupReport {
    /// Ticket title.
    pub title: String,
    /// One entry per attachment, in mail order.
    pub attachments: Vec<AttachmentOutcome>,
}

impl DedupReport {
    /// Number of discarded attachments.
    #[must_use]
    pub fn deleted_count(&self) -> usize {
        self.attachments.iter().filter(|a| a.deleted).count()
    }
}

/// Drops staged image attachments whose hash is registered.
pub struct AttachmentDeduper {
    registry: Arc<HashRegistry>,
    staging_dir: PathBuf,
    probe: Arc<dyn MimeProbe>,
}

impl AttachmentDeduper {
    /// Creates a deduper reading staged files from `staging_dir`.
    #[must_use]
    pub fn new(registry: Arc<HashRegistry>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            staging_dir: staging_dir.into(),
            probe: Arc::new(MagicProbe),
        }
    }

    /// Replaces the content-type probe.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn MimeProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Registry consulted by this deduper.
    #[must_use]
    pub fn registry(&self) -> &HashRegistry {
        &self.registry
    }

    /// Returns `record` without its known signature images.
    ///
    /// Records that do not come from the mail gateway with a title and at
    /// least one attachment are returned unchanged with no report. The
    /// registry is refreshed first if the pictures directory changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the registry cannot be refreshed or read.
    /// Per-attachment failures are reported in the [`DedupReport`] instead.
    #[instrument(skip(self, record), fields(ticket = record.name.as_deref().unwrap_or_default()))]
    pub fn dedupe(&self, record: &MutatingRecord) -> Result<(MutatingRecord, Option<DedupReport>)> {
        if !record.has_mail_attachments() {
            return Ok((record.clone(), None));
        }

        self.registry.refresh_if_stale()?;
        let known = self.registry.known_hashes()?;

        let title = record.name.clone().unwrap_or_default();
        info!(ticket = %title, "Checking ticket attachments");

        let filenames = record.filenames.clone().unwrap_or_default();
        let tags = record.tags.clone().unwrap_or_default();
        let mut content = record.content.clone();
        let mut kept_files = Vec::with_capacity(filenames.len());
        let mut kept_tags = Vec::with_capacity(tags.len());
        let mut report = DedupReport {
            title,
            attachments: Vec::with_capacity(filenames.len()),
        };

        for (index, filename) in filenames.iter().enumerate() {
            let tag = tags.get(index);
            let outcome = self.inspect(filename, &known);
            outcome.log();

            if outcome.deleted {
                metrics::counter!("ticketcleaner_attachments_discarded_total").increment(1);
                if let (Some(tag), Some(body)) = (tag, content.as_mut()) {
                    *body = body.replacen(&format!("#{tag}#"), "", 1);
                }
            } else {
                kept_files.push(filename.clone());
                kept_tags.extend(tag.cloned());
            }
            report.attachments.push(outcome);
        }
        kept_tags.extend(tags.iter().skip(filenames.len()).cloned());

        let mut cleaned = record.clone();
        cleaned.content = content;
        cleaned.filenames = Some(kept_files);
        if cleaned.tags.is_some() {
            cleaned.tags = Some(kept_tags);
        }
        Ok((cleaned, Some(report)))
    }

    fn inspect(&self, filename: &str, known: &HashSet<String>) -> AttachmentOutcome {
        let path = self.staging_dir.join(filename);
        let outcome = AttachmentOutcome::new(path.clone());

        if !is_plain_file_name(filename) {
            let error = Error::Probe {
                path: filename.to_string(),
                cause: "not a plain file name".to_string(),
            };
            warn!(file = %filename, "Refusing attachment outside the staging directory");
            return outcome.failed(&error);
        }

        let mime_type = match self.probe.probe(&path) {
            Ok(mime_type) => mime_type,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "MIME probe failed");
                return outcome.failed(&e);
            },
        };
        let mut outcome = AttachmentOutcome {
            mime_type: Some(mime_type.clone()),
            ..outcome
        };
        if !is_image(&mime_type) {
            return outcome;
        }

        let hash = match FileHasher::hash_file(&path) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Hashing failed");
                return outcome.failed(&e);
            },
        };
        outcome.deleted = known.contains(&hash);
        outcome.hash = Some(hash);

        if outcome.deleted {
            if let Err(e) = fs::remove_file(&path) {
                warn!(
                    file = %path.display(),
                    error = %e,
                    "Cannot remove staged signature image, leaving it orphaned"
                );
                outcome.error = Some(e.to_string());
            }
        }
        outcome
    }
}

fn is_image(mime_type: &str) -> bool {
    mime_type
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

/// Accepts names that resolve to a direct child of the staging directory.
fn is_plain_file_name(filename: &str) -> bool {
    let mut components = Path::new(filename).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
