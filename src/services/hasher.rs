//! SHA-1 file hashing.
//!
//! Picture registry entries and staged attachments are compared by the hex
//! SHA-1 of their raw bytes.

use std::fs::File;
use std::io;
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::{Error, Result};

/// File content hasher.
///
/// # Example
///
/// ```rust
/// use ticketcleaner::services::FileHasher;
///
/// let hash = FileHasher::hash_bytes(b"");
/// assert_eq!(hash, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
/// ```
pub struct FileHasher;

impl FileHasher {
    /// Returns the lowercase hex SHA-1 of `data`.
    #[must_use]
    pub fn hash_bytes(data: &[u8]) -> String {
        let mut hasher = Sha1::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Streams a file through SHA-1.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Probe`] if the file cannot be opened or read.
    pub fn hash_file(path: &Path) -> Result<String> {
        let probe_error = |e: io::Error| Error::Probe {
            path: path.display().to_string(),
            cause: e.to_string(),
        };
        let mut file = File::open(path).map_err(probe_error)?;
        let mut hasher = Sha1::new();
        io::copy(&mut file, &mut hasher).map_err(probe_error)?;
        Ok(hex::encode(hasher.finalize()))
    }
}
