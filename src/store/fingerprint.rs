//! Content fingerprints and identity checks.
//!
//! A [`FileFingerprint`] is the MD5 digest of a byte sequence together with
//! its length. It can be derived from a file on disk (streamed in 4 KiB
//! chunks) or from an in-memory buffer, and both derivations agree for
//! identical content.
//!
//! # Same-size approximation
//!
//! [`identical_or_same_size`] treats two payloads of equal length as
//! duplicates even when their bytes differ. Callers use it to decide whether
//! a freshly downloaded image is "already on disk" without hashing every
//! candidate. A re-render that changes pixels but keeps the exact byte count
//! is therefore skipped. This is a known approximation and is kept on purpose.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use md5::{Digest, Md5};
use tracing::{Level, debug};

use super::error::StoreError;

/// Hex MD5 digest of an empty payload.
///
/// Some services answer a missing asset with `200 OK` and no body; callers
/// compare against this to treat such responses as failures.
pub const EMPTY_CONTENT_DIGEST: &str = "d41d8cd98f00b204e9800998ecf8427e";

const CHUNK_SIZE: usize = 4096;

/// 128-bit content hash plus byte length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileFingerprint {
    digest: [u8; 16],
    len: u64,
}

impl FileFingerprint {
    /// Fingerprints an in-memory buffer.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Md5::new();
        hasher.update(bytes);
        Self {
            digest: finish(hasher),
            len: bytes.len() as u64,
        }
    }

    /// Fingerprints a file by streaming it in fixed-size chunks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be opened or read.
    pub fn from_path(path: &Path) -> Result<Self, StoreError> {
        let mut file = File::open(path).map_err(|e| StoreError::io(path, e))?;
        let mut hasher = Md5::new();
        let mut buffer = [0u8; CHUNK_SIZE];
        let mut len: u64 = 0;
        loop {
            let read = file.read(&mut buffer).map_err(|e| StoreError::io(path, e))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            len += read as u64;
        }
        Ok(Self {
            digest: finish(hasher),
            len,
        })
    }

    /// Returns the lowercase hex digest.
    #[must_use]
    pub fn hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Returns the content length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` for zero-length content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` when the digest equals [`EMPTY_CONTENT_DIGEST`].
    #[must_use]
    pub fn is_empty_content(&self) -> bool {
        self.hex() == EMPTY_CONTENT_DIGEST
    }
}

impl fmt::Display for FileFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

fn finish(hasher: Md5) -> [u8; 16] {
    let mut digest = [0u8; 16];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Either side of an identity check.
#[derive(Debug, Clone, Copy)]
pub enum ContentSource<'a> {
    /// A file on disk.
    Path(&'a Path),
    /// Content already in memory.
    Bytes(&'a [u8]),
}

impl ContentSource<'_> {
    fn is_missing(&self) -> bool {
        match self {
            Self::Path(path) => !path.exists(),
            Self::Bytes(_) => false,
        }
    }

    fn size(&self) -> Result<u64, StoreError> {
        match self {
            Self::Path(path) => std::fs::metadata(path)
                .map(|meta| meta.len())
                .map_err(|e| StoreError::io(*path, e)),
            Self::Bytes(bytes) => Ok(bytes.len() as u64),
        }
    }

    /// Fingerprints the source.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if a path source cannot be read.
    pub fn fingerprint(&self) -> Result<FileFingerprint, StoreError> {
        match self {
            Self::Path(path) => FileFingerprint::from_path(path),
            Self::Bytes(bytes) => Ok(FileFingerprint::from_bytes(bytes)),
        }
    }
}

impl<'a> From<&'a Path> for ContentSource<'a> {
    fn from(path: &'a Path) -> Self {
        Self::Path(path)
    }
}

impl<'a> From<&'a [u8]> for ContentSource<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::Bytes(bytes)
    }
}

/// Checks whether two sources hold the same content.
///
/// A path that does not exist on either side makes the result `false`.
/// With `size_only`, only lengths are compared.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if an existing path cannot be read.
pub fn is_identical(
    a: ContentSource<'_>,
    b: ContentSource<'_>,
    size_only: bool,
) -> Result<bool, StoreError> {
    if a.is_missing() || b.is_missing() {
        return Ok(false);
    }

    if a.size()? != b.size()? {
        return Ok(false);
    }
    if size_only {
        return Ok(true);
    }

    Ok(a.fingerprint()? == b.fingerprint()?)
}

/// Returns `true` when `existing` and `candidate` have the same length.
///
/// Equal length is accepted as "already have it" without hashing. The full
/// comparison is only computed when debug logging is enabled, to tell the
/// two cases apart in the log.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if an existing path cannot be read.
pub fn identical_or_same_size(
    existing: ContentSource<'_>,
    candidate: ContentSource<'_>,
) -> Result<bool, StoreError> {
    if !is_identical(existing, candidate, true)? {
        return Ok(false);
    }

    if tracing::enabled!(Level::DEBUG) {
        let label = match existing {
            ContentSource::Path(path) => path.display().to_string(),
            ContentSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        };
        if is_identical(existing, candidate, false)? {
            debug!(file = %label, "skipped (identical)");
        } else {
            debug!(file = %label, "skipped (different content, same size)");
        }
    }
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_bytes_known_digest() {
        let fp = FileFingerprint::from_bytes(b"abc");
        assert_eq!(fp.hex(), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(fp.len(), 3);
    }

    #[test]
    fn test_fingerprint_empty_matches_sentinel() {
        let fp = FileFingerprint::from_bytes(b"");
        assert_eq!(fp.hex(), EMPTY_CONTENT_DIGEST);
        assert!(fp.is_empty());
        assert!(fp.is_empty_content());
    }

    #[test]
    fn test_fingerprint_path_matches_bytes_across_chunks() {
        let temp = TempDir::new().unwrap();
        // Spans several chunks and ends mid-chunk.
        let content: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let path = temp.path().join("blob.png");
        std::fs::write(&path, &content).unwrap();

        let from_path = FileFingerprint::from_path(&path).unwrap();
        let from_bytes = FileFingerprint::from_bytes(&content);
        assert_eq!(from_path, from_bytes);
        assert_eq!(from_path.len(), content.len() as u64);
    }

    #[test]
    fn test_fingerprint_path_exact_chunk_multiple() {
        let temp = TempDir::new().unwrap();
        let content = vec![7u8; CHUNK_SIZE * 2];
        let path = temp.path().join("even.png");
        std::fs::write(&path, &content).unwrap();

        assert_eq!(
            FileFingerprint::from_path(&path).unwrap(),
            FileFingerprint::from_bytes(&content)
        );
    }

    #[test]
    fn test_fingerprint_missing_path_errors() {
        let temp = TempDir::new().unwrap();
        let result = FileFingerprint::from_path(&temp.path().join("absent.png"));
        assert!(matches!(result, Err(StoreError::Io { .. })));
    }

    #[test]
    fn test_is_identical_reflexive() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.png");
        std::fs::write(&path, b"pixels").unwrap();

        let file = ContentSource::Path(&path);
        let bytes = ContentSource::Bytes(b"pixels");
        assert!(is_identical(file, file, false).unwrap());
        assert!(is_identical(bytes, bytes, false).unwrap());
        assert!(is_identical(file, bytes, false).unwrap());
    }

    #[test]
    fn test_is_identical_missing_path_is_false() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.png");
        let missing = ContentSource::Path(&missing);
        assert!(!is_identical(missing, ContentSource::Bytes(b""), false).unwrap());
        assert!(!is_identical(ContentSource::Bytes(b"x"), missing, true).unwrap());
        assert!(!is_identical(missing, missing, false).unwrap());
    }

    #[test]
    fn test_is_identical_same_size_different_content() {
        let a = ContentSource::Bytes(b"aaaa");
        let b = ContentSource::Bytes(b"bbbb");
        assert!(!is_identical(a, b, false).unwrap());
        assert!(is_identical(a, b, true).unwrap());
    }

    #[test]
    fn test_identical_or_same_size_is_coarser_than_identical() {
        let a = ContentSource::Bytes(b"aaaa");
        let same = ContentSource::Bytes(b"aaaa");
        let same_len = ContentSource::Bytes(b"bbbb");
        let longer = ContentSource::Bytes(b"aaaaa");

        assert!(identical_or_same_size(a, a).unwrap());
        assert!(identical_or_same_size(a, same).unwrap());
        // Known approximation: same length, different bytes still counts.
        assert!(identical_or_same_size(a, same_len).unwrap());
        assert!(!is_identical(a, same_len, false).unwrap());
        assert!(!identical_or_same_size(a, longer).unwrap());
    }

    #[test]
    fn test_identical_or_same_size_missing_path_is_false() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.png");
        assert!(
            !identical_or_same_size(ContentSource::Path(&missing), ContentSource::Bytes(b""))
                .unwrap()
        );
    }

    #[test]
    fn test_fingerprint_display_is_hex() {
        let fp = FileFingerprint::from_bytes(b"abc");
        assert_eq!(fp.to_string(), fp.hex());
    }
}
