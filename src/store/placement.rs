//! Collision-safe placement of downloaded content.
//!
//! [`find_next_available_path`] decides, for one payload, whether it is
//! already on disk, where a new copy should go, or (under
//! [`SlotPolicy::TakeOver`]) which existing file to move aside so the new
//! content can claim the canonical name.
//!
//! Numbered variants are probed as `stem_2.ext`, `stem_3.ext`, … in order.
//! A slot held by different content is never reused, and nothing is ever
//! truncated; the only mutation besides creating the folder is the take-over
//! rename.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use super::error::StoreError;
use super::filename::numbered_name;
use super::fingerprint::{ContentSource, identical_or_same_size};

/// First numeric suffix tried after the canonical name.
const FIRST_SUFFIX: u64 = 2;

/// What to do when the canonical name holds different content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SlotPolicy {
    /// New content goes to the first free numbered slot.
    #[default]
    KeepOriginal,
    /// The current occupant moves to the first free numbered slot and the
    /// new content takes the canonical name.
    TakeOver,
}

/// Result of a placement search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementDecision {
    /// The content already exists at this path; nothing should be written.
    UseExisting(PathBuf),
    /// Write to this path; nothing exists there yet.
    WritePath(PathBuf),
    /// The previous occupant has been renamed aside; write to this path.
    TakeOverSlot(PathBuf),
}

impl PlacementDecision {
    /// Returns the path to write to, or `None` for [`UseExisting`](Self::UseExisting).
    #[must_use]
    pub fn write_target(&self) -> Option<&Path> {
        match self {
            Self::UseExisting(_) => None,
            Self::WritePath(path) | Self::TakeOverSlot(path) => Some(path),
        }
    }
}

/// Finds where `content` should be written inside `folder`.
///
/// The folder is created if missing. If `folder/desired_name` is free it is
/// returned as is; if it holds content of the same size the payload is
/// treated as a duplicate. Otherwise numbered variants are probed until a
/// duplicate or a free slot is found.
///
/// # Errors
///
/// Returns [`StoreError`] if the folder cannot be created, an existing file
/// cannot be read, or the take-over rename fails.
#[instrument(skip(content), fields(bytes = content.len()))]
pub fn find_next_available_path(
    folder: &Path,
    desired_name: &str,
    content: &[u8],
    policy: SlotPolicy,
) -> Result<PlacementDecision, StoreError> {
    std::fs::create_dir_all(folder).map_err(|e| StoreError::io(folder, e))?;

    let canonical = folder.join(desired_name);
    if !canonical.exists() {
        return Ok(PlacementDecision::WritePath(canonical));
    }
    if identical_or_same_size(ContentSource::Path(&canonical), ContentSource::Bytes(content))? {
        return Ok(PlacementDecision::UseExisting(canonical));
    }

    let mut suffix = FIRST_SUFFIX;
    loop {
        let candidate = folder.join(numbered_name(desired_name, suffix));
        if !candidate.exists() {
            return match policy {
                SlotPolicy::KeepOriginal => {
                    debug!(path = %candidate.display(), "using numbered slot");
                    Ok(PlacementDecision::WritePath(candidate))
                }
                SlotPolicy::TakeOver => {
                    std::fs::rename(&canonical, &candidate)
                        .map_err(|e| StoreError::rename(&canonical, &candidate, e))?;
                    debug!(
                        from = %canonical.display(),
                        to = %candidate.display(),
                        "moved previous content aside"
                    );
                    Ok(PlacementDecision::TakeOverSlot(canonical))
                }
            };
        }
        if identical_or_same_size(ContentSource::Path(&candidate), ContentSource::Bytes(content))? {
            return Ok(PlacementDecision::UseExisting(candidate));
        }
        suffix += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_folder_returns_canonical_path() {
        let temp = TempDir::new().unwrap();
        let decision =
            find_next_available_path(temp.path(), "face.png", b"one", SlotPolicy::KeepOriginal)
                .unwrap();
        assert_eq!(decision, PlacementDecision::WritePath(temp.path().join("face.png")));
    }

    #[test]
    fn test_creates_missing_folder() {
        let temp = TempDir::new().unwrap();
        let folder = temp.path().join("mii").join("Alex");
        let decision =
            find_next_available_path(&folder, "face.png", b"one", SlotPolicy::KeepOriginal)
                .unwrap();
        assert!(folder.is_dir());
        assert_eq!(decision, PlacementDecision::WritePath(folder.join("face.png")));
    }

    #[test]
    fn test_identical_content_uses_existing() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("face.png"), b"one").unwrap();
        let decision =
            find_next_available_path(temp.path(), "face.png", b"one", SlotPolicy::KeepOriginal)
                .unwrap();
        assert_eq!(decision, PlacementDecision::UseExisting(temp.path().join("face.png")));
        assert_eq!(decision.write_target(), None);
    }

    #[test]
    fn test_same_size_different_content_uses_existing() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("face.png"), b"abc").unwrap();
        let decision =
            find_next_available_path(temp.path(), "face.png", b"xyz", SlotPolicy::KeepOriginal)
                .unwrap();
        assert!(matches!(decision, PlacementDecision::UseExisting(_)));
    }

    #[test]
    fn test_different_size_gets_numbered_slot() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("face.png"), b"one").unwrap();
        let decision =
            find_next_available_path(temp.path(), "face.png", b"three", SlotPolicy::KeepOriginal)
                .unwrap();
        assert_eq!(decision, PlacementDecision::WritePath(temp.path().join("face_2.png")));
        // The original is untouched.
        assert_eq!(std::fs::read(temp.path().join("face.png")).unwrap(), b"one");
    }

    #[test]
    fn test_suffixes_probe_in_order_and_skip_occupied() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("face.png"), b"1").unwrap();
        std::fs::write(temp.path().join("face_2.png"), b"22").unwrap();
        std::fs::write(temp.path().join("face_3.png"), b"333").unwrap();
        let decision =
            find_next_available_path(temp.path(), "face.png", b"55555", SlotPolicy::KeepOriginal)
                .unwrap();
        assert_eq!(decision, PlacementDecision::WritePath(temp.path().join("face_4.png")));
    }

    #[test]
    fn test_duplicate_among_numbered_variants() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("face.png"), b"1").unwrap();
        std::fs::write(temp.path().join("face_2.png"), b"22").unwrap();
        std::fs::write(temp.path().join("face_3.png"), b"333").unwrap();
        let decision =
            find_next_available_path(temp.path(), "face.png", b"333", SlotPolicy::KeepOriginal)
                .unwrap();
        assert_eq!(decision, PlacementDecision::UseExisting(temp.path().join("face_3.png")));
    }

    #[test]
    fn test_take_over_moves_occupant_aside() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("face.png"), b"old").unwrap();
        let decision =
            find_next_available_path(temp.path(), "face.png", b"newer", SlotPolicy::TakeOver)
                .unwrap();

        assert_eq!(decision, PlacementDecision::TakeOverSlot(temp.path().join("face.png")));
        assert!(!temp.path().join("face.png").exists(), "canonical slot is freed");
        assert_eq!(std::fs::read(temp.path().join("face_2.png")).unwrap(), b"old");
    }

    #[test]
    fn test_take_over_with_free_canonical_is_plain_write() {
        let temp = TempDir::new().unwrap();
        let decision =
            find_next_available_path(temp.path(), "face.png", b"x", SlotPolicy::TakeOver).unwrap();
        assert_eq!(decision, PlacementDecision::WritePath(temp.path().join("face.png")));
    }

    #[test]
    fn test_extensionless_name() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("README"), b"a").unwrap();
        let decision =
            find_next_available_path(temp.path(), "README", b"bb", SlotPolicy::KeepOriginal)
                .unwrap();
        assert_eq!(decision, PlacementDecision::WritePath(temp.path().join("README_2")));
    }
}
