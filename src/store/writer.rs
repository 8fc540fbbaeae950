//! Writing payloads to disk.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use super::error::StoreError;
use super::placement::{PlacementDecision, SlotPolicy, find_next_available_path};

/// Result of [`write_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The content was written to this path.
    Written(PathBuf),
    /// The path already existed and overwriting was not allowed.
    RefusedExisting(PathBuf),
}

/// Result of [`persist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted {
    /// The content was saved to this path.
    Saved(PathBuf),
    /// The content was already on disk at this path.
    Skipped(PathBuf),
    /// The chosen path was taken between placement and write.
    Refused(PathBuf),
}

/// Writes `content` to `path`.
///
/// If `path` exists and `overwrite` is false, nothing is written and
/// [`WriteOutcome::RefusedExisting`] is returned. Parent folders are created
/// as needed. The bytes go to a temporary sibling first and are renamed into
/// place, so readers never observe a half-written file.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if creating folders, writing or renaming fails.
#[instrument(skip(content), fields(path = %path.display(), bytes = content.len()))]
pub fn write_file(path: &Path, content: &[u8], overwrite: bool) -> Result<WriteOutcome, StoreError> {
    if path.exists() && !overwrite {
        warn!(path = %path.display(), "file already exists and overwrite is not allowed");
        return Ok(WriteOutcome::RefusedExisting(path.to_path_buf()));
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let staging = staging_path(path);
    if let Err(e) = std::fs::write(&staging, content) {
        let _ = std::fs::remove_file(&staging);
        return Err(StoreError::io(&staging, e));
    }
    if let Err(e) = std::fs::rename(&staging, path) {
        debug!(path = %staging.display(), "cleaning up staging file after error");
        let _ = std::fs::remove_file(&staging);
        return Err(StoreError::io(path, e));
    }

    info!(path = %path.display(), "downloaded");
    Ok(WriteOutcome::Written(path.to_path_buf()))
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.part"))
}

/// Places and writes `content` as `folder/desired_name` in one step.
///
/// # Errors
///
/// Returns [`StoreError`] from placement or writing.
pub fn persist(
    folder: &Path,
    desired_name: &str,
    content: &[u8],
    policy: SlotPolicy,
) -> Result<Persisted, StoreError> {
    let target = match find_next_available_path(folder, desired_name, content, policy)? {
        PlacementDecision::UseExisting(existing) => return Ok(Persisted::Skipped(existing)),
        PlacementDecision::WritePath(path) | PlacementDecision::TakeOverSlot(path) => path,
    };
    match write_file(&target, content, false)? {
        WriteOutcome::Written(path) => Ok(Persisted::Saved(path)),
        WriteOutcome::RefusedExisting(path) => Ok(Persisted::Refused(path)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_file_creates_parents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("roblox").join("outfits").join("hat.png");
        let outcome = write_file(&path, b"hat", false).unwrap();
        assert_eq!(outcome, WriteOutcome::Written(path.clone()));
        assert_eq!(std::fs::read(&path).unwrap(), b"hat");
    }

    #[test]
    fn test_write_file_refuses_existing_without_overwrite() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("face.png");
        std::fs::write(&path, b"keep").unwrap();

        let outcome = write_file(&path, b"replace", false).unwrap();
        assert_eq!(outcome, WriteOutcome::RefusedExisting(path.clone()));
        assert_eq!(std::fs::read(&path).unwrap(), b"keep");
    }

    #[test]
    fn test_write_file_overwrites_when_allowed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("face.png");
        std::fs::write(&path, b"old").unwrap();

        let outcome = write_file(&path, b"new content", true).unwrap();
        assert_eq!(outcome, WriteOutcome::Written(path.clone()));
        assert_eq!(std::fs::read(&path).unwrap(), b"new content");
    }

    #[test]
    fn test_write_file_leaves_no_staging_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("face.png");
        write_file(&path, b"pixels", false).unwrap();

        let entries: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("face.png")]);
    }

    #[test]
    fn test_persist_sequence_keep_original() {
        let temp = TempDir::new().unwrap();
        let folder = temp.path();

        let first = persist(folder, "face.png", b"one", SlotPolicy::KeepOriginal).unwrap();
        assert_eq!(first, Persisted::Saved(folder.join("face.png")));

        let again = persist(folder, "face.png", b"one", SlotPolicy::KeepOriginal).unwrap();
        assert_eq!(again, Persisted::Skipped(folder.join("face.png")));

        let different = persist(folder, "face.png", b"three", SlotPolicy::KeepOriginal).unwrap();
        assert_eq!(different, Persisted::Saved(folder.join("face_2.png")));

        let dup_variant = persist(folder, "face.png", b"three", SlotPolicy::KeepOriginal).unwrap();
        assert_eq!(dup_variant, Persisted::Skipped(folder.join("face_2.png")));
    }

    #[test]
    fn test_persist_take_over_keeps_newest_in_canonical_slot() {
        let temp = TempDir::new().unwrap();
        let folder = temp.path();

        persist(folder, "avatar.png", b"v1", SlotPolicy::TakeOver).unwrap();
        let second = persist(folder, "avatar.png", b"v2-longer", SlotPolicy::TakeOver).unwrap();

        assert_eq!(second, Persisted::Saved(folder.join("avatar.png")));
        assert_eq!(std::fs::read(folder.join("avatar.png")).unwrap(), b"v2-longer");
        assert_eq!(std::fs::read(folder.join("avatar_2.png")).unwrap(), b"v1");
    }
}
