//! Temporary storage for rendered files.
//!
//! A [`SessionStorage`] owns one temporary directory for the lifetime of the
//! server and removes it on drop. Each request renders into its own
//! [`ScratchDir`], which is deleted unless the request succeeds.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Result, StudioError};

/// Session-scoped directory holding every file handed to the user.
#[derive(Debug)]
pub struct SessionStorage {
    dir: TempDir,
}

impl SessionStorage {
    /// Creates the session directory under `parent`.
    pub fn new(parent: &Path) -> Result<Self> {
        std::fs::create_dir_all(parent).map_err(|e| {
            StudioError::audio_io(format!(
                "Failed to create output directory {}: {}",
                parent.display(),
                e
            ))
        })?;

        let dir = tempfile::Builder::new()
            .prefix("musicgen-session-")
            .tempdir_in(parent)
            .map_err(|e| {
                StudioError::audio_io(format!(
                    "Failed to create session directory in {}: {}",
                    parent.display(),
                    e
                ))
            })?;

        tracing::info!(path = %dir.path().display(), "session storage ready");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Creates a fresh directory for one request.
    pub fn scratch(&self) -> Result<ScratchDir> {
        // Cleanup is owned by the guard, not by the TempDir.
        let dir = tempfile::Builder::new()
            .prefix("request-")
            .keep(true)
            .tempdir_in(self.dir.path())
            .map_err(|e| {
                StudioError::audio_io(format!("Failed to create request directory: {}", e))
            })?;

        Ok(ScratchDir {
            path: dir.path().to_path_buf(),
            committed: false,
        })
    }
}

/// Canonical form of `path` if it names a file under `root`.
///
/// Symlinks and `..` components are resolved first, so a path that
/// escapes `root` is refused even when it is spelled with `root` as prefix.
pub fn resolve_within(root: &Path, path: &Path) -> Option<PathBuf> {
    let root = std::fs::canonicalize(root).ok()?;
    let resolved = std::fs::canonicalize(path).ok()?;
    (resolved.starts_with(&root) && resolved.is_file()).then_some(resolved)
}

/// Per-request directory removed on drop unless committed.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    committed: bool,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keeps the directory and its files for the rest of the session.
    pub fn commit(mut self) -> PathBuf {
        self.committed = true;
        self.path.clone()
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove scratch directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();
        let storage = SessionStorage::new(parent.path()).unwrap();

        let scratch = storage.scratch().unwrap();
        let path = scratch.path().to_path_buf();
        std::fs::write(path.join("partial.wav"), b"data").unwrap();
        assert!(path.exists());

        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn committed_scratch_survives_until_session_ends() {
        let parent = tempfile::tempdir().unwrap();
        let storage = SessionStorage::new(parent.path()).unwrap();
        let session_path = storage.path().to_path_buf();

        let path = storage.scratch().unwrap().commit();
        assert!(path.exists());
        assert!(path.starts_with(&session_path));

        drop(storage);
        assert!(!path.exists());
        assert!(!session_path.exists());
    }

    #[test]
    fn resolve_stays_inside_session() {
        let parent = tempfile::tempdir().unwrap();
        let storage = SessionStorage::new(parent.path()).unwrap();
        let request_dir = storage.scratch().unwrap().commit();
        let clip = request_dir.join("clip_modified.wav");
        std::fs::write(&clip, b"RIFF").unwrap();
        let outside = parent.path().join("secret.txt");
        std::fs::write(&outside, b"secret").unwrap();

        let root = storage.path();
        assert!(resolve_within(root, &clip).is_some());
        let escaped = request_dir.join("..").join("..").join("secret.txt");
        assert!(resolve_within(root, &escaped).is_none());
        assert!(resolve_within(root, &outside).is_none());
        assert!(resolve_within(root, &request_dir).is_none());
        assert!(resolve_within(root, &request_dir.join("missing.wav")).is_none());
    }

    #[test]
    fn missing_parent_is_created() {
        let parent = tempfile::tempdir().unwrap();
        let nested = parent.path().join("a").join("b");
        let storage = SessionStorage::new(&nested).unwrap();
        assert!(storage.path().starts_with(&nested));
    }
}
