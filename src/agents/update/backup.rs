use crate::error::{Result, VersyncError};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

#[derive(Debug)]
struct BackupEntry {
    original: PathBuf,
    /// `None` when the target did not exist at snapshot time.
    snapshot: Option<PathBuf>,
}

/// Snapshots of every target file, kept in one private scratch directory.
///
/// Targets that did not exist yet are recorded too, so a restore removes
/// anything the transaction created in their place.
///
/// Owned by a single transaction: [`BackupSet::discard`] on success,
/// [`BackupSet::restore`] on failure. Dropping the set removes the scratch
/// directory unless a failed restore handed it over to the user.
#[derive(Debug)]
pub struct BackupSet {
    arena: TempDir,
    entries: Vec<BackupEntry>,
}

impl BackupSet {
    /// Copies every existing file in `paths` and records the absent ones.
    pub fn snapshot<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let arena = tempfile::Builder::new()
            .prefix("versync-backup-")
            .tempdir()
            .map_err(|e| VersyncError::Backup(format!("Failed to create backup directory: {e}")))?;

        let mut entries = Vec::new();
        for (idx, path) in paths.into_iter().enumerate() {
            let original = path.as_ref();
            if !original.exists() {
                debug!(original = %original.display(), "absent, will be removed on restore");
                entries.push(BackupEntry {
                    original: original.to_path_buf(),
                    snapshot: None,
                });
                continue;
            }

            let file_name = original
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string());
            let snapshot = arena.path().join(format!("{idx:02}-{file_name}"));

            fs::copy(original, &snapshot).map_err(|e| {
                VersyncError::Backup(format!("Failed to back up {}: {e}", original.display()))
            })?;
            debug!(original = %original.display(), snapshot = %snapshot.display(), "backed up");

            entries.push(BackupEntry {
                original: original.to_path_buf(),
                snapshot: Some(snapshot),
            });
        }

        Ok(Self { arena, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn arena_path(&self) -> &Path {
        self.arena.path()
    }

    /// Copies every snapshot back over its original and removes files that
    /// were absent at snapshot time, then removes the arena.
    ///
    /// Every entry is attempted even if an earlier one fails. On any failure
    /// the arena is kept on disk and its location is part of the error.
    pub fn restore(self) -> Result<usize> {
        let mut failures = Vec::new();

        for entry in &self.entries {
            let restored = match &entry.snapshot {
                Some(snapshot) => fs::copy(snapshot, &entry.original).map(|_| ()),
                None => remove_created(&entry.original),
            };
            if let Err(e) = restored {
                warn!(file = %entry.original.display(), error = %e, "restore failed");
                failures.push(format!("{}: {e}", entry.original.display()));
            }
        }

        if failures.is_empty() {
            let restored = self.entries.len();
            self.discard()?;
            return Ok(restored);
        }

        let kept = self.arena.keep();
        Err(VersyncError::Backup(format!(
            "Failed to restore {}; backups kept in {}",
            failures.join(", "),
            kept.display()
        )))
    }

    /// Removes the arena without touching the originals.
    pub fn discard(self) -> Result<()> {
        self.arena
            .close()
            .map_err(|e| VersyncError::Backup(format!("Failed to remove backups: {e}")))
    }
}

fn remove_created(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
