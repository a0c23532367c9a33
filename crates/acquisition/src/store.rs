//! Atomic cache writes.
//!
//! A file becomes visible under its final name only once it is complete and
//! the caller has accepted it: bytes go to `<name>.partial` next to the
//! target and are synced. The caller reads the staged file back and either
//! commits it (rename) or discards it. No cache pattern matches a `.partial`
//! name, and a staged file that is dropped without a commit is removed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

/// One async mutex per cache slot.
///
/// Slots are strings chosen by the caller, for level-1 images the cache
/// pattern of a date and wavelength. Entries are never removed; the number
/// of slots a process touches is small.
#[derive(Debug, Clone, Default)]
pub struct PathLocks {
    slots: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `slot`.
    pub async fn lock(&self, slot: &str) -> OwnedMutexGuard<()> {
        let slot_lock = {
            let mut slots = self.slots.lock().await;
            slots
                .entry(slot.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        slot_lock.lock_owned().await
    }
}

/// Temporary name used while `target` is being written.
pub fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}

/// Bytes staged next to their final cache path.
#[derive(Debug)]
pub struct PartialFile {
    target: PathBuf,
    temp: PathBuf,
    done: bool,
}

impl PartialFile {
    /// Write and sync `bytes` to `<target>.partial`, creating parent
    /// directories as needed.
    pub async fn write(target: &Path, bytes: &[u8]) -> std::io::Result<Self> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let staged = Self {
            target: target.to_path_buf(),
            temp: partial_path(target),
            done: false,
        };
        let mut file = fs::File::create(&staged.temp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(staged)
    }

    /// Where the staged bytes can be read.
    pub fn path(&self) -> &Path {
        &self.temp
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Move the staged file to its final name, replacing any existing file.
    pub async fn commit(mut self) -> std::io::Result<PathBuf> {
        fs::rename(&self.temp, &self.target).await?;
        self.done = true;
        debug!(path = %self.target.display(), "Cache file committed");
        Ok(std::mem::take(&mut self.target))
    }

    /// Remove the staged file.
    pub async fn discard(mut self) {
        if let Err(e) = fs::remove_file(&self.temp).await {
            warn!(path = %self.temp.display(), error = %e, "Failed to remove staged file");
        }
        self.done = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.done {
            std::fs::remove_file(&self.temp).ok();
        }
    }
}

/// Write `bytes` to `target`, replacing it atomically.
pub async fn write_atomic(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    PartialFile::write(target, bytes).await?.commit().await?;
    debug!(path = %target.display(), bytes = bytes.len(), "Cache file written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_partial_path() {
        let p = partial_path(Path::new("/data/AIA00193_CR2286.fits"));
        assert_eq!(p, PathBuf::from("/data/AIA00193_CR2286.fits.partial"));
    }

    #[tokio::test]
    async fn test_write_atomic_creates_parent_and_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("map.fits");

        write_atomic(&target, b"SIMPLE").await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"SIMPLE");
        assert!(!partial_path(&target).exists());
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("map.fits");
        std::fs::write(&target, b"old").unwrap();

        write_atomic(&target, b"new").await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_staged_file_is_invisible_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("aia_lev1_171a_2015_03_11t00_00_09_35z_image_lev1.fits");

        let staged = PartialFile::write(&target, b"SIMPLE").await.unwrap();
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"SIMPLE");
        assert!(!target.exists());

        assert_eq!(staged.commit().await.unwrap(), target);
        assert!(target.exists());
        assert!(!partial_path(&target).exists());
    }

    #[tokio::test]
    async fn test_discarded_or_dropped_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("map.fits");

        let staged = PartialFile::write(&target, b"<html>").await.unwrap();
        staged.discard().await;
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());

        let staged = PartialFile::write(&target, b"<html>").await.unwrap();
        drop(staged);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_same_slot_is_serialized() {
        let locks = PathLocks::new();
        let guard = locks.lock("aia_lev1_171a_2015_03_11").await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = other.lock("aia_lev1_171a_2015_03_11").await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_slots_do_not_block() {
        let locks = PathLocks::new();
        let _a = locks.lock("aia_lev1_171a_2015_03_11").await;
        let b = tokio::time::timeout(
            Duration::from_millis(500),
            locks.lock("aia_lev1_193a_2015_03_11"),
        )
        .await;
        assert!(b.is_ok());
    }
}
