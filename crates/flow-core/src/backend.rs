//! Persistence collaborators for the flow collection.
//!
//! A backend owns one *slot*: an opaque text value holding the serialized collection. It
//! knows nothing about patients. Alongside the slot it exposes a *revision*, a number that
//! changes on every write. Stores compare revisions to notice writes they did not make
//! themselves.
//!
//! Writes replace the whole slot. Two writers that read, transform and write concurrently
//! lose one of the updates (last write wins); backends make no attempt to detect this.

use crate::config::{slot_file, validate_slot_name};
use crate::constants::SLOT_EXTENSION;
use crate::{FlowError, FlowResult};
use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Storage medium for the serialized flow collection.
pub trait FlowBackend: Send + Sync + fmt::Debug {
    /// Returns the slot contents, or `None` if nothing has been written yet.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StorageRead`] if the medium cannot be read at all.
    fn load(&self) -> FlowResult<Option<String>>;

    /// Replaces the slot contents and returns the revision of the new contents.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StorageWrite`] if the medium is not writable.
    fn store(&self, contents: &str) -> FlowResult<u64>;

    /// Returns the current revision of the slot. A never-written slot has revision `0`.
    fn revision(&self) -> FlowResult<u64>;
}

// ============================================================================
// FILE BACKEND
// ============================================================================

/// Slot stored as `<dir>/<slot>.json`.
///
/// Writes go to a temporary sibling that is renamed into place, so readers in other processes
/// always see either the old or the new contents in full. The revision is a hash of the file
/// contents: the rename that commits the data is the same step that changes the revision, so a
/// write can never land without being observable. Every mutation adds a timestamped event,
/// so successive collections never hash alike in practice.
#[derive(Clone, Debug)]
pub struct FileBackend {
    slot_path: PathBuf,
}

impl FileBackend {
    /// Opens (and if needed creates) the directory holding `slot_name`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidInput`] for an unusable slot name and
    /// [`FlowError::StorageDirCreation`] if `dir` cannot be created.
    pub fn new(dir: &Path, slot_name: &str) -> FlowResult<Self> {
        validate_slot_name(slot_name)?;
        fs::create_dir_all(dir).map_err(FlowError::StorageDirCreation)?;

        Ok(Self {
            slot_path: slot_file(dir, slot_name, SLOT_EXTENSION),
        })
    }

    pub fn slot_path(&self) -> &Path {
        &self.slot_path
    }

    fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("slot");
        let tmp = path.with_file_name(format!(
            ".{file_name}.{}.tmp",
            uuid::Uuid::new_v4().simple()
        ));

        fs::write(&tmp, contents)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(())
    }
}

impl FlowBackend for FileBackend {
    fn load(&self) -> FlowResult<Option<String>> {
        match fs::read_to_string(&self.slot_path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FlowError::StorageRead(e)),
        }
    }

    fn store(&self, contents: &str) -> FlowResult<u64> {
        Self::write_atomic(&self.slot_path, contents).map_err(FlowError::StorageWrite)?;
        Ok(content_revision(contents))
    }

    fn revision(&self) -> FlowResult<u64> {
        Ok(self.load()?.map_or(0, |contents| content_revision(&contents)))
    }
}

/// Revision of a written slot. Never `0`, which is reserved for "never written".
fn content_revision(contents: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    contents.hash(&mut hasher);
    hasher.finish().max(1)
}

// ============================================================================
// MEMORY BACKEND
// ============================================================================

#[derive(Debug, Default)]
struct MemorySlot {
    contents: Option<String>,
    revision: u64,
}

/// In-process slot. Clones share the same slot, so several stores built from clones of one
/// `MemoryBackend` behave like several dashboards open on one device.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    slot: Arc<RwLock<MemorySlot>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the slot with raw contents, as if another writer had stored them.
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(MemorySlot {
                contents: Some(contents.into()),
                revision: 1,
            })),
        }
    }

    /// Returns the raw slot contents.
    pub fn contents(&self) -> Option<String> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contents
            .clone()
    }
}

impl FlowBackend for MemoryBackend {
    fn load(&self) -> FlowResult<Option<String>> {
        Ok(self.contents())
    }

    fn store(&self, contents: &str) -> FlowResult<u64> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.contents = Some(contents.to_owned());
        slot.revision = slot.revision.wrapping_add(1);
        Ok(slot.revision)
    }

    fn revision(&self) -> FlowResult<u64> {
        Ok(self
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_backend_reports_missing_slot_as_none() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let backend = FileBackend::new(temp_dir.path(), "flow").unwrap();

        assert_eq!(backend.load().unwrap(), None);
        assert_eq!(backend.revision().unwrap(), 0);
    }

    #[test]
    fn file_backend_round_trips_contents_and_changes_revision() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let backend = FileBackend::new(temp_dir.path(), "flow").unwrap();

        let first = backend.store("[]").unwrap();
        assert_eq!(backend.load().unwrap().as_deref(), Some("[]"));
        assert_eq!(backend.revision().unwrap(), first);

        let second = backend.store("[1]").unwrap();
        assert_ne!(first, second);
        assert_eq!(backend.revision().unwrap(), second);
        assert!(temp_dir.path().join("flow.json").is_file());
    }

    #[test]
    fn file_backend_leaves_no_temporary_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let backend = FileBackend::new(temp_dir.path(), "flow").unwrap();
        backend.store("[]").unwrap();
        backend.store("[1]").unwrap();

        let names: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["flow.json".to_string()], "unexpected files: {names:?}");
    }

    #[test]
    fn file_backends_on_same_slot_see_each_other() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let a = FileBackend::new(temp_dir.path(), "flow").unwrap();
        let b = FileBackend::new(temp_dir.path(), "flow").unwrap();

        let rev = a.store("[\"x\"]").unwrap();
        assert_eq!(b.revision().unwrap(), rev);
        assert_eq!(b.load().unwrap().as_deref(), Some("[\"x\"]"));
    }

    #[test]
    fn file_backend_creates_nested_data_dir() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let nested = temp_dir.path().join("a").join("b");
        FileBackend::new(&nested, "flow").unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn file_backend_write_fails_when_dir_is_gone() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dir = temp_dir.path().join("data");
        let backend = FileBackend::new(&dir, "flow").unwrap();
        fs::remove_dir_all(&dir).unwrap();

        let err = backend.store("[]").unwrap_err();
        assert!(matches!(err, FlowError::StorageWrite(_)));
    }

    #[test]
    fn file_backend_failed_store_commits_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let backend = FileBackend::new(temp_dir.path(), "flow").unwrap();
        let other = FileBackend::new(temp_dir.path(), "flow").unwrap();
        let before = backend.store("[\"old\"]").unwrap();

        // A non-empty directory at the slot path makes the committing rename fail.
        let slot = temp_dir.path().join("flow.json");
        fs::remove_file(&slot).unwrap();
        fs::create_dir(&slot).unwrap();
        fs::write(slot.join("blocker"), "x").unwrap();

        let err = backend.store("[\"new\"]").unwrap_err();
        assert!(matches!(err, FlowError::StorageWrite(_)));

        fs::remove_dir_all(&slot).unwrap();
        assert_eq!(other.load().unwrap(), None);
        assert_eq!(other.revision().unwrap(), 0);
        assert_ne!(before, 0);

        let leftovers = fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(leftovers, 0, "temporary file left behind");
    }

    #[test]
    fn file_backend_revision_tracks_contents_written_by_anyone() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let backend = FileBackend::new(temp_dir.path(), "flow").unwrap();
        let ours = backend.store("[]").unwrap();

        fs::write(temp_dir.path().join("flow.json"), "[\"foreign\"]").unwrap();
        let theirs = backend.revision().unwrap();
        assert_ne!(ours, theirs);
        assert_ne!(theirs, 0);
    }

    #[test]
    fn memory_backend_clones_share_one_slot() {
        let a = MemoryBackend::new();
        let b = a.clone();
        assert_eq!(b.revision().unwrap(), 0);

        let rev = a.store("[]").unwrap();
        assert_eq!(b.revision().unwrap(), rev);
        assert_eq!(b.load().unwrap().as_deref(), Some("[]"));
    }
}
