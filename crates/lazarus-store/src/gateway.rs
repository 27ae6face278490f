//! Durable storage for snapshots.
//!
//! The [`StorageGateway`] maps a save-slot key to a file under
//! `<root>/lazarus/<sanitized-key>.json` and reads or writes whole snapshots
//! through the [`codec`](crate::codec).
//!
//! Hosts may deny durable I/O altogether. A gateway built with
//! [`StorageGateway::disabled`] reports [`available`](StorageGateway::available)
//! as `false` and every operation returns [`StoreError::IoUnavailable`]
//! without touching the filesystem.
//!
//! Writes are atomic: the encoded snapshot goes to a sibling `.tmp` file
//! which then replaces the target, so a crash mid-save leaves the previous
//! snapshot intact.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec;
use crate::snapshot::Snapshot;
use crate::StoreError;

/// Subdirectory under the storage root holding every save file.
pub const SAVE_SUBDIR: &str = "lazarus";
/// File stem used when a key sanitizes to nothing.
pub const FALLBACK_KEY: &str = "scenario";
/// Save file extension.
pub const SAVE_EXTENSION: &str = "json";

// ---------------------------------------------------------------------------
// StorageGateway
// ---------------------------------------------------------------------------

/// Path resolution and snapshot I/O, guarded by host availability.
#[derive(Debug, Clone)]
pub struct StorageGateway {
    root: Option<PathBuf>,
}

impl StorageGateway {
    /// A gateway writing under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// A gateway for a host that denies durable I/O.
    pub fn disabled() -> Self {
        Self { root: None }
    }

    /// `true` if the host grants durable I/O.
    pub fn available(&self) -> bool {
        self.root.is_some()
    }

    /// Replace every character outside `[A-Za-z0-9]` with `_`; an empty key
    /// becomes [`FALLBACK_KEY`].
    pub fn sanitize_key(key: &str) -> String {
        if key.is_empty() {
            return FALLBACK_KEY.to_owned();
        }
        key.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }

    /// Resolve the save file for `key`, creating the save directory if it
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// [`StoreError::IoUnavailable`] when storage is disabled, or
    /// [`StoreError::Io`] if the directory cannot be created.
    pub fn resolve_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let root = self.root.as_ref().ok_or(StoreError::IoUnavailable)?;
        let dir = root.join(SAVE_SUBDIR);
        // create_dir_all already tolerates an existing directory.
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir.join(format!("{}.{SAVE_EXTENSION}", Self::sanitize_key(key))))
    }

    /// Encode and atomically write a snapshot.
    ///
    /// # Errors
    ///
    /// [`StoreError::IoUnavailable`], [`StoreError::Parse`] if the snapshot
    /// cannot be encoded, or [`StoreError::Io`].
    pub fn write_snapshot(&self, path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
        if !self.available() {
            return Err(StoreError::IoUnavailable);
        }
        let text = codec::encode(snapshot)?;
        write_atomic(path, text.as_bytes()).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), bytes = text.len(), "snapshot written");
        Ok(())
    }

    /// Read and decode a snapshot.
    ///
    /// # Errors
    ///
    /// [`StoreError::IoUnavailable`], [`StoreError::NotFound`] if no file
    /// exists at `path`, [`StoreError::Parse`] on malformed content, or
    /// [`StoreError::Io`] for other read failures.
    pub fn read_snapshot(&self, path: &Path) -> Result<Snapshot, StoreError> {
        if !self.available() {
            return Err(StoreError::IoUnavailable);
        }
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        codec::decode(&text)
    }
}

// ---------------------------------------------------------------------------
// Atomic write
// ---------------------------------------------------------------------------

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path_for(path);
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("snapshot");
    path.with_file_name(format!("{name}.tmp"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use lazarus_world::scenario::Transform;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn sanitize_replaces_non_alphanumerics() {
        assert_eq!(StorageGateway::sanitize_key("Op Anvil: v2!"), "Op_Anvil__v2_");
        assert_eq!(StorageGateway::sanitize_key("../etc"), "___etc");
        assert_eq!(StorageGateway::sanitize_key(""), FALLBACK_KEY);
    }

    #[test]
    fn resolve_path_creates_directory_idempotently() {
        let temp = TempDir::new().expect("tempdir");
        let gw = StorageGateway::new(temp.path());
        let a = gw.resolve_path("Op Anvil").unwrap();
        let b = gw.resolve_path("Op Anvil").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, temp.path().join("lazarus").join("Op_Anvil.json"));
        assert!(temp.path().join("lazarus").is_dir());
    }

    #[test]
    fn write_then_read_round_trips() {
        let temp = TempDir::new().expect("tempdir");
        let gw = StorageGateway::new(temp.path());
        let path = gw.resolve_path("k").unwrap();

        let mut snap = Snapshot::default();
        snap.dead_statics.insert("Depot".to_owned());
        snap.unit_pos
            .insert("T".to_owned(), Transform::new(1.0, 2.0, 3.0, 0.5));
        gw.write_snapshot(&path, &snap).unwrap();

        assert_eq!(gw.read_snapshot(&path).unwrap(), snap);
        assert!(!temp_path_for(&path).exists(), "temp file cleaned up");
    }

    #[test]
    fn missing_file_is_not_found() {
        let temp = TempDir::new().expect("tempdir");
        let gw = StorageGateway::new(temp.path());
        let path = gw.resolve_path("never-written").unwrap();
        assert!(matches!(
            gw.read_snapshot(&path),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn corrupt_file_is_parse_error() {
        let temp = TempDir::new().expect("tempdir");
        let gw = StorageGateway::new(temp.path());
        let path = gw.resolve_path("corrupt").unwrap();
        fs::write(&path, "deadUnits = { ['Tank-1'] = true }").unwrap();
        assert!(matches!(
            gw.read_snapshot(&path),
            Err(StoreError::Parse { .. })
        ));
    }

    #[test]
    fn disabled_gateway_refuses_everything() {
        let gw = StorageGateway::disabled();
        assert!(!gw.available());
        assert!(matches!(
            gw.resolve_path("k"),
            Err(StoreError::IoUnavailable)
        ));
        let path = PathBuf::from("unused.json");
        assert!(matches!(
            gw.write_snapshot(&path, &Snapshot::default()),
            Err(StoreError::IoUnavailable)
        ));
        assert!(matches!(
            gw.read_snapshot(&path),
            Err(StoreError::IoUnavailable)
        ));
        assert!(!path.exists());
    }

    #[test]
    fn overwrite_replaces_previous_snapshot() {
        let temp = TempDir::new().expect("tempdir");
        let gw = StorageGateway::new(temp.path());
        let path = gw.resolve_path("k").unwrap();

        let mut first = Snapshot::default();
        first.dead_units.insert("A".to_owned());
        gw.write_snapshot(&path, &first).unwrap();

        let mut second = Snapshot::default();
        second.dead_units.insert("B".to_owned());
        gw.write_snapshot(&path, &second).unwrap();

        assert_eq!(gw.read_snapshot(&path).unwrap(), second);
    }
}
