//! File-backed snapshot store.
//!
//! One JSON file per session lives directly under the store directory. The file
//! name is a digest of the session identifier (see [`crate::mapping`]). Writes go
//! to a temporary file in the same directory which is then renamed over the
//! target, so readers see either the old or the new snapshot.

use crate::error::{io_error, StoreError};
use crate::mapping::{is_snapshot_file_name, snapshot_file_name, temp_file_prefix};
use crate::model::{SessionId, Snapshot};
use crate::store::{check_loaded, sanitize_for_write, SnapshotStore};
use serde::Deserialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Temp files older than this are leftovers of an interrupted write.
const STALE_TEMP_AGE: Duration = Duration::from_secs(300);

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(io_error("create directory", &dir))?;
        let store = Self { dir };
        store.remove_stale_temp_files();
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot file for `session`, whether or not it exists.
    pub fn snapshot_path(&self, session: &SessionId) -> PathBuf {
        self.dir.join(snapshot_file_name(session))
    }

    /// Number of snapshot files currently on disk.
    pub fn snapshot_count(&self) -> Result<usize, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(io_error("list directory", &self.dir))?;
        let mut count = 0;
        for entry in entries {
            let entry = entry.map_err(io_error("list directory", &self.dir))?;
            if entry
                .file_name()
                .to_str()
                .map(is_snapshot_file_name)
                .unwrap_or(false)
            {
                count += 1;
            }
        }
        Ok(count)
    }

    fn remove_stale_temp_files(&self) {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return;
        };
        let now = SystemTime::now();
        for entry in entries.flatten() {
            let is_temp = entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with(temp_file_prefix()))
                .unwrap_or(false);
            if !is_temp {
                continue;
            }
            let stale = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .map(|age| age >= STALE_TEMP_AGE)
                .unwrap_or(false);
            if stale {
                if let Err(err) = fs::remove_file(entry.path()) {
                    warn!(
                        path = %entry.path().display(),
                        error = %err,
                        "failed to remove stale temp file"
                    );
                }
            }
        }
    }

    fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(snapshot).map_err(|err| StoreError::Encode(err.to_string()))
    }

    fn decode(session: &SessionId, bytes: &[u8]) -> Result<Snapshot, StoreError> {
        let corrupt = |err: serde_json::Error| StoreError::Corrupt {
            session: session.to_string(),
            detail: err.to_string(),
        };
        let probe: VersionProbe = serde_json::from_slice(bytes).map_err(corrupt)?;
        if probe.version != crate::model::SNAPSHOT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: probe.version,
                expected: crate::model::SNAPSHOT_VERSION,
            });
        }
        let snapshot: Snapshot = serde_json::from_slice(bytes).map_err(corrupt)?;
        check_loaded(session, &snapshot)?;
        Ok(snapshot)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, session: &SessionId, mut snapshot: Snapshot) -> Result<(), StoreError> {
        sanitize_for_write(session, &mut snapshot);
        let bytes = Self::encode(&snapshot)?;
        let path = self.snapshot_path(session);

        let mut temp = tempfile::Builder::new()
            .prefix(temp_file_prefix())
            .tempfile_in(&self.dir)
            .map_err(io_error("create temp file", &self.dir))?;
        temp.write_all(&bytes)
            .map_err(io_error("write temp file", temp.path()))?;
        temp.as_file()
            .sync_all()
            .map_err(io_error("sync temp file", temp.path()))?;
        temp.persist(&path).map_err(|err| StoreError::Io {
            op: "rename snapshot",
            path: path.clone(),
            source: err.error,
        })?;

        debug!(
            session = %session,
            path = %path.display(),
            bytes = bytes.len(),
            "snapshot saved"
        );
        Ok(())
    }

    fn load(&self, session: &SessionId) -> Result<Option<Snapshot>, StoreError> {
        let path = self.snapshot_path(session);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error("read snapshot", &path)(err)),
        };
        match Self::decode(session, &bytes) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                warn!(session = %session, error = %err, "snapshot could not be decoded");
                Err(err)
            }
        }
    }

    fn clear(&self, session: &SessionId) -> Result<(), StoreError> {
        let path = self.snapshot_path(session);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(session = %session, "snapshot removed");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error("remove snapshot", &path)(err)),
        }
    }
}
