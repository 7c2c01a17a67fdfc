use crate::error::StoreError;
use crate::model::{SessionId, Snapshot};

/// Persistent snapshot storage keyed by session identifier.
///
/// A store exclusively owns the persisted snapshot for each identifier. Writes
/// replace the whole snapshot; there is no merge. Implementations must keep
/// sessions independent: an operation on one identifier never touches, locks or
/// fails because of another identifier's snapshot.
pub trait SnapshotStore: Send + Sync + 'static {
    /// Replaces the snapshot for `session`. Readers observe either the previous
    /// snapshot or the new one, never a partial write.
    fn save(&self, session: &SessionId, snapshot: Snapshot) -> Result<(), StoreError>;

    /// Fetches the snapshot for `session`; `None` when nothing was uploaded yet.
    fn load(&self, session: &SessionId) -> Result<Option<Snapshot>, StoreError>;

    /// Removes the snapshot if present. Clearing an absent snapshot succeeds.
    fn clear(&self, session: &SessionId) -> Result<(), StoreError>;
}

/// Applies the write-path normalization shared by every backend.
pub(crate) fn sanitize_for_write(session: &SessionId, snapshot: &mut Snapshot) {
    snapshot.session = session.clone();
    snapshot.pair.fill_nulls();
    snapshot.refresh_meta();
}

/// Rejects snapshots written under an incompatible layout or for another session.
pub(crate) fn check_loaded(session: &SessionId, snapshot: &Snapshot) -> Result<(), StoreError> {
    if snapshot.version != crate::model::SNAPSHOT_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: snapshot.version,
            expected: crate::model::SNAPSHOT_VERSION,
        });
    }
    if &snapshot.session != session {
        return Err(StoreError::Corrupt {
            session: session.to_string(),
            detail: "snapshot belongs to a different session".into(),
        });
    }
    Ok(())
}
