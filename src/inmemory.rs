use crate::error::StoreError;
use crate::model::{SessionId, Snapshot};
use crate::store::{check_loaded, sanitize_for_write, SnapshotStore};
use dashmap::DashMap;

/// In-memory implementation backed by a concurrent hash map.
///
/// Applies the same write-path normalization as the file store, so both
/// backends return identical snapshots. Contents are lost on restart.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    entries: DashMap<SessionId, Snapshot>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn save(&self, session: &SessionId, mut snapshot: Snapshot) -> Result<(), StoreError> {
        sanitize_for_write(session, &mut snapshot);
        self.entries.insert(session.clone(), snapshot);
        Ok(())
    }

    fn load(&self, session: &SessionId) -> Result<Option<Snapshot>, StoreError> {
        let Some(entry) = self.entries.get(session) else {
            return Ok(None);
        };
        check_loaded(session, entry.value())?;
        Ok(Some(entry.value().clone()))
    }

    fn clear(&self, session: &SessionId) -> Result<(), StoreError> {
        self.entries.remove(session);
        Ok(())
    }
}
