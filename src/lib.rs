#![forbid(unsafe_code)]

#[cfg(feature = "anthropic")]
pub mod anthropic;
pub mod config;
pub mod context;
pub mod error;
pub mod file_store;
pub mod inmemory;
pub mod lifecycle;
pub mod mapping;
pub mod model;
pub mod normalize;
pub mod reasoning;
pub mod store;
pub mod upload;
pub mod workspace;

pub use config::{SessionBackendConfig, WorkspaceConfig};
pub use error::{Error, ErrorCode, SessionResult};
pub use model::{DatasetPair, SessionId, Snapshot, Table};
pub use reasoning::ReasoningService;
pub use store::SnapshotStore;
pub use workspace::Workspace;

use error::StoreError;
use std::sync::Arc;

/// Builds the snapshot store selected by `config`.
pub fn create_snapshot_store(
    config: &SessionBackendConfig,
) -> Result<Arc<dyn SnapshotStore>, StoreError> {
    match config {
        SessionBackendConfig::InMemory => Ok(Arc::new(inmemory::InMemorySnapshotStore::new())),
        SessionBackendConfig::File { dir } => Ok(Arc::new(file_store::FileSnapshotStore::open(
            dir.clone(),
        )?)),
    }
}
