use crate::model::SessionId;
use sha2::{Digest, Sha256};

const SNAPSHOT_EXTENSION: &str = "json";
const TEMP_PREFIX: &str = ".snapshot-";

/// Deterministic snapshot file name for a session.
/// Only the identifier feeds the name, so no client text reaches the filesystem.
pub fn snapshot_file_name(session: &SessionId) -> String {
    let s = format!("snapshot:{session}");
    format!("{}.{SNAPSHOT_EXTENSION}", hex_sha(&s))
}

/// Prefix used for in-flight temporary files that are renamed into place.
pub(crate) fn temp_file_prefix() -> &'static str {
    TEMP_PREFIX
}

pub(crate) fn is_snapshot_file_name(name: &str) -> bool {
    name.strip_suffix(SNAPSHOT_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))
        .map(|stem| stem.len() == 64 && stem.bytes().all(|b| b.is_ascii_hexdigit()))
        .unwrap_or(false)
}

fn hex_sha(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
