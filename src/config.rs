use crate::context::{DEFAULT_PREVIEW_ROWS, DEFAULT_SAMPLE_ROWS};
use crate::error::{invalid_input, SessionResult};
use crate::lifecycle::DEFAULT_SESSION_TTL;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Upload size cap per file.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
/// Upper bound on a full-data context handed to the reasoning service.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 400_000;
pub const DEFAULT_DATA_DIR: &str = "session_data";

/// Where snapshots are kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionBackendConfig {
    InMemory,
    File { dir: PathBuf },
}

impl Default for SessionBackendConfig {
    fn default() -> Self {
        SessionBackendConfig::File {
            dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkspaceConfig {
    pub backend: SessionBackendConfig,
    pub session_ttl: Duration,
    pub max_upload_bytes: usize,
    pub sample_rows: usize,
    pub preview_rows: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_context_chars: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackendConfig::default(),
            session_ttl: DEFAULT_SESSION_TTL,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

impl WorkspaceConfig {
    /// Defaults overridden by process environment variables.
    pub fn from_env() -> SessionResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each known key.
    pub fn from_lookup<F>(lookup: F) -> SessionResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(dir) = lookup("SESSION_DATA_DIR") {
            config.backend = if dir == ":memory:" {
                SessionBackendConfig::InMemory
            } else {
                SessionBackendConfig::File { dir: dir.into() }
            };
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "SESSION_TTL_SECS")? {
            config.session_ttl = Duration::from_secs(secs);
        }
        if let Some(bytes) = parse_var(&lookup, "MAX_UPLOAD_BYTES")? {
            config.max_upload_bytes = bytes;
        }
        if let Some(rows) = parse_var(&lookup, "CONTEXT_SAMPLE_ROWS")? {
            config.sample_rows = rows;
        }
        if let Some(tokens) = parse_var(&lookup, "LLM_MAX_TOKENS")? {
            config.max_tokens = tokens;
        }
        if let Some(temperature) = parse_var(&lookup, "LLM_TEMPERATURE")? {
            config.temperature = temperature;
        }
        if let Some(chars) = parse_var(&lookup, "MAX_CONTEXT_CHARS")? {
            config.max_context_chars = chars;
        }
        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> SessionResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| invalid_input(format!("{key} has invalid value `{raw}`")))
}
