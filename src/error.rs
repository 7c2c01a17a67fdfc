use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type SessionResult<T> = Result<T, Error>;

/// Coarse classification used by transport layers to pick a status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    Expired,
    PayloadTooLarge,
    RateLimited,
    Unavailable,
    Internal,
}

/// Problems with the upload envelope, detected before any parsing happens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("file part `{field}` is missing")]
    MissingFile { field: String },
    #[error("file part `{field}` has an empty file name")]
    EmptyFileName { field: String },
    #[error("`{file_name}` is not a csv, xlsx or xls file")]
    DisallowedExtension { file_name: String },
    #[error("`{file_name}` is {actual} bytes, limit is {limit}")]
    TooLarge {
        file_name: String,
        limit: usize,
        actual: usize,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unsupported file format")]
    UnsupportedFormat,
    #[error("{0}")]
    ParseFailure(String),
    #[error("column `{column}` has {found} cells, expected {expected}")]
    RaggedColumns {
        column: String,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{op} failed for {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode snapshot: {0}")]
    Encode(String),
    #[error("snapshot for session {session} is corrupt: {detail}")]
    Corrupt { session: String, detail: String },
    #[error("snapshot version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is unknown")]
    Unknown,
    #[error("session has expired")]
    Expired,
    #[error("session was cleared")]
    Cleared,
    #[error("no datasets uploaded for this session")]
    NoDataset,
}

/// Failures reported by the external reasoning service.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("api failure: {0}")]
    Api(String),
    #[error("reasoning service is not configured")]
    NotConfigured,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("{file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: ParseError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("context is {actual} characters, limit is {limit}")]
    PayloadTooLarge { limit: usize, actual: usize },
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Upload(UploadError::TooLarge { .. }) => ErrorCode::PayloadTooLarge,
            Error::Upload(_) | Error::Parse { .. } | Error::InvalidInput(_) => {
                ErrorCode::InvalidInput
            }
            Error::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            Error::Session(SessionError::Expired) | Error::Session(SessionError::Cleared) => {
                ErrorCode::Expired
            }
            Error::Session(_) => ErrorCode::NotFound,
            Error::Store(StoreError::Corrupt { .. })
            | Error::Store(StoreError::UnsupportedVersion { .. }) => ErrorCode::InvalidInput,
            Error::Store(_) => ErrorCode::Internal,
            Error::Api(ApiError::RateLimited) => ErrorCode::RateLimited,
            Error::Api(ApiError::Connection(_)) | Error::Api(ApiError::NotConfigured) => {
                ErrorCode::Unavailable
            }
            Error::Api(ApiError::Api(_)) => ErrorCode::Internal,
        }
    }

    /// True when repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Api(ApiError::RateLimited) | Error::Api(ApiError::Connection(_))
        )
    }

    /// Short text that is safe to hand back to the client.
    pub fn client_message(&self) -> String {
        match self {
            Error::Upload(err) => err.to_string(),
            Error::Parse { file, source } => format!("{file}: {source}"),
            Error::InvalidInput(reason) => reason.clone(),
            Error::PayloadTooLarge { .. } => {
                "The dataset is too large for a full analysis. Ask a question instead.".into()
            }
            Error::Store(StoreError::Corrupt { .. })
            | Error::Store(StoreError::UnsupportedVersion { .. }) => {
                "Error reading uploaded data. Please re-upload your files.".into()
            }
            Error::Store(_) => "Could not access stored data. Please try again.".into(),
            Error::Session(SessionError::NoDataset) => {
                "No data found. Please upload files first.".into()
            }
            Error::Session(_) => "Session not found or expired. Please upload files again.".into(),
            Error::Api(ApiError::RateLimited) => {
                "Rate limit exceeded. Please try again in a moment.".into()
            }
            Error::Api(ApiError::Connection(_)) => {
                "Connection to the analysis service failed. Please try again.".into()
            }
            Error::Api(ApiError::NotConfigured) => "The analysis service is not configured.".into(),
            Error::Api(ApiError::Api(_)) => "The analysis service returned an error.".into(),
        }
    }
}

pub(crate) fn io_error(
    op: &'static str,
    path: impl Into<PathBuf>,
) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.into();
    move |source| StoreError::Io { op, path, source }
}

pub(crate) fn invalid_input(reason: impl Into<String>) -> Error {
    Error::InvalidInput(reason.into())
}
