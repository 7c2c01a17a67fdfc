use crate::error::UploadError;
use crate::normalize::FileFormat;

/// Extensions accepted at the upload boundary.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["csv", "xlsx", "xls"];

/// Multipart field carrying the advertising table.
pub const ADS_FIELD: &str = "meta_ads_file";
/// Multipart field carrying the sales table.
pub const SALES_FIELD: &str = "sales_file";

/// One named file part as received from the client.
///
/// `file_name` is client supplied and only ever used to pick a parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Lower-cased text after the last `.` of the file name.
    pub fn extension(&self) -> Option<String> {
        file_extension(&self.file_name)
    }
}

pub fn file_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Checks one file part and returns the parser format it selects.
pub fn validate_part(
    field: &str,
    file: Option<&UploadedFile>,
    max_bytes: usize,
) -> Result<FileFormat, UploadError> {
    let Some(file) = file else {
        return Err(UploadError::MissingFile {
            field: field.to_string(),
        });
    };
    if file.file_name.trim().is_empty() {
        return Err(UploadError::EmptyFileName {
            field: field.to_string(),
        });
    }
    let disallowed = || UploadError::DisallowedExtension {
        file_name: file.file_name.clone(),
    };
    let ext = file.extension().ok_or_else(disallowed)?;
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(disallowed());
    }
    if file.bytes.len() > max_bytes {
        return Err(UploadError::TooLarge {
            file_name: file.file_name.clone(),
            limit: max_bytes,
            actual: file.bytes.len(),
        });
    }
    FileFormat::from_extension(&ext).map_err(|_| disallowed())
}
