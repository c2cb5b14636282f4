use crate::config::UploadConfig;
use crate::error::AppError;
use std::path::Path;

/// Validation errors for uploaded documents
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid file extension: {extension} (allowed: {allowed:?})")]
    InvalidExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Empty file")]
    EmptyFile,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::FileTooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            other => AppError::InvalidInput(other.to_string()),
        }
    }
}

/// Upload validator
///
/// Applies the extension whitelist and the size ceiling. No content
/// inspection is done.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    max_file_size: usize,
    allowed_extensions: Vec<String>,
}

impl UploadValidator {
    pub fn new(max_file_size: usize, allowed_extensions: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(
            config.max_file_size_bytes,
            config.allowed_extensions.clone(),
        )
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate the filename and return its lowercase extension.
    pub fn validate_extension(&self, filename: &str) -> Result<String, ValidationError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| ValidationError::InvalidFilename(filename.to_string()))?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::InvalidExtension {
                extension,
                allowed: self.allowed_extensions.clone(),
            });
        }

        Ok(extension)
    }

    /// Reject names that could escape the owner's storage prefix. Repeated
    /// dots inside a name such as `scan..v2.pdf` are fine.
    pub fn validate_filename(&self, filename: &str) -> Result<(), ValidationError> {
        let trimmed = filename.trim();
        if trimmed.is_empty()
            || trimmed == "."
            || trimmed == ".."
            || trimmed.contains('/')
            || trimmed.contains('\\')
            || trimmed.chars().any(|c| c.is_control())
        {
            return Err(ValidationError::InvalidFilename(filename.to_string()));
        }
        Ok(())
    }

    /// Run every check. The extension check runs first so a disallowed type is
    /// reported as such even when the body is also oversized.
    pub fn validate(&self, filename: &str, size: usize) -> Result<String, ValidationError> {
        self.validate_filename(filename)?;
        let extension = self.validate_extension(filename)?;
        self.validate_file_size(size)?;
        Ok(extension)
    }
}

/// Content type served for a stored document, by extension.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.trim_start_matches('.').to_lowercase().as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
