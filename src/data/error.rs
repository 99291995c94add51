use thiserror::Error;

/// Fatal pipeline failures. A lookup miss is not one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Unsupported file format '.{extension}'. Please upload a .csv, .txt or .fits file.")]
    UnsupportedFormat { extension: String },

    #[error("Could not read {source_name}: {message}")]
    Io { source_name: String, message: String },

    #[error("Expected at least {expected} columns, but got {actual}. Please check your data format.")]
    Schema { expected: usize, actual: usize },
}

impl PipelineError {
    pub fn io(source_name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        PipelineError::Io {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for data-layer operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
