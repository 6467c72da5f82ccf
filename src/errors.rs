use thiserror::Error;
use std::io;
use std::path::PathBuf;

/// Custom error types for AgroScan
#[derive(Error, Debug)]
pub enum AgroScanError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input buffer: {0}")]
    InvalidInput(String),

    #[error("Parameter '{name}' out of range: {value} (valid: {range})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        range: &'static str,
    },

    #[error("Computation failure: {0}")]
    Computation(String),

    #[error("CSV output error: {0}")]
    CsvOutput(#[from] csv::Error),

    #[error("JSON output error: {0}")]
    JsonOutput(#[from] serde_json::Error),

    #[error("Invalid input path: {0}")]
    InvalidPath(PathBuf),
}

impl AgroScanError {
    /// Whether the error stems from caller-supplied input (the external
    /// layer maps these to a 4xx-style response, everything else to 5xx).
    pub fn is_caller_fault(&self) -> bool {
        matches!(
            self,
            AgroScanError::InvalidInput(_)
                | AgroScanError::InvalidParameter { .. }
                | AgroScanError::Config(_)
                | AgroScanError::InvalidPath(_)
        )
    }
}

/// Type alias for Result with our custom error type
pub type Result<T> = std::result::Result<T, AgroScanError>;
