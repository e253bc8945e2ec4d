// src/utils/error.rs
use std::path::PathBuf;
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Line {line}: '{field}' label has no value")]
    EmptyField { field: &'static str, line: usize },

    #[error("Line {line}: year of study phrase without a 4-digit year")]
    MissingYear { line: usize },
}

/// Failures of the upstream text extraction for a single document.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF text extraction failed for {path}: {message}")]
    Pdf { path: PathBuf, message: String },

    #[error("Text extraction panicked for {path}: {message}")]
    Panicked { path: PathBuf, message: String },
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Input directory not found: {0}")]
    RootNotFound(PathBuf),

    #[error("Input path is not a directory: {0}")]
    NotADirectory(PathBuf),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Text extraction failed: {0}")]
    Source(#[from] SourceError),

    #[error("Batch run failed: {0}")]
    Batch(#[from] BatchError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
