// src/error.rs

use thiserror::Error;

/// Errors raised by a frame source (decoding collaborator).
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FFmpeg/FFprobe command failed: {0}")]
    Command(String),

    #[error("Failed to parse command output: {0}")]
    Parse(String),

    #[error("JSON processing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Failed to decode frame {frame}: {reason}")]
    Decode { frame: u64, reason: String },
}

/// Terminal failures of the frame walk.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Unable to open video file.")]
    Unopenable(#[source] SourceError),

    #[error("No frames were analyzed.")]
    NoFramesAnalyzed,

    #[error("Error occurred during analysis:\n\nsample rate must be a positive integer")]
    InvalidSampleRate,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No image data available for validation.")]
    NoData,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SummaryError {
    #[error("No {0} values recorded")]
    EmptySequence(&'static str),
}

// Define a standard Result type for the crate
pub type Result<T> = std::result::Result<T, SourceError>;
