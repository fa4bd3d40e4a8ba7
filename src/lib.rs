//! Video visual-quality validation.
//!
//! Samples frames from a video at a fixed stride, measures clarity
//! (Laplacian variance), exposure (mean intensity) and contrast (intensity
//! standard deviation), and turns the failure rates into a pass/fail record.

pub mod analyzer;
pub mod error;
pub mod ffmpeg;
pub mod metrics;
pub mod pipeline;
pub mod source;
pub mod summary;
pub mod validator;

pub use analyzer::{analyze, AnalysisStats};
pub use error::{AnalysisError, SourceError, SummaryError, ValidationError};
pub use metrics::FrameMetrics;
pub use pipeline::{run, run_with_source, validate_video_file, PipelineOutput, RunOptions, Status};
pub use source::{FrameSource, MemorySource};
pub use validator::{validate, CheckDetails, QualityPercentages, ValidationResult};
