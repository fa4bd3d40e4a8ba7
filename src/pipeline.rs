// src/pipeline.rs

use crate::analyzer::{analyze, AnalysisStats};
use crate::error::AnalysisError;
use crate::ffmpeg::FfmpegSource;
use crate::source::FrameSource;
use crate::summary::quality_summary;
use crate::validator::{validate, CheckDetails, QualityPercentages, ValidationResult};
use chrono::{SecondsFormat, Utc};
use log::{error, info, warn};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::path::Path;

pub const DEFAULT_SAMPLE_RATE: u32 = 30;

/// Knobs for one validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub sample_rate: u32,
    pub start_frame: u64,
    pub end_frame: Option<u64>,
    pub include_summary: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            sample_rate: DEFAULT_SAMPLE_RATE,
            start_frame: 0,
            end_frame: None,
            include_summary: false,
        }
    }
}

/// Verdict label derived from `passed`.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Good,
    Bad,
}

impl Status {
    pub fn from_passed(passed: bool) -> Status {
        if passed { Status::Good } else { Status::Bad }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Good => "good",
            Status::Bad => "bad",
        }
    }
}

/// The single record returned for a validation run.
///
/// Terminal failures leave `details` and `stats` unset; they serialize as
/// empty objects so the record keeps one flat shape.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub passed: bool,
    pub status: Status,
    pub analyze_success: bool,
    pub validate_success: bool,
    pub message: String,
    pub analyze_message: String,
    pub validate_message: String,
    pub issues: Vec<String>,
    #[serde(serialize_with = "empty_map_if_none")]
    pub details: Option<CheckDetails>,
    #[serde(serialize_with = "empty_map_if_none")]
    pub stats: Option<QualityPercentages>,
    pub summary: String,
    pub video_path: String,
    pub created_at: String,
}

fn empty_map_if_none<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(inner) => inner.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

impl PipelineOutput {
    fn analyze_failed(video_path: String, created_at: String, err: &AnalysisError) -> Self {
        let message = err.to_string();
        PipelineOutput {
            passed: false,
            status: Status::Bad,
            analyze_success: false,
            validate_success: false,
            message: message.clone(),
            analyze_message: message,
            validate_message: String::new(),
            issues: Vec::new(),
            details: None,
            stats: None,
            summary: String::new(),
            video_path,
            created_at,
        }
    }

    fn validate_failed(
        video_path: String,
        created_at: String,
        analyze_message: String,
        validate_message: String,
    ) -> Self {
        PipelineOutput {
            passed: false,
            status: Status::Bad,
            analyze_success: true,
            validate_success: false,
            message: format!("{}\n\n{}", analyze_message, validate_message),
            analyze_message,
            validate_message,
            issues: Vec::new(),
            details: None,
            stats: None,
            summary: String::new(),
            video_path,
            created_at,
        }
    }

    fn completed(
        video_path: String,
        created_at: String,
        analyze_message: String,
        validation: ValidationResult,
        summary: String,
    ) -> Self {
        let validate_message = validation.message();
        PipelineOutput {
            passed: validation.passed,
            status: Status::from_passed(validation.passed),
            analyze_success: true,
            validate_success: true,
            message: format!("{}\n\n{}", analyze_message, validate_message),
            analyze_message,
            validate_message,
            issues: validation.issues,
            details: Some(validation.details),
            stats: Some(validation.stats),
            summary,
            video_path,
            created_at,
        }
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Opens `path` with ffmpeg and validates it. Never fails: every error is
/// folded into a terminal record.
pub fn run<P>(path: &Path, options: &RunOptions, progress: Option<P>) -> PipelineOutput
where
    P: FnMut(usize, usize),
{
    let created_at = timestamp();
    let video_path = path.display().to_string();
    info!("Validating {}", video_path);

    match FfmpegSource::open(path) {
        Ok(source) => execute(source, video_path, created_at, options, progress),
        Err(e) => {
            let err = AnalysisError::Unopenable(e);
            error!("Analysis of {} failed: {:?}", video_path, err);
            PipelineOutput::analyze_failed(video_path, created_at, &err)
        }
    }
}

/// Validates an already-open frame source. `label` becomes `video_path`.
pub fn run_with_source<S, P>(
    source: S,
    label: &str,
    options: &RunOptions,
    progress: Option<P>,
) -> PipelineOutput
where
    S: FrameSource,
    P: FnMut(usize, usize),
{
    execute(source, label.to_string(), timestamp(), options, progress)
}

fn execute<S, P>(
    source: S,
    video_path: String,
    created_at: String,
    options: &RunOptions,
    progress: Option<P>,
) -> PipelineOutput
where
    S: FrameSource,
    P: FnMut(usize, usize),
{
    let stats: AnalysisStats = match analyze(
        source,
        options.sample_rate,
        options.start_frame,
        options.end_frame,
        progress,
    ) {
        Ok(stats) => stats,
        Err(err) => {
            error!("Analysis of {} failed: {}", video_path, err);
            return PipelineOutput::analyze_failed(video_path, created_at, &err);
        }
    };
    let analyze_message = stats.message();

    let validation = match validate(&stats) {
        Ok(v) => v,
        Err(err) => {
            error!("Validation of {} failed: {}", video_path, err);
            return PipelineOutput::validate_failed(
                video_path,
                created_at,
                analyze_message,
                err.to_string(),
            );
        }
    };

    let summary = if options.include_summary {
        quality_summary(&stats, &validation).unwrap_or_else(|e| {
            warn!("Summary generation failed, leaving it empty: {}", e);
            String::new()
        })
    } else {
        String::new()
    };

    info!(
        "{} is {} ({} issue(s))",
        video_path,
        Status::from_passed(validation.passed).as_str(),
        validation.issues.len()
    );
    PipelineOutput::completed(video_path, created_at, analyze_message, validation, summary)
}

/// Convenience entry point for callers that only want JSON.
pub fn validate_video_file(path: &Path, options: &RunOptions) -> serde_json::Value {
    let output = run(path, options, None::<fn(usize, usize)>);
    serde_json::to_value(&output).unwrap_or_else(|e| {
        error!("Failed to serialize result for {}: {}", path.display(), e);
        serde_json::Value::Null
    })
}
