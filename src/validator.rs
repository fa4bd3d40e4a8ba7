// src/validator.rs

use crate::analyzer::AnalysisStats;
use crate::error::ValidationError;
use log::{debug, info};
use serde::{Deserialize, Serialize};

// --- Percentage thresholds (share of analyzed frames allowed to fail) ---

pub const MAX_BLURRY_PCT: f64 = 10.0;
pub const MAX_EXPOSURE_PCT: f64 = 10.0;
pub const MAX_LOW_CONTRAST_PCT: f64 = 10.0;

/// Failure rates as percentages (0-100) of analyzed frames.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct QualityPercentages {
    pub blurry_pct: f64,
    /// Under- plus over-exposed.
    pub exposure_pct: f64,
    pub under_exposed_pct: f64,
    pub over_exposed_pct: f64,
    pub low_contrast_pct: f64,
}

impl QualityPercentages {
    pub fn from_stats(stats: &AnalysisStats) -> QualityPercentages {
        let pct = |count: usize| (100 * count) as f64 / stats.num_images as f64;
        let under_exposed_pct = pct(stats.under_exposed);
        let over_exposed_pct = pct(stats.over_exposed);
        QualityPercentages {
            blurry_pct: pct(stats.blurry),
            exposure_pct: under_exposed_pct + over_exposed_pct,
            under_exposed_pct,
            over_exposed_pct,
            low_contrast_pct: pct(stats.low_contrast),
        }
    }
}

/// Detail lines per check. Field order is the check order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckDetails {
    pub clarity: Vec<String>,
    pub exposure: Vec<String>,
    pub contrast: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub passed: bool,
    pub issues: Vec<String>,
    pub details: CheckDetails,
    pub stats: QualityPercentages,
}

impl ValidationResult {
    /// Banner plus one bullet per issue.
    pub fn message(&self) -> String {
        if self.passed {
            return "✓ Validation passed!\n\nAll visual quality checks meet the standards."
                .to_string();
        }

        let mut msg = String::from("✗ Validation failed\n\nThe following issues were found:\n\n");
        for issue in &self.issues {
            msg.push_str(&format!("  • {}\n", issue));
        }
        msg.push_str(&format!("\nA total of {} issues were found.", self.issues.len()));
        msg
    }
}

/// Compares failure rates against the percentage thresholds.
///
/// Checks run in a fixed order (clarity, exposure, contrast), which is also
/// the order of `issues`. A rate exactly at its threshold passes.
pub fn validate(stats: &AnalysisStats) -> Result<ValidationResult, ValidationError> {
    if stats.num_images == 0 {
        return Err(ValidationError::NoData);
    }

    let pct = QualityPercentages::from_stats(stats);
    debug!("Failure rates: {:?}", pct);

    let mut issues = Vec::new();
    let mut details = CheckDetails::default();

    if pct.blurry_pct > MAX_BLURRY_PCT {
        let issue = format!(
            "Clarity: {:.1}% of frames are blurry (threshold: {:.1}%)",
            pct.blurry_pct, MAX_BLURRY_PCT
        );
        issues.push(issue.clone());
        details.clarity.push(issue);
    }

    if pct.exposure_pct > MAX_EXPOSURE_PCT {
        let issue = format!(
            "Exposure: {:.1}% of frames have exposure issues (threshold: {:.1}%)",
            pct.exposure_pct, MAX_EXPOSURE_PCT
        );
        issues.push(issue.clone());
        details.exposure.push(issue);

        // Breakdown lines are details only, never separate issues.
        if pct.under_exposed_pct > 0.0 {
            details
                .exposure
                .push(format!("  - Under-exposed: {:.1}%", pct.under_exposed_pct));
        }
        if pct.over_exposed_pct > 0.0 {
            details
                .exposure
                .push(format!("  - Over-exposed: {:.1}%", pct.over_exposed_pct));
        }
    }

    if pct.low_contrast_pct > MAX_LOW_CONTRAST_PCT {
        let issue = format!(
            "Contrast: {:.1}% of frames have low contrast (threshold: {:.1}%)",
            pct.low_contrast_pct, MAX_LOW_CONTRAST_PCT
        );
        issues.push(issue.clone());
        details.contrast.push(issue);
    }

    let passed = issues.is_empty();
    info!(
        "Validation {} with {} issue(s)",
        if passed { "passed" } else { "failed" },
        issues.len()
    );

    Ok(ValidationResult {
        passed,
        issues,
        details,
        stats: pct,
    })
}
