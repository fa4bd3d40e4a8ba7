// src/summary.rs
//
// Long-form, human-readable report over the raw per-frame metrics.

use crate::analyzer::AnalysisStats;
use crate::error::SummaryError;
use crate::validator::ValidationResult;
use std::fmt::Write;

const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation.
    pub std_dev: f64,
}

impl SeriesStats {
    pub fn from_values(name: &'static str, values: &[f64]) -> Result<SeriesStats, SummaryError> {
        if values.is_empty() {
            return Err(SummaryError::EmptySequence(name));
        }

        let count = values.len() as f64;
        let mean = values.iter().sum::<f64>() / count;
        let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count;

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Ok(SeriesStats {
            mean,
            median,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            std_dev: variance.sqrt(),
        })
    }
}

/// Qualitative bucket for a failure percentage.
pub fn rating(pct: f64) -> &'static str {
    if pct < 5.0 {
        "✓ Excellent"
    } else if pct < 15.0 {
        "⚠ Good"
    } else {
        "✗ Needs improvement"
    }
}

fn section_header(out: &mut String, title: &str) {
    let rule = "─".repeat(RULE_WIDTH);
    let _ = writeln!(out, "{}\n{}\n{}", rule, title, rule);
}

fn series_lines(out: &mut String, s: &SeriesStats) {
    let _ = writeln!(out, "  Mean: {:.2}", s.mean);
    let _ = writeln!(out, "  Median: {:.2}", s.median);
    let _ = writeln!(out, "  Min: {:.2}", s.min);
    let _ = writeln!(out, "  Max: {:.2}", s.max);
    let _ = writeln!(out, "  Std Dev: {:.2}", s.std_dev);
}

/// Formats means, medians, extremes and spread of the three metrics
/// alongside their failure counts and a rating per check.
pub fn quality_summary(
    stats: &AnalysisStats,
    validation: &ValidationResult,
) -> Result<String, SummaryError> {
    if stats.num_images == 0 {
        return Ok("No image data found.".to_string());
    }

    let clarity = SeriesStats::from_values("clarity", &stats.clarity)?;
    let exposure = SeriesStats::from_values("exposure", &stats.exposure)?;
    let contrast = SeriesStats::from_values("contrast", &stats.contrast)?;

    let pct = &validation.stats;
    let exposure_pct = pct.under_exposed_pct + pct.over_exposed_pct;
    let banner = "=".repeat(RULE_WIDTH);

    let mut out = String::new();
    let _ = writeln!(out, "{}\nVisual Quality Analysis Summary\n{}\n", banner, banner);

    let _ = writeln!(out, "Video Information:");
    let _ = writeln!(out, "  Total frames: {}", stats.total_frames);
    let _ = writeln!(out, "  Frame rate: {:.2} fps", stats.fps);
    let _ = writeln!(
        out,
        "  Frames analyzed: {} (sampled every {} frames)\n",
        stats.num_images, stats.sample_rate
    );

    section_header(&mut out, "Clarity Analysis (Laplacian Variance)");
    series_lines(&mut out, &clarity);
    let _ = writeln!(out, "  Blurry frames: {} ({:.1}%)", stats.blurry, pct.blurry_pct);
    let _ = writeln!(out, "  Rating: {}", rating(pct.blurry_pct));

    out.push('\n');
    section_header(&mut out, "Exposure Analysis (Mean Pixel Intensity)");
    series_lines(&mut out, &exposure);
    let _ = writeln!(
        out,
        "  Under-exposed: {} ({:.1}%)",
        stats.under_exposed, pct.under_exposed_pct
    );
    let _ = writeln!(out, "  Over-exposed: {} ({:.1}%)", stats.over_exposed, pct.over_exposed_pct);
    let _ = writeln!(out, "  Rating: {}", rating(exposure_pct));

    out.push('\n');
    section_header(&mut out, "Contrast Analysis (Pixel Intensity Std Dev)");
    series_lines(&mut out, &contrast);
    let _ = writeln!(out, "  Low contrast: {} ({:.1}%)", stats.low_contrast, pct.low_contrast_pct);
    let _ = writeln!(out, "  Rating: {}", rating(pct.low_contrast_pct));

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::validate;

    fn sample_stats() -> AnalysisStats {
        AnalysisStats {
            clarity: vec![10.0, 300.0, 50.0, 120.0],
            exposure: vec![50.0, 120.0, 130.0, 210.0],
            contrast: vec![20.0, 40.0, 60.0, 80.0],
            num_images: 4,
            blurry: 1,
            under_exposed: 1,
            over_exposed: 1,
            low_contrast: 1,
            total_frames: 120,
            fps: 29.97,
            sample_rate: 30,
            frames_analyzed: 4,
            start_frame: 0,
            end_frame: 120,
        }
    }

    #[test]
    fn series_stats_match_population_formulas() {
        let s = SeriesStats::from_values("contrast", &[20.0, 40.0, 60.0, 80.0]).unwrap();
        assert_eq!(s.mean, 50.0);
        assert_eq!(s.median, 50.0);
        assert_eq!(s.min, 20.0);
        assert_eq!(s.max, 80.0);
        assert_eq!(s.std_dev, 500.0f64.sqrt());
    }

    #[test]
    fn odd_length_median_is_middle_value() {
        let s = SeriesStats::from_values("clarity", &[9.0, 1.0, 5.0]).unwrap();
        assert_eq!(s.median, 5.0);
    }

    #[test]
    fn empty_series_is_an_error() {
        assert_eq!(
            SeriesStats::from_values("exposure", &[]),
            Err(SummaryError::EmptySequence("exposure"))
        );
    }

    #[test]
    fn ratings_bucket_at_five_and_fifteen() {
        assert_eq!(rating(4.9), "✓ Excellent");
        assert_eq!(rating(5.0), "⚠ Good");
        assert_eq!(rating(14.9), "⚠ Good");
        assert_eq!(rating(15.0), "✗ Needs improvement");
    }

    #[test]
    fn summary_reports_each_section() {
        let stats = sample_stats();
        let validation = validate(&stats).unwrap();
        let text = quality_summary(&stats, &validation).unwrap();

        assert!(text.starts_with(&"=".repeat(60)));
        assert!(text.contains("  Frame rate: 29.97 fps\n"));
        assert!(text.contains("  Frames analyzed: 4 (sampled every 30 frames)\n"));
        assert!(text.contains("Clarity Analysis (Laplacian Variance)\n"));
        assert!(text.contains("  Median: 85.00\n"));
        assert!(text.contains("  Blurry frames: 1 (25.0%)\n"));
        assert!(text.contains("  Over-exposed: 1 (25.0%)\n"));
        assert!(text.contains("  Rating: ✗ Needs improvement\n"));
        assert!(text.ends_with("  Rating: ✗ Needs improvement\n"));
    }

    #[test]
    fn summary_without_images_is_a_placeholder() {
        let stats = AnalysisStats::default();
        let validation = validate(&sample_stats()).unwrap();
        assert_eq!(quality_summary(&stats, &validation).unwrap(), "No image data found.");
    }

    #[test]
    fn inconsistent_stats_fail_the_summary() {
        let mut stats = sample_stats();
        stats.contrast.clear();
        let validation = validate(&sample_stats()).unwrap();
        assert!(quality_summary(&stats, &validation).is_err());
    }
}
