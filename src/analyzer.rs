// src/analyzer.rs

use crate::error::AnalysisError;
use crate::metrics::FrameMetrics;
use crate::source::FrameSource;
use log::{debug, info, warn};
use serde::Serialize;

/// Accumulated results of one frame walk.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct AnalysisStats {
    // Raw per-frame values in frame order; only the summary reads these.
    pub clarity: Vec<f64>,
    pub exposure: Vec<f64>,
    pub contrast: Vec<f64>,

    pub num_images: usize,
    pub blurry: usize,
    pub under_exposed: usize,
    pub over_exposed: usize,
    pub low_contrast: usize,

    pub total_frames: u64,
    pub fps: f64,
    pub sample_rate: u32,
    /// Estimated number of samples in the requested range.
    pub frames_analyzed: usize,
    pub start_frame: u64,
    /// End of the walked range, already clamped to `total_frames`.
    pub end_frame: u64,
}

impl AnalysisStats {
    fn record(&mut self, metrics: &FrameMetrics) {
        self.clarity.push(metrics.clarity);
        if metrics.is_blurry() {
            self.blurry += 1;
        }

        self.exposure.push(metrics.exposure);
        if metrics.is_under_exposed() {
            self.under_exposed += 1;
        } else if metrics.is_over_exposed() {
            self.over_exposed += 1;
        }

        self.contrast.push(metrics.contrast);
        if metrics.is_low_contrast() {
            self.low_contrast += 1;
        }

        self.num_images += 1;
    }

    /// Human-readable account of what was walked.
    pub fn message(&self) -> String {
        format!(
            "Quality analysis completed.\n\n\
             Analyzed {}/{} frames (range: {}-{}, sampling every {} frames)",
            self.num_images,
            self.end_frame.saturating_sub(self.start_frame),
            self.start_frame,
            self.end_frame,
            self.sample_rate
        )
    }
}

/// Number of samples a stride of `sample_rate` takes from `[start, end)`.
pub fn estimated_samples(start: u64, end: u64, sample_rate: u32) -> usize {
    if sample_rate == 0 {
        return 0;
    }
    end.saturating_sub(start).div_ceil(sample_rate as u64) as usize
}

/// Walks `source` from `start_frame`, measuring every `sample_rate`-th frame.
///
/// `end_frame` is clamped to the source's frame count. Frames that fail to
/// decode or measure are logged and left out of the statistics. `progress`
/// is called after each measured frame with `(measured, estimated_total)`.
///
/// The source is consumed and released before this function returns.
pub fn analyze<S, P>(
    mut source: S,
    sample_rate: u32,
    start_frame: u64,
    end_frame: Option<u64>,
    mut progress: Option<P>,
) -> Result<AnalysisStats, AnalysisError>
where
    S: FrameSource,
    P: FnMut(usize, usize),
{
    if sample_rate == 0 {
        return Err(AnalysisError::InvalidSampleRate);
    }

    let total_frames = source.frame_count();
    let end_frame = end_frame.map_or(total_frames, |end| end.min(total_frames));
    let estimated = estimated_samples(start_frame, end_frame, sample_rate);

    info!(
        "Analyzing frames {}-{} of {} (every {} frames, ~{} samples)",
        start_frame, end_frame, total_frames, sample_rate, estimated
    );

    let mut stats = AnalysisStats {
        total_frames,
        fps: source.fps(),
        sample_rate,
        frames_analyzed: estimated,
        start_frame,
        end_frame,
        ..Default::default()
    };

    let mut frame_idx = 0;
    if start_frame > 0 {
        match source.seek(start_frame) {
            Ok(()) => frame_idx = start_frame,
            Err(e) => warn!("Failed to seek to frame {}: {}", start_frame, e),
        }
    }

    while frame_idx < end_frame {
        match source.grab() {
            Ok(true) => {}
            Ok(false) => {
                debug!("End of stream reached at frame {}", frame_idx);
                break;
            }
            Err(e) => {
                warn!("Failed to advance past frame {}: {}", frame_idx, e);
                break;
            }
        }

        // A failed seek leaves the walk at frame 0; those frames are only grabbed.
        if frame_idx >= start_frame && (frame_idx - start_frame) % sample_rate as u64 == 0 {
            let measured = source
                .retrieve()
                .and_then(|frame| FrameMetrics::from_image(&frame));
            match measured {
                Ok(metrics) => {
                    debug!(
                        "Frame {}: clarity={:.2} exposure={:.2} contrast={:.2}",
                        frame_idx, metrics.clarity, metrics.exposure, metrics.contrast
                    );
                    stats.record(&metrics);
                    if let Some(report) = progress.as_mut() {
                        report(stats.num_images, estimated);
                    }
                }
                Err(e) => warn!("Failed to analyze frame {}: {}", frame_idx, e),
            }
        }

        frame_idx += 1;
    }

    drop(source);

    if stats.num_images == 0 {
        warn!("No frames were analyzed in range {}-{}", start_frame, end_frame);
        return Err(AnalysisError::NoFramesAnalyzed);
    }

    info!(
        "Analyzed {} frames: {} blurry, {} under-exposed, {} over-exposed, {} low contrast",
        stats.num_images, stats.blurry, stats.under_exposed, stats.over_exposed, stats.low_contrast
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::source::MemorySource;
    use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
    use std::cell::Cell;
    use std::io;
    use std::rc::Rc;

    type NoProgress = fn(usize, usize);

    fn sharp() -> GrayImage {
        checker(40, 220)
    }

    fn checker(dark: u8, light: u8) -> GrayImage {
        GrayImage::from_fn(8, 8, |x, y| {
            if (x + y) % 2 == 0 { Luma([dark]) } else { Luma([light]) }
        })
    }

    /// Sharp frames whose mean intensity is `10 * index + 50`.
    fn graded(count: u8) -> Vec<GrayImage> {
        (0..count).map(|i| checker(i * 10, i * 10 + 100)).collect()
    }

    fn flat(value: u8) -> GrayImage {
        GrayImage::from_pixel(8, 8, Luma([value]))
    }

    struct Tracked {
        inner: MemorySource,
        released: Rc<Cell<bool>>,
        fail_seek: bool,
        /// Grabs succeed this many times, then error.
        fail_grab_after: Option<u64>,
        grabs: u64,
    }

    impl Tracked {
        fn new(inner: MemorySource) -> Self {
            Tracked {
                inner,
                released: Rc::new(Cell::new(false)),
                fail_seek: false,
                fail_grab_after: None,
                grabs: 0,
            }
        }
    }

    impl FrameSource for Tracked {
        fn frame_count(&self) -> u64 {
            self.inner.frame_count()
        }
        fn fps(&self) -> f64 {
            self.inner.fps()
        }
        fn seek(&mut self, frame: u64) -> crate::error::Result<()> {
            if self.fail_seek {
                return Err(SourceError::Input(format!("cannot seek to {}", frame)));
            }
            self.inner.seek(frame)
        }
        fn grab(&mut self) -> crate::error::Result<bool> {
            if self.fail_grab_after == Some(self.grabs) {
                return Err(SourceError::Io(io::Error::other("pipe closed")));
            }
            self.grabs += 1;
            self.inner.grab()
        }
        fn retrieve(&mut self) -> crate::error::Result<DynamicImage> {
            self.inner.retrieve()
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.released.set(true);
        }
    }

    #[test]
    fn samples_by_stride_from_start() {
        let frames = (0..10).map(|_| sharp()).collect();
        let source = MemorySource::from_gray(frames, 30.0);
        let stats = analyze(source, 3, 1, None, None::<NoProgress>).unwrap();
        // Frames 1, 4, 7.
        assert_eq!(stats.num_images, 3);
        assert_eq!(stats.frames_analyzed, 3);
        assert_eq!(stats.clarity.len(), 3);
        assert_eq!(stats.total_frames, 10);
        assert_eq!(stats.end_frame, 10);
        assert_eq!(stats.blurry, 0);
    }

    #[test]
    fn classifies_each_check_independently() {
        let frames = vec![flat(10), flat(250), flat(128), sharp()];
        let source = MemorySource::from_gray(frames, 25.0);
        let stats = analyze(source, 1, 0, None, None::<NoProgress>).unwrap();
        assert_eq!(stats.num_images, 4);
        assert_eq!(stats.blurry, 3);
        assert_eq!(stats.low_contrast, 3);
        assert_eq!(stats.under_exposed, 1);
        assert_eq!(stats.over_exposed, 1);
    }

    #[test]
    fn end_frame_is_clamped_to_frame_count() {
        let frames = (0..5).map(|_| sharp()).collect();
        let source = MemorySource::from_gray(frames, 25.0);
        let stats = analyze(source, 2, 0, Some(500), None::<NoProgress>).unwrap();
        assert_eq!(stats.end_frame, 5);
        assert_eq!(stats.num_images, 3);
    }

    #[test]
    fn end_frame_bounds_the_walk() {
        let frames = (0..20).map(|_| sharp()).collect();
        let source = MemorySource::from_gray(frames, 25.0);
        let stats = analyze(source, 5, 0, Some(10), None::<NoProgress>).unwrap();
        assert_eq!(stats.num_images, 2);
        assert!(
            stats
                .message()
                .contains("Analyzed 2/10 frames (range: 0-10, sampling every 5 frames)")
        );
    }

    #[test]
    fn corrupt_frames_are_skipped() {
        let frames = (0..4).map(|_| sharp()).collect();
        let source = MemorySource::from_gray(frames, 25.0).with_corrupt_frame(2);
        let stats = analyze(source, 1, 0, None, None::<NoProgress>).unwrap();
        assert_eq!(stats.num_images, 3);
        assert_eq!(stats.exposure.len(), 3);
    }

    #[test]
    fn stride_beyond_range_analyzes_first_frame_only() {
        let frames = (0..5).map(|_| sharp()).collect();
        let source = MemorySource::from_gray(frames, 25.0);
        let stats = analyze(source, 100, 0, None, None::<NoProgress>).unwrap();
        assert_eq!(stats.num_images, 1);
    }

    #[test]
    fn start_beyond_end_yields_no_frames() {
        let frames = (0..5).map(|_| sharp()).collect();
        let source = MemorySource::from_gray(frames, 25.0);
        let err = analyze(source, 1, 7, None, None::<NoProgress>).unwrap_err();
        assert!(matches!(err, AnalysisError::NoFramesAnalyzed));
    }

    #[test]
    fn empty_stream_yields_no_frames() {
        let source = MemorySource::from_gray(Vec::new(), 25.0);
        let err = analyze(source, 30, 0, None, None::<NoProgress>).unwrap_err();
        assert!(matches!(err, AnalysisError::NoFramesAnalyzed));
    }

    #[test]
    fn zero_sample_rate_is_rejected() {
        let source = MemorySource::from_gray(vec![sharp()], 25.0);
        let err = analyze(source, 0, 0, None, None::<NoProgress>).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidSampleRate));
    }

    #[test]
    fn short_stream_stops_at_end_of_stream() {
        let frames = (0..3).map(|_| sharp()).collect();
        let source = MemorySource::from_gray(frames, 25.0).with_frame_count(90);
        let stats = analyze(source, 1, 0, None, None::<NoProgress>).unwrap();
        assert_eq!(stats.num_images, 3);
        assert_eq!(stats.total_frames, 90);
        assert_eq!(stats.frames_analyzed, 90);
    }

    #[test]
    fn progress_is_strictly_increasing() {
        let frames = (0..12).map(|_| sharp()).collect();
        let source = MemorySource::from_gray(frames, 25.0).with_corrupt_frame(4);
        let mut calls = Vec::new();
        analyze(source, 2, 0, None, Some(|done, total| calls.push((done, total)))).unwrap();
        assert_eq!(calls, vec![(1, 6), (2, 6), (3, 6), (4, 6), (5, 6)]);
    }

    #[test]
    fn source_is_released_on_success_and_failure() {
        for frames in [vec![sharp()], Vec::new()] {
            let source = Tracked::new(MemorySource::from_gray(frames, 25.0));
            let released = Rc::clone(&source.released);
            let _ = analyze(source, 1, 0, None, None::<NoProgress>);
            assert!(released.get());
        }
    }

    #[test]
    fn failed_grab_ends_the_walk() {
        let mut source = Tracked::new(MemorySource::from_gray(graded(10), 25.0));
        source.fail_grab_after = Some(4);
        let released = Rc::clone(&source.released);
        let stats = analyze(source, 1, 0, None, None::<NoProgress>).unwrap();
        assert_eq!(stats.num_images, 4);
        assert_eq!(stats.exposure, vec![50.0, 60.0, 70.0, 80.0]);
        assert!(released.get());
    }

    #[test]
    fn failed_grab_before_any_sample_yields_no_frames() {
        let mut source = Tracked::new(MemorySource::from_gray(graded(5), 25.0));
        source.fail_grab_after = Some(0);
        let err = analyze(source, 1, 0, None, None::<NoProgress>).unwrap_err();
        assert!(matches!(err, AnalysisError::NoFramesAnalyzed));
    }

    #[test]
    fn failed_seek_still_samples_from_start_frame() {
        let mut source = Tracked::new(MemorySource::from_gray(graded(10), 25.0));
        source.fail_seek = true;
        let stats = analyze(source, 3, 3, None, None::<NoProgress>).unwrap();
        // Frames 3, 6 and 9; frames 0-2 are only grabbed.
        assert_eq!(stats.num_images, 3);
        assert_eq!(stats.exposure, vec![80.0, 110.0, 140.0]);
        assert_eq!(stats.frames_analyzed, 3);
    }

    #[test]
    fn successful_seek_samples_the_same_frames() {
        let source = MemorySource::from_gray(graded(10), 25.0);
        let stats = analyze(source, 3, 3, None, None::<NoProgress>).unwrap();
        assert_eq!(stats.exposure, vec![80.0, 110.0, 140.0]);
    }

    #[test]
    fn colour_frames_are_reduced_with_bt601_weights() {
        let red = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 0, 0])));
        let source = MemorySource::new(vec![red], 30.0);
        let stats = analyze(source, 1, 0, None, None::<NoProgress>).unwrap();
        assert_eq!(stats.exposure, vec![76.0]);
        assert_eq!(stats.under_exposed, 0);
    }

    #[test]
    fn estimated_samples_rounds_up() {
        assert_eq!(estimated_samples(0, 100, 30), 4);
        assert_eq!(estimated_samples(0, 90, 30), 3);
        assert_eq!(estimated_samples(10, 5, 30), 0);
        assert_eq!(estimated_samples(0, 10, 0), 0);
    }
}
