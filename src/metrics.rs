// src/metrics.rs

use crate::error::{Result, SourceError};
use image::{DynamicImage, GrayImage, Luma};
use serde::{Deserialize, Serialize};

// --- Per-frame thresholds ---

/// Laplacian variance below which a frame counts as blurry.
pub const MIN_CLARITY: f64 = 20.0;
/// Mean intensity below which a frame counts as under-exposed.
pub const MIN_EXPOSURE: f64 = 60.0;
/// Mean intensity above which a frame counts as over-exposed.
pub const MAX_EXPOSURE: f64 = 200.0;
/// Intensity standard deviation below which a frame counts as low contrast.
pub const MIN_CONTRAST: f64 = 25.0;

/// Image-quality measurements for one sampled frame.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FrameMetrics {
    /// Variance of the Laplacian response.
    pub clarity: f64,
    /// Mean grayscale intensity, 0-255.
    pub exposure: f64,
    /// Standard deviation of grayscale intensity.
    pub contrast: f64,
}

impl FrameMetrics {
    /// Measures a decoded frame of any pixel format, reducing colour to
    /// luma with BT.601 weights first.
    pub fn from_image(frame: &DynamicImage) -> Result<FrameMetrics> {
        match frame {
            DynamicImage::ImageLuma8(gray) => FrameMetrics::from_gray(gray),
            other => FrameMetrics::from_gray(&to_gray_bt601(other)),
        }
    }

    /// Measures a grayscale frame. Fails on a frame with no pixels.
    pub fn from_gray(gray: &GrayImage) -> Result<FrameMetrics> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Err(SourceError::Input(format!(
                "frame has no pixels ({}x{})",
                width, height
            )));
        }

        let (exposure, variance) = mean_and_variance(gray.as_raw().iter().map(|&p| p as f64));
        let clarity = laplacian_variance(gray);

        Ok(FrameMetrics {
            clarity,
            exposure,
            contrast: variance.sqrt(),
        })
    }

    pub fn is_blurry(&self) -> bool {
        self.clarity < MIN_CLARITY
    }

    pub fn is_under_exposed(&self) -> bool {
        self.exposure < MIN_EXPOSURE
    }

    /// Only meaningful when the frame is not under-exposed; the two
    /// exposure failures are counted exclusively.
    pub fn is_over_exposed(&self) -> bool {
        self.exposure > MAX_EXPOSURE
    }

    pub fn is_low_contrast(&self) -> bool {
        self.contrast < MIN_CONTRAST
    }
}

// BT.601 luma weights in 14-bit fixed point, rounded.
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;

/// `0.299 R + 0.587 G + 0.114 B`, rounded to the nearest level.
pub fn to_gray_bt601(frame: &DynamicImage) -> GrayImage {
    let rgb = frame.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = r as u32 * LUMA_R + g as u32 * LUMA_G + b as u32 * LUMA_B;
        Luma([((luma + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8])
    })
}

/// Population mean and variance in two passes.
fn mean_and_variance<I>(values: I) -> (f64, f64)
where
    I: Iterator<Item = f64> + Clone,
{
    let (sum, count) = values.clone().fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = sum / count as f64;
    let var = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;
    (mean, var)
}

/// Maps an out-of-range neighbour index back into the image by mirroring
/// around the edge pixel (edge pixel not repeated).
fn reflect_101(i: i64, len: i64) -> u32 {
    if len == 1 {
        return 0;
    }
    let mirrored = if i < 0 {
        -i
    } else if i >= len {
        2 * len - i - 2
    } else {
        i
    };
    mirrored as u32
}

/// Variance of the 4-neighbour Laplacian (kernel `[0 1 0; 1 -4 1; 0 1 0]`)
/// over the whole frame.
fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    let (w, h) = (width as i64, height as i64);
    let px = |x: i64, y: i64| -> f64 {
        gray.get_pixel(reflect_101(x, w), reflect_101(y, h))[0] as f64
    };

    let mut responses = Vec::with_capacity((width * height) as usize);
    for y in 0..h {
        for x in 0..w {
            let neighbours = px(x - 1, y) + px(x + 1, y) + px(x, y - 1) + px(x, y + 1);
            responses.push(neighbours - 4.0 * px(x, y));
        }
    }

    let (_, variance) = mean_and_variance(responses.iter().copied());
    variance
}
