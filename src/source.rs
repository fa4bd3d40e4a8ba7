// src/source.rs

use crate::error::{Result, SourceError};
use image::{DynamicImage, GrayImage};

/// A sequential, seekable stream of decoded frames.
///
/// Mirrors the grab/retrieve split of common capture APIs: `grab` advances
/// past the next frame as cheaply as the backend allows, `retrieve` decodes
/// the most recently grabbed frame in full. Dropping the source releases it.
pub trait FrameSource {
    /// Total number of frames the container reports.
    fn frame_count(&self) -> u64;

    /// Nominal frame rate.
    fn fps(&self) -> f64;

    /// Positions the stream so the next `grab` returns frame `frame`.
    fn seek(&mut self, frame: u64) -> Result<()>;

    /// Advances to the next frame. Returns `Ok(false)` at end of stream.
    fn grab(&mut self) -> Result<bool>;

    /// Decodes the frame last advanced to by `grab`.
    fn retrieve(&mut self) -> Result<DynamicImage>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn frame_count(&self) -> u64 {
        (**self).frame_count()
    }

    fn fps(&self) -> f64 {
        (**self).fps()
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        (**self).seek(frame)
    }

    fn grab(&mut self) -> Result<bool> {
        (**self).grab()
    }

    fn retrieve(&mut self) -> Result<DynamicImage> {
        (**self).retrieve()
    }
}

/// Frame source backed by frames already held in memory.
///
/// Useful when the caller has decoded the video itself, and for tests.
/// Individual frames can be marked undecodable to exercise the skip path.
#[derive(Debug, Clone)]
pub struct MemorySource {
    frames: Vec<Option<DynamicImage>>,
    declared_count: Option<u64>,
    fps: f64,
    position: usize,
    current: Option<usize>,
}

impl MemorySource {
    pub fn new(frames: Vec<DynamicImage>, fps: f64) -> Self {
        MemorySource {
            frames: frames.into_iter().map(Some).collect(),
            declared_count: None,
            fps,
            position: 0,
            current: None,
        }
    }

    pub fn from_gray(frames: Vec<GrayImage>, fps: f64) -> Self {
        Self::new(frames.into_iter().map(DynamicImage::ImageLuma8).collect(), fps)
    }

    /// Overrides the reported frame count. Containers sometimes report more
    /// frames than they actually deliver.
    pub fn with_frame_count(mut self, count: u64) -> Self {
        self.declared_count = Some(count);
        self
    }

    /// Makes `retrieve` fail for the frame at `index`.
    pub fn with_corrupt_frame(mut self, index: usize) -> Self {
        if let Some(slot) = self.frames.get_mut(index) {
            *slot = None;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for MemorySource {
    fn frame_count(&self) -> u64 {
        self.declared_count.unwrap_or(self.frames.len() as u64)
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        self.position = usize::try_from(frame)
            .unwrap_or(usize::MAX)
            .min(self.frames.len());
        self.current = None;
        Ok(())
    }

    fn grab(&mut self) -> Result<bool> {
        if self.position >= self.frames.len() {
            self.current = None;
            return Ok(false);
        }
        self.current = Some(self.position);
        self.position += 1;
        Ok(true)
    }

    fn retrieve(&mut self) -> Result<DynamicImage> {
        let index = self
            .current
            .ok_or_else(|| SourceError::Input("retrieve called before grab".to_string()))?;
        self.frames[index].clone().ok_or_else(|| SourceError::Decode {
            frame: index as u64,
            reason: "frame data is corrupt".to_string(),
        })
    }
}
