// src/ffmpeg.rs

use crate::error::{Result, SourceError};
use crate::source::FrameSource;
use image::{DynamicImage, GrayImage};
use log::{debug, error, info, warn};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub frame_count: u64,
    pub fps: f64,
}

impl VideoInfo {
    /// Bytes in one 8-bit grayscale frame.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

fn path_arg(video_path: &Path) -> Result<&str> {
    video_path
        .to_str()
        .ok_or_else(|| SourceError::Input("Invalid video path".to_string()))
}

/// Runs ffprobe to get video metadata.
pub fn get_video_info(video_path: &Path) -> Result<VideoInfo> {
    info!("Probing video file: {}", video_path.display());
    if !video_path.exists() {
        return Err(SourceError::Input(format!(
            "Input video file not found: {}",
            video_path.display()
        )));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,nb_frames,r_frame_rate:format=nb_frames",
            "-of", "json",
            path_arg(video_path)?,
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("ffprobe failed for {}: {}", video_path.display(), stderr);
        return Err(SourceError::Command(format!(
            "ffprobe failed for {}: {}",
            video_path.display(),
            stderr
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    debug!("ffprobe output for {}: {}", video_path.display(), stdout);

    let json: serde_json::Value = serde_json::from_str(&stdout)?;
    let stream = json["streams"]
        .get(0)
        .ok_or_else(|| SourceError::Parse("No video stream found in ffprobe output".to_string()))?;

    let width = stream["width"]
        .as_u64()
        .ok_or_else(|| SourceError::Parse("Missing width".to_string()))? as u32;
    let height = stream["height"]
        .as_u64()
        .ok_or_else(|| SourceError::Parse("Missing height".to_string()))? as u32;

    let frame_count = match stream["nb_frames"]
        .as_str()
        .or_else(|| json["format"]["nb_frames"].as_str())
        .and_then(|s| s.parse::<u64>().ok())
    {
        Some(count) => count,
        None => {
            // Some containers (e.g. MKV/WebM) carry no frame count; decode to count.
            info!(
                "Frame count not found in initial probe, running count_frames probe for {}",
                video_path.display()
            );
            count_frames(video_path)?
        }
    };

    let fps_str = stream["r_frame_rate"]
        .as_str()
        .ok_or_else(|| SourceError::Parse("Missing r_frame_rate".to_string()))?;
    let fps = parse_frame_rate(fps_str)?;

    info!(
        "Detected Info for {}: {}x{} @ {} fps, {} frames",
        video_path.display(),
        width,
        height,
        fps,
        frame_count
    );

    Ok(VideoInfo {
        path: video_path.to_path_buf(),
        width,
        height,
        frame_count,
        fps,
    })
}

fn count_frames(video_path: &Path) -> Result<u64> {
    let output = Command::new("ffprobe")
        .args([
            "-v", "error",
            "-count_frames",
            "-select_streams", "v:0",
            "-show_entries", "stream=nb_read_frames",
            "-of", "csv=p=0",
            path_arg(video_path)?,
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("ffprobe count_frames failed for {}: {}", video_path.display(), stderr);
        return Err(SourceError::Command(format!(
            "ffprobe count_frames failed for {}: {}",
            video_path.display(),
            stderr
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    debug!("ffprobe count_frames output for {}: {}", video_path.display(), stdout);

    if stdout.is_empty() || stdout == "N/A" {
        return Err(SourceError::Parse(format!(
            "Failed to count frames for {}",
            video_path.display()
        )));
    }

    stdout.parse::<u64>().map_err(|e| {
        SourceError::Parse(format!("Invalid frame count value '{}': {}", stdout, e))
    })
}

/// Parses frame rate string (e.g., "24000/1001") into f64.
pub fn parse_frame_rate(fps_str: &str) -> Result<f64> {
    match fps_str.split_once('/') {
        Some((num, den)) => {
            let num = num
                .parse::<f64>()
                .map_err(|_| SourceError::Parse(format!("Invalid FPS numerator: {}", num)))?;
            let den = den
                .parse::<f64>()
                .map_err(|_| SourceError::Parse(format!("Invalid FPS denominator: {}", den)))?;
            if den == 0.0 {
                Err(SourceError::Parse("FPS denominator cannot be zero".to_string()))
            } else {
                Ok(num / den)
            }
        }
        None => fps_str
            .parse::<f64>()
            .map_err(|_| SourceError::Parse(format!("Invalid FPS format: {}", fps_str))),
    }
}

/// ffmpeg arguments that stream the first video stream as raw 8-bit gray.
///
/// Rotation metadata is ignored so frames keep the probed `width`x`height`
/// layout; the metrics are invariant under quarter turns. Luma is expanded
/// to full range (0-255) rather than left at the limited 16-235 of most video.
fn decode_args(input: &str) -> Vec<&str> {
    vec![
        "-hide_banner",
        "-loglevel", "error",
        "-noautorotate",
        "-i", input,
        "-map", "0:v:0",
        "-vf", "scale=out_range=full,format=gray",
        "-f", "rawvideo",
        "-pix_fmt", "gray",
        "-",
    ]
}

/// Frame source that decodes through an `ffmpeg` child process.
///
/// ffmpeg converts every frame to 8-bit gray and streams raw pixels on
/// stdout. `grab` reads one frame's bytes into a scratch buffer, `retrieve`
/// wraps the buffer in an image. The child is killed and reaped on drop.
pub struct FfmpegSource {
    info: VideoInfo,
    child: Child,
    stdout: BufReader<ChildStdout>,
    buffer: Vec<u8>,
    position: u64,
    has_frame: bool,
}

impl FfmpegSource {
    pub fn open(video_path: &Path) -> Result<FfmpegSource> {
        let info = get_video_info(video_path)?;
        if info.frame_size() == 0 {
            return Err(SourceError::Parse(format!(
                "Video has no pixels: {}x{}",
                info.width, info.height
            )));
        }

        let args = decode_args(path_arg(video_path)?);
        info!("Running FFmpeg for frame decoding: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::Command("ffmpeg stdout was not captured".to_string()))?;

        Ok(FfmpegSource {
            buffer: vec![0; info.frame_size()],
            info,
            child,
            stdout: BufReader::new(stdout),
            position: 0,
            has_frame: false,
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }
}

impl FrameSource for FfmpegSource {
    fn frame_count(&self) -> u64 {
        self.info.frame_count
    }

    fn fps(&self) -> f64 {
        self.info.fps
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        if frame < self.position {
            return Err(SourceError::Input(format!(
                "Cannot seek backwards from frame {} to {}",
                self.position, frame
            )));
        }
        while self.position < frame {
            if !self.grab()? {
                break;
            }
        }
        self.has_frame = false;
        Ok(())
    }

    fn grab(&mut self) -> Result<bool> {
        match self.stdout.read_exact(&mut self.buffer) {
            Ok(()) => {
                self.position += 1;
                self.has_frame = true;
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                debug!("ffmpeg stream ended after {} frames", self.position);
                self.has_frame = false;
                Ok(false)
            }
            Err(e) => Err(SourceError::Io(e)),
        }
    }

    fn retrieve(&mut self) -> Result<DynamicImage> {
        let frame = self.position.saturating_sub(1);
        if !self.has_frame {
            return Err(SourceError::Decode {
                frame,
                reason: "no frame has been grabbed".to_string(),
            });
        }
        GrayImage::from_raw(self.info.width, self.info.height, self.buffer.clone())
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| SourceError::Decode {
                frame,
                reason: "frame buffer does not match video dimensions".to_string(),
            })
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            // Already exited is the normal case after a full walk.
            debug!("ffmpeg kill: {}", e);
        }
        match self.child.wait() {
            Ok(status) => debug!("ffmpeg exited with {}", status),
            Err(e) => warn!("Failed to reap ffmpeg for {}: {}", self.info.path.display(), e),
        }
    }
}
