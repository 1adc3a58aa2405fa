//! OpenCV backed capture device (feature `opencv`).

use crate::capture::CaptureDevice;
use crate::frame::{Frame, CHANNELS};
use crate::{Error, Result};
use log::{info, warn};
use opencv::{
    core::{self, Mat, CV_8UC3},
    prelude::*,
    videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// Webcam index
    Camera(i32),
    /// Video file path
    File(String),
}

/// Webcam or video file read through `VideoCapture`
pub struct Webcam {
    source: VideoSource,
    width: u32,
    height: u32,
    fps: f64,
    mirror: bool,
    capture: Option<VideoCapture>,
    raw: Mat,
    flipped: Mat,
}

impl Webcam {
    #[must_use]
    pub fn new(source: VideoSource, width: u32, height: u32, fps: f64, mirror: bool) -> Self {
        Self {
            source,
            width,
            height,
            fps,
            mirror,
            capture: None,
            raw: Mat::default(),
            flipped: Mat::default(),
        }
    }
}

fn mat_to_frame(mat: &Mat) -> Result<Frame> {
    if mat.typ() != CV_8UC3 {
        return Err(Error::FrameRead(format!(
            "Expected 8-bit BGR frame, got Mat type {}",
            mat.typ()
        )));
    }
    let width = usize::try_from(mat.cols())
        .map_err(|_| Error::FrameRead(format!("Invalid frame width {}", mat.cols())))?;
    let height = usize::try_from(mat.rows())
        .map_err(|_| Error::FrameRead(format!("Invalid frame height {}", mat.rows())))?;

    // A deep copy of a ROI or padded Mat is continuous
    let owned;
    let mat = if mat.is_continuous() {
        mat
    } else {
        owned = mat.try_clone()?;
        &owned
    };
    let data = mat.data_bytes()?.to_vec();
    Frame::new(width, height, data)
}

impl CaptureDevice for Webcam {
    fn configure(&mut self) -> Result<()> {
        let mut cap = match &self.source {
            VideoSource::Camera(index) => {
                info!("Opening camera {index}");
                let mut cap = VideoCapture::new(*index, videoio::CAP_ANY)?;
                // Reduce buffer size for lower latency (webcam only)
                cap.set(CAP_PROP_BUFFERSIZE, 1.0)?;
                cap
            }
            VideoSource::File(path) => {
                info!("Opening video file: {path}");
                VideoCapture::from_file(path, videoio::CAP_ANY)?
            }
        };
        if !cap.is_opened()? {
            return Err(Error::Device(format!("Failed to open {:?}", self.source)));
        }
        if matches!(self.source, VideoSource::Camera(_)) {
            cap.set(CAP_PROP_FRAME_WIDTH, f64::from(self.width))?;
            cap.set(CAP_PROP_FRAME_HEIGHT, f64::from(self.height))?;
            cap.set(CAP_PROP_FPS, self.fps)?;
        }
        self.capture = Some(cap);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame> {
        let cap = self
            .capture
            .as_mut()
            .ok_or_else(|| Error::Device("Webcam is not configured".to_string()))?;
        if !cap.read(&mut self.raw)? || self.raw.empty() {
            return Err(Error::FrameRead("No frame from capture device".to_string()));
        }
        if self.mirror {
            core::flip(&self.raw, &mut self.flipped, 1)?;
            mat_to_frame(&self.flipped)
        } else {
            mat_to_frame(&self.raw)
        }
    }

    fn cleanup(&mut self) {
        if let Some(mut cap) = self.capture.take() {
            if let Err(e) = cap.release() {
                warn!("Failed to release capture device: {e}");
            }
        }
    }

    fn name(&self) -> &str {
        match self.source {
            VideoSource::Camera(_) => "webcam",
            VideoSource::File(_) => "video_file",
        }
    }
}
