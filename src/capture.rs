//! Capture devices and the capture stage.

use crate::constants::CAPTURE_RETRY_DELAY_MS;
use crate::frame::{Frame, CHANNELS};
use crate::latch::BlockingLatch;
use crate::stage::StageTask;
use crate::{Error, Result};
use log::{debug, info};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A source of video frames
pub trait CaptureDevice: Send {
    /// Open and set up the device
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be opened
    fn configure(&mut self) -> Result<()>;

    /// Read the next frame, blocking until one is available
    ///
    /// # Errors
    ///
    /// Returns an error if this read failed
    fn read_frame(&mut self) -> Result<Frame>;

    /// Release the device
    fn cleanup(&mut self);

    /// Get device name
    fn name(&self) -> &str;
}

/// Producer stage: reads frames from a device into a frame latch
pub struct CaptureStage {
    device: Box<dyn CaptureDevice>,
    frames: Arc<BlockingLatch<Frame>>,
    retry_delay: Duration,
    frames_read: u64,
}

impl CaptureStage {
    #[must_use]
    pub fn new(device: Box<dyn CaptureDevice>, frames: Arc<BlockingLatch<Frame>>) -> Self {
        Self {
            device,
            frames,
            retry_delay: Duration::from_millis(CAPTURE_RETRY_DELAY_MS),
            frames_read: 0,
        }
    }
}

impl StageTask for CaptureStage {
    fn name(&self) -> &str {
        "capture"
    }

    fn configure(&mut self) -> Result<()> {
        info!("Opening capture device {}", self.device.name());
        self.device.configure()
    }

    fn perform_cycle(&mut self) -> Result<()> {
        match self.device.read_frame() {
            Ok(frame) => {
                self.frames.write(frame);
                self.frames_read += 1;
                Ok(())
            }
            Err(e) => {
                thread::sleep(self.retry_delay);
                Err(e)
            }
        }
    }

    fn cleanup(&mut self) {
        info!(
            "Closing capture device {} after {} frames",
            self.device.name(),
            self.frames_read
        );
        self.device.cleanup();
    }
}

/// Synthetic moving gradient at a fixed frame rate, for runs without a camera
pub struct TestPatternCamera {
    width: usize,
    height: usize,
    frame_interval: Duration,
    next_frame: Option<Instant>,
    frame_index: usize,
}

impl TestPatternCamera {
    /// # Errors
    ///
    /// Returns an error for an empty frame size or a non-positive fps
    pub fn new(width: usize, height: usize, fps: f64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!(
                "Test pattern size {width}x{height} is empty"
            )));
        }
        let frame_interval = Some(fps)
            .filter(|f| *f > 0.0)
            .and_then(|f| Duration::try_from_secs_f64(1.0 / f).ok())
            .ok_or_else(|| Error::InvalidInput(format!("Invalid fps: {fps}")))?;
        Ok(Self {
            width,
            height,
            frame_interval,
            next_frame: None,
            frame_index: 0,
        })
    }

    /// The pattern for frame number `index`: a diagonal gradient scrolling right
    ///
    /// # Errors
    ///
    /// Never fails for a camera built by [`TestPatternCamera::new`]
    pub fn pattern(&self, index: usize) -> Result<Frame> {
        let mut data = Vec::with_capacity(self.width * self.height * CHANNELS);
        for y in 0..self.height {
            for x in 0..self.width {
                let v = ((x + y + index) % 256) as u8;
                data.extend_from_slice(&[v, v / 2, 255 - v]);
            }
        }
        Frame::new(self.width, self.height, data)
    }
}

impl CaptureDevice for TestPatternCamera {
    fn configure(&mut self) -> Result<()> {
        debug!(
            "Test pattern {}x{} every {:?}",
            self.width, self.height, self.frame_interval
        );
        self.next_frame = Some(Instant::now());
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame> {
        let Some(due) = self.next_frame else {
            return Err(Error::Device("Test pattern camera is not configured".to_string()));
        };
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
        self.next_frame = Some(due.max(now) + self.frame_interval);

        let frame = self.pattern(self.frame_index)?;
        self.frame_index = self.frame_index.wrapping_add(1);
        Ok(frame)
    }

    fn cleanup(&mut self) {
        self.next_frame = None;
    }

    fn name(&self) -> &str {
        "test_pattern"
    }
}
