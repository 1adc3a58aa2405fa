//! Hand landmark detection.
//!
//! The landmark model itself runs outside this crate. [`SubprocessDetector`]
//! talks to a helper process (typically a small MediaPipe script) over its
//! stdin/stdout:
//!
//! 1. The process prints `READY` once its model is loaded.
//! 2. Per frame we write `width`, `height`, `channels` as little-endian `u32`
//!    followed by the raw BGR bytes.
//! 3. The process answers with one JSON line:
//!    `{"landmarks": [[{"x":..,"y":..,"z":..}, ...]], "handedness": ["Right"], "error": null}`

use crate::constants::DETECTOR_READY_SIGNAL;
use crate::frame::{Frame, CHANNELS};
use crate::hand::{observations_from_parts, HandObservation, Landmark};
use crate::{Error, Result};
use log::{debug, info, warn};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

/// Trait for landmark detectors: one synchronous call per frame
pub trait HandDetector: Send {
    /// Detect all hands in the frame, possibly none
    ///
    /// # Errors
    ///
    /// Returns an error if detection failed for this frame
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandObservation>>;
}

/// Raw detector answer, shaped like a MediaPipe hand landmarker result
#[derive(Debug, Deserialize)]
struct DetectionResult {
    #[serde(default)]
    landmarks: Vec<Vec<Landmark>>,
    #[serde(default)]
    handedness: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Decode one JSON response line into observations
///
/// # Errors
///
/// Returns an error for invalid JSON, a detector-reported error or
/// mismatched landmark/handedness counts
pub fn parse_detection(line: &str) -> Result<Vec<HandObservation>> {
    let result: DetectionResult = serde_json::from_str(line.trim())?;
    if let Some(error) = result.error {
        return Err(Error::Detector(error));
    }
    observations_from_parts(result.landmarks, &result.handedness)
}

/// Landmark detector running in a child process
pub struct SubprocessDetector {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl SubprocessDetector {
    /// Spawn the detector and wait for its ready signal
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started or does not signal ready
    pub fn spawn(program: &str, args: &[String]) -> Result<Self> {
        info!("Starting landmark detector: {program} {}", args.join(" "));

        let mut process = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Device(format!("Failed to start detector '{program}': {e}")))?;

        match Self::handshake(&mut process) {
            Ok((stdin, stdout)) => {
                info!("Landmark detector ready");
                Ok(Self {
                    process,
                    stdin,
                    stdout,
                    line: String::new(),
                })
            }
            Err(e) => {
                reap(&mut process);
                Err(e)
            }
        }
    }

    fn handshake(process: &mut Child) -> Result<(ChildStdin, BufReader<ChildStdout>)> {
        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::Device("Detector stdin unavailable".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Device("Detector stdout unavailable".to_string()))?;
        let mut stdout = BufReader::new(stdout);

        let mut ready = String::new();
        stdout
            .read_line(&mut ready)
            .map_err(|e| Error::Device(format!("Failed to read detector ready signal: {e}")))?;
        if ready.trim() != DETECTOR_READY_SIGNAL {
            return Err(Error::Device(format!(
                "Detector did not signal ready, got: {:?}",
                ready.trim()
            )));
        }
        Ok((stdin, stdout))
    }

    fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        let header = |v: usize| -> Result<[u8; 4]> {
            u32::try_from(v)
                .map(u32::to_le_bytes)
                .map_err(|_| Error::InvalidInput(format!("Frame dimension {v} exceeds u32")))
        };
        let width = header(frame.width())?;
        let height = header(frame.height())?;
        let channels = header(CHANNELS)?;

        // A failed write means the pipe is broken: the process has exited
        let result = [&width[..], &height[..], &channels[..], frame.data()]
            .into_iter()
            .try_for_each(|chunk| self.stdin.write_all(chunk))
            .and_then(|()| self.stdin.flush())
            .map_err(|e| Error::DetectorExited(format!("Failed to send frame: {e}")));
        result
    }
}

impl HandDetector for SubprocessDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandObservation>> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        self.send_frame(frame)?;

        self.line.clear();
        let read = self
            .stdout
            .read_line(&mut self.line)
            .map_err(|e| Error::DetectorExited(format!("Failed to read detector output: {e}")))?;
        if read == 0 {
            return Err(Error::DetectorExited("Detector closed its output".to_string()));
        }
        let hands = parse_detection(&self.line)?;
        debug!("Detector reported {} hand(s)", hands.len());
        Ok(hands)
    }
}

impl Drop for SubprocessDetector {
    fn drop(&mut self) {
        reap(&mut self.process);
    }
}

/// Kill the child if it still runs and collect its exit status
fn reap(process: &mut Child) {
    match process.try_wait() {
        Ok(Some(status)) => {
            debug!("Detector process already exited: {status}");
            return;
        }
        Ok(None) => {}
        Err(e) => warn!("Failed to poll detector process: {e}"),
    }
    if let Err(e) = process.kill() {
        warn!("Failed to stop detector process: {e}");
    }
    match process.wait() {
        Ok(status) => debug!("Detector process ended: {status}"),
        Err(e) => warn!("Failed to reap detector process: {e}"),
    }
}
