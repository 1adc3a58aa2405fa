//! Pipeline driver.
//!
//! Threads: the capture stage writes frames into a blocking latch, the
//! driver (the caller of [`Pipeline::run`]) turns each frame into audio
//! parameters, and the output stage keeps re-sending the newest parameters.
//! The two latches are the only state shared between threads.

use crate::capture::CaptureStage;
use crate::config::PipelineConfig;
use crate::constants::{params, SILENCE_AFTER_SKIPPED_CYCLES};
use crate::features::FeatureExtractor;
use crate::frame::Frame;
use crate::latch::{BlockingLatch, Latch};
use crate::mapper::FeatureMapper;
use crate::output::OutputStage;
use crate::params::AudioParameters;
use crate::scenario::Scenario;
use crate::stage::{StageState, StagedWorker};
use crate::{Error, Result};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Counters of a pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames taken from the capture latch
    pub cycles: u64,
    /// Cycles whose parameters reached the output latch
    pub updates: u64,
    /// Cycles skipped because of a transient error
    pub skipped: u64,
    /// Waits that timed out without a new frame
    pub frame_timeouts: u64,
}

/// Capture, feature extraction, mapping and output tied together
pub struct Pipeline {
    config: PipelineConfig,
    extractor: Box<dyn FeatureExtractor>,
    mapper: Box<dyn FeatureMapper>,
    frames: Arc<BlockingLatch<Frame>>,
    audio_params: Arc<Latch<AudioParameters>>,
    // Capture is declared first so it is also dropped first
    capture: StagedWorker<CaptureStage>,
    output: StagedWorker<OutputStage>,
    stats: PipelineStats,
    /// Consecutive skipped cycles
    skip_streak: u64,
}

impl Pipeline {
    /// Wire a scenario into stages; nothing runs until [`start`](Self::start)
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid output rate
    pub fn new(scenario: Scenario, config: PipelineConfig) -> Result<Self> {
        let Scenario {
            capture,
            extractor,
            mapper,
            transport,
        } = scenario;

        let frames = Arc::new(BlockingLatch::new());
        let audio_params = Arc::new(Latch::new(AudioParameters::new()));
        let capture = StagedWorker::new(CaptureStage::new(capture, Arc::clone(&frames)));
        let output = StagedWorker::new(OutputStage::new(
            transport,
            Arc::clone(&audio_params),
            config.output_rate_hz,
        )?);

        Ok(Self {
            config,
            extractor,
            mapper,
            frames,
            audio_params,
            capture,
            output,
            stats: PipelineStats::default(),
            skip_streak: 0,
        })
    }

    /// Start the output stage, then the capture stage
    ///
    /// # Errors
    ///
    /// Returns the first stage's startup error; an output stage that
    /// already started is stopped again
    pub fn start(&mut self) -> Result<()> {
        self.output.start()?;
        if let Err(e) = self.capture.start() {
            self.output.stop();
            return Err(e);
        }
        info!("Pipeline started");
        Ok(())
    }

    /// One strictly sequential cycle: features, mapping, parameter latch
    ///
    /// On error the parameter latch keeps its previous snapshot.
    ///
    /// # Errors
    ///
    /// Returns extraction or mapping errors
    pub fn process_frame(&mut self, frame: &Frame) -> Result<AudioParameters> {
        let features = self.extractor.extract(frame)?;
        let audio_params = self.mapper.map(features)?;
        debug!("Cycle {}: {audio_params}", self.stats.cycles);
        self.audio_params.write(audio_params.clone());
        self.stats.updates += 1;
        Ok(audio_params)
    }

    /// Drive cycles until `stop_flag` is set or the cycle limit is reached
    ///
    /// Waits for frames are bounded by the frame timeout so the stop flag
    /// is re-checked even when the camera stalls. A long run of skipped
    /// cycles, or a fatal error, closes the sound gate in the parameter latch.
    ///
    /// # Errors
    ///
    /// Returns an error if the stages are not running, the capture thread
    /// ended on its own or a cycle fails with a non-transient error
    pub fn run(&mut self, stop_flag: &AtomicBool) -> Result<PipelineStats> {
        if self.capture.state() != StageState::Running || self.output.state() != StageState::Running {
            return Err(Error::Stage("Pipeline must be started before run".to_string()));
        }

        let timeout = self.config.frame_timeout();
        while !stop_flag.load(Ordering::SeqCst) {
            if self.config.max_cycles.is_some_and(|max| self.stats.cycles >= max) {
                info!("Reached cycle limit of {}", self.stats.cycles);
                break;
            }

            let Some(frame) = self.frames.read_timeout(timeout) else {
                self.stats.frame_timeouts += 1;
                if !self.capture.is_running() {
                    self.silence();
                    return Err(Error::Stage("Capture stage thread ended unexpectedly".to_string()));
                }
                debug!("No frame within {timeout:?}");
                continue;
            };
            self.stats.cycles += 1;

            match self.process_frame(&frame) {
                Ok(_) => self.skip_streak = 0,
                Err(e) if e.is_transient() => self.skip_cycle(&e),
                Err(e) => {
                    self.silence();
                    return Err(e);
                }
            }
        }
        Ok(self.stats)
    }

    fn skip_cycle(&mut self, e: &Error) {
        self.stats.skipped += 1;
        self.skip_streak += 1;
        if self.skip_streak == 1 {
            warn!("Skipping cycle {}: {e}", self.stats.cycles);
        } else {
            debug!("Skipping cycle {} ({} in a row): {e}", self.stats.cycles, self.skip_streak);
        }
        if self.skip_streak == SILENCE_AFTER_SKIPPED_CYCLES {
            warn!("{} cycles in a row failed, silencing output", self.skip_streak);
            self.silence();
        }
    }

    /// Close the sound gate of the current snapshot, if it has one and it is open
    fn silence(&self) {
        let mut audio_params = self.audio_params.read();
        if audio_params.get_bool(params::SOUND_ENABLED) == Some(true) {
            audio_params.set(params::SOUND_ENABLED, false);
            self.audio_params.write(audio_params);
        }
    }

    /// Stop capture first, then output; both are joined
    pub fn stop(&mut self) {
        let was_running = self.stage_states() != (StageState::Stopped, StageState::Stopped);
        self.capture.stop();
        self.output.stop();
        if !was_running {
            return;
        }
        info!(
            "Pipeline stopped after {} cycles ({} skipped)",
            self.stats.cycles, self.stats.skipped
        );
    }

    /// Handle to the latch the output stage transmits from
    #[must_use]
    pub fn audio_params(&self) -> Arc<Latch<AudioParameters>> {
        Arc::clone(&self.audio_params)
    }

    #[must_use]
    pub const fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// States of the capture and output stages
    #[must_use]
    pub const fn stage_states(&self) -> (StageState, StageState) {
        (self.capture.state(), self.output.state())
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
