//! Hand gesture sonification: live hand tracking turned into sound control parameters.
//!
//! The pipeline consists of:
//! 1. A capture stage reading frames from a camera into a single-slot latch
//! 2. A feature extractor (hand landmarks from an external detector, or frame differences)
//! 3. A feature mapper (smoothed barycenters plus per-hand gesture strategies, a one-handed pinch instrument, or a pulse detector)
//! 4. An output stage re-sending the newest parameters to a sound engine over OSC
//!
//! Capture and output run on their own threads; the driver runs extraction
//! and mapping on the calling thread, one frame at a time.
//!
//! # Examples
//!
//! ## Gesture strategies
//!
//! ```
//! use hand_sonify::hand::{HandObservation, Handedness, Landmark};
//! use hand_sonify::params::AudioParameters;
//! use hand_sonify::strategy::{GestureStrategy, PitchGateStrategy};
//!
//! # fn main() -> hand_sonify::Result<()> {
//! let strategy = PitchGateStrategy::new(0.05, 261.63, 523.25);
//! // Thumb and index tip on top of each other: pinched
//! let hand = HandObservation::new(Handedness::Right, vec![Landmark::new(0.5, 0.5, 0.0); 21]);
//!
//! let mut params = AudioParameters::new();
//! strategy.apply(Some(&hand), Some([0.5, 0.5, 0.0]), &mut params)?;
//! assert_eq!(params.get_bool("sound_enabled"), Some(true));
//! # Ok(())
//! # }
//! ```
//!
//! ## Complete pipeline
//!
//! ```no_run
//! use hand_sonify::{config::Config, pipeline::Pipeline, scenario::Scenario};
//! use std::sync::atomic::AtomicBool;
//!
//! # fn main() -> hand_sonify::Result<()> {
//! let config = Config::from_file("hand-sonify.yaml")?;
//! config.validate()?;
//!
//! let scenario = Scenario::from_config(&config)?;
//! let mut pipeline = Pipeline::new(scenario, config.pipeline.clone())?;
//! pipeline.start()?;
//!
//! let stop = AtomicBool::new(false);
//! let stats = pipeline.run(&stop)?;
//! pipeline.stop();
//! println!("{} frames processed", stats.cycles);
//! # Ok(())
//! # }
//! ```

/// Error types and result handling
pub mod error;

/// Constants used throughout the application
pub mod constants;

/// Configuration management
pub mod config;

/// Single-slot buffers shared between threads
pub mod latch;

/// Staged worker runtime for capture and output threads
pub mod stage;

/// Captured video frames
pub mod frame;

/// Capture devices and the capture stage
pub mod capture;

/// `OpenCV` webcam and video file input
#[cfg(feature = "opencv")]
pub mod webcam;

/// Hand observations and control roles
pub mod hand;

/// Landmark detectors
pub mod detector;

/// Per-frame feature extractors
pub mod features;

/// Signal filtering algorithms for smoothing hand positions
pub mod filters;

/// Smoothed barycenter tracking
pub mod tracker;

/// Audio parameter snapshots
pub mod params;

/// Per-hand gesture strategies
pub mod strategy;

/// Feature to audio parameter mappers
pub mod mapper;

/// Audio transports and the output stage
pub mod output;

/// Component registries
pub mod scenario;

/// Pipeline driver
pub mod pipeline;

pub use error::{Error, Result};
