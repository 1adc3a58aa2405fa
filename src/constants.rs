//! Constants used throughout the application

/// Number of landmarks the hand model reports per hand
pub const NUM_HAND_LANDMARKS: usize = 21;

/// Hand landmark indices (MediaPipe hand model convention)
pub mod landmarks {
    pub const WRIST: usize = 0;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_TIP: usize = 20;
}

/// Default barycenter smoothing factor
pub const DEFAULT_BARYCENTER_ALPHA: f64 = 0.3;

/// Exponential smoothing bounds, alpha must lie in (MIN, MAX]
pub const SMOOTHING_ALPHA_MIN: f64 = 0.0;
pub const SMOOTHING_ALPHA_MAX: f64 = 1.0;

/// Thumb/index distance (normalized units) below which a hand counts as pinched
pub const DEFAULT_PINCH_THRESHOLD: f64 = 0.05;

/// Pitch range, C4 to C5
pub const DEFAULT_MIN_FREQ: f64 = 261.63;
pub const DEFAULT_MAX_FREQ: f64 = 523.25;

/// Frequency reported before the first pinch
pub const DEFAULT_FREQ: f64 = 440.0;

/// Volume used whenever the secondary hand is out of frame
pub const DEFAULT_VOLUME: f64 = 0.3;

/// Pulse mapper defaults
pub const DEFAULT_PULSE_THRESHOLD: f64 = 3.0;
pub const DEFAULT_PULSE_COOLDOWN_MS: u64 = 500;

/// Pinch mapper: thumb/index distance that sounds, and what it sends otherwise
pub const PINCH_MAPPER_THRESHOLD: f64 = 0.1;
pub const PINCH_MAPPER_FREQ: f64 = 440.0;
pub const PINCH_MAPPER_VOLUME: f64 = 0.5;

/// Initial value of barycenter mapper parameters
pub const DEFAULT_BARYCENTER_PARAM: f64 = 0.5;

/// OSC sound engine endpoint
pub const DEFAULT_OSC_HOST: &str = "127.0.0.1";
pub const DEFAULT_OSC_PORT: u16 = 11111;

/// Output stage retransmission rate
pub const DEFAULT_OUTPUT_RATE_HZ: f64 = 100.0;

/// Capture defaults
pub const DEFAULT_CAMERA_INDEX: i32 = 0;
pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;
pub const DEFAULT_FPS: f64 = 30.0;

/// Pause after a failed frame read so a broken device does not spin the capture thread
pub const CAPTURE_RETRY_DELAY_MS: u64 = 10;

/// Upper bound on how long the driver waits for a frame before re-checking its stop flag
pub const DEFAULT_FRAME_TIMEOUT_MS: u64 = 200;

/// Consecutive skipped cycles after which the driver closes the sound gate
pub const SILENCE_AFTER_SKIPPED_CYCLES: u64 = 10;

/// Line the detector process prints once its model is loaded
pub const DETECTOR_READY_SIGNAL: &str = "READY";

/// ITU-R BT.601 luma weights for BGR pixels in Q14 fixed point, as OpenCV's
/// 8-bit BGR to gray conversion uses them
pub const LUMA_WEIGHTS_BGR_Q14: [u32; 3] = [1868, 9617, 4899];
pub const LUMA_SHIFT: u32 = 14;

/// Parameter names shared between mappers and the sound engine
pub mod params {
    pub const SOUND_ENABLED: &str = "sound_enabled";
    pub const TARGET_FREQ: &str = "target_freq";
    pub const TARGET_VOLUME: &str = "target_volume";
    pub const PULSE: &str = "pulse";
    pub const FREQUENCY: &str = "frequency";
    pub const VOLUME: &str = "volume";
    pub const TEMPO: &str = "tempo";
    pub const RESONANCE: &str = "resonance";
}
