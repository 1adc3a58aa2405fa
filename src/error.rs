//! Error types for the hand sonification library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[cfg(feature = "opencv")]
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// File or socket I/O failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Detector output could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Capture device could not be opened or configured
    #[error("Device error: {0}")]
    Device(String),

    /// A single capture read failed; the device stays usable
    #[error("Frame read error: {0}")]
    FrameRead(String),

    /// Audio transport could not be connected or a send failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Parameters did not have the shape the transport expects
    #[error("Parameter shape error: {0}")]
    ParameterShape(String),

    /// The landmark detector process misbehaved
    #[error("Detector error: {0}")]
    Detector(String),

    /// The landmark detector process is gone; no later frame can succeed
    #[error("Detector exited: {0}")]
    DetectorExited(String),

    /// A hand observation violated its contract (no landmarks, missing index, label mismatch)
    #[error("Malformed observation: {0}")]
    MalformedObservation(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A registry key named a component that does not exist
    #[error("Unknown {kind} '{name}' (available: {available})")]
    UnknownComponent {
        /// Registry the lookup ran against
        kind: &'static str,
        /// Requested key
        name: String,
        /// Comma separated list of registered keys
        available: String,
    },

    /// Stage lifecycle was driven through an illegal transition
    #[error("Stage error: {0}")]
    Stage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Errors a running loop logs and survives instead of terminating on.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::FrameRead(_)
                | Self::Transport(_)
                | Self::Detector(_)
                | Self::MalformedObservation(_)
                | Self::Io(_)
                | Self::Json(_)
        )
    }
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::FrameRead("short read".into()).is_transient());
        assert!(Error::Transport("send failed".into()).is_transient());
        assert!(Error::MalformedObservation("no landmarks".into()).is_transient());
        assert!(!Error::Device("no camera".into()).is_transient());
        assert!(!Error::ConfigError("bad".into()).is_transient());
        assert!(!Error::DetectorExited("closed its output".into()).is_transient());
    }

    #[test]
    fn test_unknown_component_message() {
        let err = Error::UnknownComponent {
            kind: "feature mapper",
            name: "theremin".into(),
            available: "hand_gesture, pulse".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("feature mapper"));
        assert!(msg.contains("theremin"));
        assert!(msg.contains("hand_gesture, pulse"));
    }
}
