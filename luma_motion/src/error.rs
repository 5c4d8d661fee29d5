//! Detection error types.

use thiserror::Error;

pub type DetectResult<T> = Result<T, DetectError>;

#[derive(Debug, Error)]
pub enum DetectError {
    /// Consecutive frames carried a different number of bytes, usually an
    /// unreported resolution change.
    #[error("Geometry mismatch: previous frame has {previous} bytes, current has {current}")]
    GeometryMismatch { previous: usize, current: usize },

    #[error("Empty input frame")]
    EmptyInput,

    /// The declared dimensions need more luma bytes than the buffer holds.
    #[error("Malformed frame: {width}x{height} does not fit in {bytes} bytes")]
    MalformedFrame { width: u32, height: u32, bytes: usize },

    /// A working buffer could not be reserved. Partial buffers would corrupt
    /// the detector state, so this one is never absorbed.
    #[error("Resource exhaustion: could not reserve {cells} mask cells")]
    ResourceExhaustion { cells: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Capture worker stopped: {0}")]
    WorkerStopped(String),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DetectError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Fatal errors halt the pipeline; everything else degrades to an empty
    /// detection for the current frame.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DetectError::ResourceExhaustion { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_resource_exhaustion_is_fatal() {
        assert!(DetectError::ResourceExhaustion { cells: 10 }.is_fatal());
        assert!(!DetectError::EmptyInput.is_fatal());
        assert!(
            !DetectError::GeometryMismatch {
                previous: 4,
                current: 6
            }
            .is_fatal()
        );
        assert!(!DetectError::invalid_config("bad").is_fatal());
        assert!(
            !DetectError::MalformedFrame {
                width: 8,
                height: 8,
                bytes: 16
            }
            .is_fatal()
        );
    }

    #[test]
    fn mismatch_message_names_both_lengths() {
        let err = DetectError::GeometryMismatch {
            previous: 4096,
            current: 6144,
        };
        let msg = err.to_string();
        assert!(msg.contains("4096"));
        assert!(msg.contains("6144"));
    }
}
