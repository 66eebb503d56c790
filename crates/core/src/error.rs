// Error handling for the player core and its engines

use std::fmt;

/// Audio engine error types
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Failed to initialize the engine or one of its resources
    InitializationError(String),

    /// Media content could not be found
    NotFound(String),

    /// Failed to load audio content
    LoadError(String),

    /// Operation not valid in the engine's current state
    InvalidState(String),

    /// Malformed argument
    InvalidArgument(String),

    /// Audio format or source scheme not supported
    UnsupportedFormat(String),

    /// Access to the content was refused
    PermissionDenied(String),

    /// IO error
    IoError(String),

    /// Decoding error
    DecodingError(String),

    /// Thread/synchronization error
    ThreadError(String),

    /// An operation did not complete in time
    TimedOut(String),

    /// Generic error
    Other(String),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AudioError::InitializationError(msg) => write!(f, "Initialization error: {}", msg),
            AudioError::NotFound(msg) => write!(f, "Content not found: {}", msg),
            AudioError::LoadError(msg) => write!(f, "Load error: {}", msg),
            AudioError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            AudioError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            AudioError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            AudioError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            AudioError::IoError(msg) => write!(f, "IO error: {}", msg),
            AudioError::DecodingError(msg) => write!(f, "Decoding error: {}", msg),
            AudioError::ThreadError(msg) => write!(f, "Thread error: {}", msg),
            AudioError::TimedOut(msg) => write!(f, "Timed out: {}", msg),
            AudioError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for AudioError {}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, AudioError>;

// Conversion implementations
impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => AudioError::NotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => AudioError::PermissionDenied(err.to_string()),
            std::io::ErrorKind::TimedOut => AudioError::TimedOut(err.to_string()),
            _ => AudioError::IoError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_kinds_are_preserved() {
        let err: AudioError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, AudioError::NotFound(_)));

        let err: AudioError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no").into();
        assert!(matches!(err, AudioError::PermissionDenied(_)));

        let err: AudioError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(matches!(err, AudioError::IoError(_)));
    }

    #[test]
    fn test_display() {
        let err = AudioError::UnsupportedFormat("ogg".to_string());
        assert_eq!(err.to_string(), "Unsupported format: ogg");
    }
}
