// Result codes and public event constants
//
// The numeric values below are shared with the calling layer and must not change.

use crate::error::AudioError;
use std::fmt;

/// Status returned by every public player operation
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Success = 0,
    Error = -1,
    InvalidHandle = -2,
    IllegalState = -3,
    IllegalArgument = -4,
    InternalError = -5,
    MemoryAllocationFailed = -6,
    ResourceAllocationFailed = -7,
    ContentNotFound = -8,
    ContentUnsupported = -9,
    IoError = -10,
    PermissionDenied = -11,
    TimedOut = -12,
    InErrorState = -13,
    ControlLost = -14,
    DeadObject = -15,
}

/// Result of a public player operation. `Err` never carries `StatusCode::Success`.
pub type PlayerResult<T = ()> = std::result::Result<T, StatusCode>;

impl StatusCode {
    /// ABI integer value
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        let status = match code {
            0 => StatusCode::Success,
            -1 => StatusCode::Error,
            -2 => StatusCode::InvalidHandle,
            -3 => StatusCode::IllegalState,
            -4 => StatusCode::IllegalArgument,
            -5 => StatusCode::InternalError,
            -6 => StatusCode::MemoryAllocationFailed,
            -7 => StatusCode::ResourceAllocationFailed,
            -8 => StatusCode::ContentNotFound,
            -9 => StatusCode::ContentUnsupported,
            -10 => StatusCode::IoError,
            -11 => StatusCode::PermissionDenied,
            -12 => StatusCode::TimedOut,
            -13 => StatusCode::InErrorState,
            -14 => StatusCode::ControlLost,
            -15 => StatusCode::DeadObject,
            _ => return None,
        };
        Some(status)
    }

    pub fn is_success(self) -> bool {
        self == StatusCode::Success
    }

    /// `Ok(())` for `Success`, `Err(self)` otherwise
    pub fn into_result(self) -> PlayerResult {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Collapse a player result into its status
    pub fn from_result<T>(result: &PlayerResult<T>) -> Self {
        match result {
            Ok(_) => StatusCode::Success,
            Err(status) => *status,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

impl From<&AudioError> for StatusCode {
    fn from(err: &AudioError) -> Self {
        match err {
            AudioError::InitializationError(_) => StatusCode::ResourceAllocationFailed,
            AudioError::NotFound(_) => StatusCode::ContentNotFound,
            AudioError::LoadError(_) => StatusCode::Error,
            AudioError::InvalidState(_) => StatusCode::IllegalState,
            AudioError::InvalidArgument(_) => StatusCode::IllegalArgument,
            AudioError::UnsupportedFormat(_) => StatusCode::ContentUnsupported,
            AudioError::PermissionDenied(_) => StatusCode::PermissionDenied,
            AudioError::IoError(_) => StatusCode::IoError,
            AudioError::DecodingError(_) => StatusCode::ContentUnsupported,
            AudioError::ThreadError(_) => StatusCode::InternalError,
            AudioError::TimedOut(_) => StatusCode::TimedOut,
            AudioError::Other(_) => StatusCode::Error,
        }
    }
}

impl From<AudioError> for StatusCode {
    fn from(err: AudioError) -> Self {
        StatusCode::from(&err)
    }
}

impl<T> From<&crate::error::Result<T>> for StatusCode {
    fn from(result: &crate::error::Result<T>) -> Self {
        match result {
            Ok(_) => StatusCode::Success,
            Err(err) => StatusCode::from(err),
        }
    }
}

/// `what` codes carried by error events
pub mod error_what {
    pub const NO_ERROR: i32 = 0;
    pub const UNKNOWN_ERROR: i32 = i32::MIN;
    pub const NO_MEMORY: i32 = -12;
    pub const INVALID_OPERATION: i32 = -38;
    pub const BAD_VALUE: i32 = -22;
    pub const DEAD_OBJECT: i32 = -32;
    pub const TIMED_OUT: i32 = -110;
}

/// Public media error codes (`what` of engine-reported errors)
pub mod media_error {
    pub const UNKNOWN: i32 = 1;
    pub const SERVER_DIED: i32 = 100;
    pub const NOT_VALID_FOR_PROGRESSIVE_PLAYBACK: i32 = 200;
    pub const TIMED_OUT: i32 = -110;
    pub const IO: i32 = -1004;
    pub const MALFORMED: i32 = -1007;
    pub const UNSUPPORTED: i32 = -1010;
}

/// Public media info codes
pub mod media_info {
    pub const UNKNOWN: i32 = 1;
    pub const BUFFERING_START: i32 = 701;
    pub const BUFFERING_END: i32 = 702;
    pub const BAD_INTERLEAVING: i32 = 800;
    pub const NOT_SEEKABLE: i32 = 801;
    pub const METADATA_UPDATE: i32 = 802;
}

/// Audio stream types
pub mod stream_type {
    pub const VOICE: i32 = 0;
    pub const SYSTEM: i32 = 1;
    pub const RING: i32 = 2;
    pub const MUSIC: i32 = 3;
    pub const ALARM: i32 = 4;
    pub const NOTIFICATION: i32 = 5;

    pub fn is_valid(stream_type: i32) -> bool {
        (VOICE..=NOTIFICATION).contains(&stream_type)
    }
}

/// Auxiliary effect ids accepted by `attach_aux_effect`
pub mod aux_effect {
    pub const NULL: i32 = 0;
    pub const ENVIRONMENTAL_REVERB: i32 = 1;
    pub const PRESET_REVERB: i32 = 2;

    pub fn is_valid(effect_id: i32) -> bool {
        (NULL..=PRESET_REVERB).contains(&effect_id)
    }
}

/// Map a failed status to the `what` reported through the error listener
pub fn translate_to_error_what(status: StatusCode) -> i32 {
    match status {
        StatusCode::Success => error_what::NO_ERROR,
        StatusCode::IllegalState => error_what::INVALID_OPERATION,
        StatusCode::IllegalArgument => error_what::BAD_VALUE,
        StatusCode::MemoryAllocationFailed | StatusCode::ResourceAllocationFailed => {
            error_what::NO_MEMORY
        }
        StatusCode::TimedOut => error_what::TIMED_OUT,
        StatusCode::DeadObject => error_what::DEAD_OBJECT,
        _ => error_what::UNKNOWN_ERROR,
    }
}
