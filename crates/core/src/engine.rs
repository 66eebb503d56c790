// Audio engine abstraction driven by the internal thread

use crate::error::Result;
use std::time::Duration;

/// Media source handed to an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// Local filesystem path
    Path(String),
    /// URI (`file://...` or engine-specific schemes)
    Uri(String),
    /// Open file descriptor. `length < 0` means "to the end of the file".
    Fd { fd: i32, offset: i64, length: i64 },
}

/// How a playback reached its end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    /// End of stream, playback stopped
    Normal,
    /// End of stream, the next player should take over
    StartNextPlayer,
    /// End of stream, playback restarted from the beginning
    Looped,
}

/// Events reported by an engine from `poll`
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Buffered percentage of the source
    BufferingUpdate(i32),
    PlaybackCompleted(CompletionKind),
    /// Outcome of a preparation started by `prepare`
    PrepareCompleted(Result<()>),
    /// Outcome of a seek started by `seek_to`
    SeekCompleted(Result<()>),
    Info { what: i32, extra: i32 },
}

/// Audio engine trait
/// All decode/output backends must implement this trait.
///
/// An engine is created, driven and dropped on the internal thread only.
pub trait AudioEngine: Send {
    /// Enable fade in/out on start/pause/stop
    fn set_fade_enabled(&mut self, enabled: bool);

    fn set_data_source(&mut self, source: &DataSource) -> Result<()>;

    /// Begin preparation; completion is reported as `EngineEvent::PrepareCompleted`
    fn prepare(&mut self) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    /// Drop the data source and return to the unconfigured state
    fn reset(&mut self) -> Result<()>;

    fn set_volume(&mut self, left: f32, right: f32) -> Result<()>;

    fn duration_ms(&mut self) -> Result<i32>;

    fn position_ms(&mut self) -> Result<i32>;

    /// Begin a seek; completion is reported as `EngineEvent::SeekCompleted`
    fn seek_to(&mut self, msec: i32) -> Result<()>;

    fn set_looping(&mut self, looping: bool) -> Result<()>;

    fn is_looping(&self) -> bool;

    fn set_audio_stream_type(&mut self, stream_type: i32) -> Result<()>;

    fn audio_stream_type(&self) -> i32;

    fn attach_aux_effect(&mut self, effect_id: i32) -> Result<()>;

    fn set_aux_effect_send_level(&mut self, level: f32) -> Result<()>;

    /// Whether end of stream should hand over to a next player
    fn set_has_next_player(&mut self, has_next: bool);

    /// How soon the engine wants to be polled again (`None` = idle)
    fn next_poll_delay(&self) -> Option<Duration>;

    /// Advance the engine and append any events that occurred
    fn poll(&mut self, events: &mut Vec<EngineEvent>);
}

/// Creates engines on the internal thread
pub trait EngineFactory: Send + Sync {
    fn create_engine(&self) -> Result<Box<dyn AudioEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> Result<Box<dyn AudioEngine>> + Send + Sync,
{
    fn create_engine(&self) -> Result<Box<dyn AudioEngine>> {
        self()
    }
}
