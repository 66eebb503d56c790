// Core types for the media player: state machine, message protocol and engine traits

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod handler_thread;
pub mod listener;
pub mod message;
pub mod player;
pub mod protocol;
pub mod state;
pub mod status;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::ContextOptions;
pub use context::{HostThreadHooks, PlayerContext, PlayerContextBuilder};
pub use engine::{AudioEngine, CompletionKind, DataSource, EngineEvent, EngineFactory};
pub use error::{AudioError, Result};
pub use listener::{
    InternalThreadEventListener, OnBufferingUpdateListener, OnCompletionListener, OnErrorListener,
    OnInfoListener, OnPreparedListener, OnSeekCompleteListener,
};
pub use message::PlayerId;
pub use player::{InitializeArgs, MediaPlayer};
pub use state::{PlayerState, StateMask};
pub use status::{PlayerResult, StatusCode};
