// Symphonia-backed audio engine for the media player

pub mod decoder;
pub mod engine;
pub mod factory;
pub mod sink;
pub mod source;

#[cfg(test)]
mod test_util;

// Re-export commonly used types
pub use decoder::{TrackDecoder, TrackInfo};
pub use engine::SymphoniaEngine;
pub use factory::{SinkFactory, SymphoniaEngineFactory};
pub use sink::{MemorySink, NullSink, PcmSink};
