// Engine factory handed to `PlayerContextBuilder`

use crate::engine::SymphoniaEngine;
use crate::sink::{NullSink, PcmSink};
use mediaplayer_core::{AudioEngine, EngineFactory, Result};
use std::sync::Arc;

/// Creates the sink of every new engine
pub type SinkFactory = Arc<dyn Fn() -> Box<dyn PcmSink> + Send + Sync>;

/// Creates one `SymphoniaEngine` per registered player
#[derive(Clone)]
pub struct SymphoniaEngineFactory {
    sink_factory: SinkFactory,
}

impl SymphoniaEngineFactory {
    /// Engines discard their output
    pub fn new() -> Self {
        Self::with_sink_factory(Arc::new(|| Box::new(NullSink) as Box<dyn PcmSink>))
    }

    pub fn with_sink_factory(sink_factory: SinkFactory) -> Self {
        Self { sink_factory }
    }
}

impl Default for SymphoniaEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineFactory for SymphoniaEngineFactory {
    fn create_engine(&self) -> Result<Box<dyn AudioEngine>> {
        log::debug!("Creating symphonia engine");
        Ok(Box::new(SymphoniaEngine::with_sink((self.sink_factory)())))
    }
}
