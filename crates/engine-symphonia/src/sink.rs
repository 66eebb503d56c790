// PCM sinks receiving the decoded, volume-scaled output

use parking_lot::Mutex;
use std::sync::Arc;

/// Destination of interleaved stereo f32 frames.
/// Called on the internal thread; implementations must not block for long.
pub trait PcmSink: Send {
    /// Called once per prepared source, before any `write`
    fn configure(&mut self, _sample_rate: u32, _channels: u16) {}

    fn write(&mut self, samples: &[f32]);

    /// Drop anything buffered (stop, seek, reset)
    fn flush(&mut self) {}
}

/// Discards all output
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PcmSink for NullSink {
    fn write(&mut self, _samples: &[f32]) {}
}

/// Collects output in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    samples: Arc<Mutex<Vec<f32>>>,
    sample_rate: Arc<Mutex<Option<u32>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<f32> {
        self.samples.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        *self.sample_rate.lock()
    }
}

impl PcmSink for MemorySink {
    fn configure(&mut self, sample_rate: u32, _channels: u16) {
        *self.sample_rate.lock() = Some(sample_rate);
    }

    fn write(&mut self, samples: &[f32]) {
        self.samples.lock().extend_from_slice(samples);
    }
}
