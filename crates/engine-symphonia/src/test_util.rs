// Test helpers: logging and generated WAV files

use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Generated WAV file, deleted together with its directory on drop
pub struct TestWav {
    _dir: TempDir,
    path: PathBuf,
}

impl TestWav {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Write a 16-bit PCM WAV holding a 440 Hz tone
pub fn write_test_wav(sample_rate: u32, channels: u16, duration_ms: u32) -> TestWav {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");

    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(&path, spec).unwrap();

    let frames = sample_rate as u64 * duration_ms as u64 / 1000;
    for frame in 0..frames {
        let t = frame as f32 / sample_rate as f32;
        let sample = ((t * 440.0 * std::f32::consts::TAU).sin() * 16000.0) as i16;
        for _ in 0..channels {
            writer.write_sample(sample).unwrap();
        }
    }
    writer.finalize().unwrap();

    TestWav { _dir: dir, path }
}
