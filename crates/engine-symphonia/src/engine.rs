// Symphonia-backed audio engine
//
// Decoding is driven from `poll` by a wall clock: while playing, packets are
// decoded up to a short lookahead past the clock and written to the sink.

use crate::decoder::{TrackDecoder, OUTPUT_CHANNELS};
use crate::sink::{NullSink, PcmSink};
use mediaplayer_core::status::{aux_effect, stream_type};
use mediaplayer_core::{AudioEngine, AudioError, CompletionKind, DataSource, EngineEvent, Result};
use std::time::{Duration, Instant};

/// Poll interval while playing
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Audio decoded ahead of the playback clock
pub const DECODE_LOOKAHEAD_MS: u64 = 100;

/// Length of the fade-in applied on start when fading is enabled
pub const FADE_IN_MS: u64 = 200;

/// Local sources are fully buffered
const BUFFERING_COMPLETE: i32 = 100;

/// Playback position clock
#[derive(Debug, Default)]
struct PlaybackClock {
    base_ms: u64,
    started_at: Option<Instant>,
}

impl PlaybackClock {
    fn position_ms(&self) -> u64 {
        match self.started_at {
            Some(started_at) => self.base_ms + started_at.elapsed().as_millis() as u64,
            None => self.base_ms,
        }
    }

    fn run(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    fn freeze(&mut self) {
        self.base_ms = self.position_ms();
        self.started_at = None;
    }

    fn set(&mut self, position_ms: u64) {
        self.base_ms = position_ms;
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }
}

/// Linear gain ramp over a number of frames
#[derive(Debug)]
struct FadeRamp {
    total_frames: u64,
    done_frames: u64,
}

impl FadeRamp {
    fn new(sample_rate: u32, duration_ms: u64) -> Self {
        Self {
            total_frames: (sample_rate as u64 * duration_ms / 1000).max(1),
            done_frames: 0,
        }
    }

    fn is_done(&self) -> bool {
        self.done_frames >= self.total_frames
    }

    fn apply(&mut self, samples: &mut [f32]) {
        for frame in samples.chunks_mut(OUTPUT_CHANNELS) {
            if self.is_done() {
                return;
            }
            let gain = self.done_frames as f32 / self.total_frames as f32;
            for sample in frame {
                *sample *= gain;
            }
            self.done_frames += 1;
        }
    }
}

/// Audio engine decoding with symphonia into a `PcmSink`
pub struct SymphoniaEngine {
    sink: Box<dyn PcmSink>,
    source: Option<DataSource>,
    decoder: Option<TrackDecoder>,
    /// Survives `stop()` until the next prepare or reset
    track_duration_ms: Option<u64>,
    prepare_requested: bool,
    pending_seek: Option<Result<()>>,
    pending_events: Vec<EngineEvent>,
    playing: bool,
    end_of_stream: bool,
    clock: PlaybackClock,
    decoded_frames: u64,
    fade_enabled: bool,
    fade: Option<FadeRamp>,
    volume: (f32, f32),
    looping: bool,
    has_next_player: bool,
    stream_type: i32,
    aux_effect_id: i32,
    aux_send_level: f32,
}

impl SymphoniaEngine {
    pub fn new() -> Self {
        Self::with_sink(Box::new(NullSink))
    }

    pub fn with_sink(sink: Box<dyn PcmSink>) -> Self {
        Self {
            sink,
            source: None,
            decoder: None,
            track_duration_ms: None,
            prepare_requested: false,
            pending_seek: None,
            pending_events: Vec::new(),
            playing: false,
            end_of_stream: false,
            clock: PlaybackClock::default(),
            decoded_frames: 0,
            fade_enabled: false,
            fade: None,
            volume: (1.0, 1.0),
            looping: false,
            has_next_player: false,
            stream_type: stream_type::MUSIC,
            aux_effect_id: aux_effect::NULL,
            aux_send_level: 0.0,
        }
    }

    fn decoder_mut(&mut self) -> Result<&mut TrackDecoder> {
        self.decoder
            .as_mut()
            .ok_or_else(|| AudioError::InvalidState("No prepared source".to_string()))
    }

    fn sample_rate(&self) -> u32 {
        self.decoder
            .as_ref()
            .map(|d| d.info().sample_rate)
            .unwrap_or(1)
    }

    fn decoded_ms(&self) -> u64 {
        self.decoded_frames * 1000 / self.sample_rate() as u64
    }

    fn duration(&self) -> u64 {
        self.track_duration_ms.unwrap_or(0)
    }

    fn finish_prepare(&mut self) {
        self.prepare_requested = false;
        self.track_duration_ms = None;

        let result = match &self.source {
            Some(source) => TrackDecoder::open(source),
            None => Err(AudioError::InvalidState("No data source".to_string())),
        };

        let result = result.map(|decoder| {
            let info = decoder.info();
            self.sink.configure(info.sample_rate, OUTPUT_CHANNELS as u16);
            self.track_duration_ms = Some(info.duration_ms);
            self.decoder = Some(decoder);
            self.clock = PlaybackClock::default();
            self.decoded_frames = 0;
            self.end_of_stream = false;
        });

        if let Err(e) = &result {
            log::error!("Prepare failed: {}", e);
        }
        self.pending_events.push(EngineEvent::PrepareCompleted(result));
    }

    /// Decode up to the lookahead and report end of stream once the clock reached it
    fn render(&mut self) {
        let target_ms = self.clock.position_ms() + DECODE_LOOKAHEAD_MS;

        while !self.end_of_stream && self.decoded_ms() < target_ms {
            let decoded = match self.decoder.as_mut() {
                Some(decoder) => decoder.decode_next(),
                None => return,
            };

            match decoded {
                Ok(Some(mut samples)) => {
                    self.decoded_frames += (samples.len() / OUTPUT_CHANNELS) as u64;
                    self.apply_gain(&mut samples);
                    self.sink.write(&samples);
                }
                Ok(None) => self.end_of_stream = true,
                Err(e) => {
                    log::error!("Decoding stopped: {}", e);
                    self.end_of_stream = true;
                }
            }
        }

        if self.end_of_stream && self.clock.position_ms() >= self.decoded_ms() {
            self.on_end_of_stream();
        }
    }

    fn apply_gain(&mut self, samples: &mut [f32]) {
        let (left, right) = self.volume;
        for frame in samples.chunks_mut(OUTPUT_CHANNELS) {
            if let [l, r] = frame {
                *l *= left;
                *r *= right;
            }
        }
        if let Some(fade) = self.fade.as_mut() {
            fade.apply(samples);
            if fade.is_done() {
                self.fade = None;
            }
        }
    }

    fn on_end_of_stream(&mut self) {
        if self.looping {
            log::debug!("End of stream, looping");
            let restarted = self.decoder_mut().and_then(|d| d.seek(0));
            if let Err(e) = restarted {
                log::error!("Failed to loop: {}", e);
            } else {
                self.sink.flush();
                self.clock.set(0);
                self.decoded_frames = 0;
                self.end_of_stream = false;
                self.pending_events
                    .push(EngineEvent::PlaybackCompleted(CompletionKind::Looped));
                return;
            }
        }

        log::debug!("End of stream");
        self.playing = false;
        self.clock.freeze();
        self.clock.set(self.decoded_ms());
        let kind = if self.has_next_player {
            CompletionKind::StartNextPlayer
        } else {
            CompletionKind::Normal
        };
        self.pending_events.push(EngineEvent::PlaybackCompleted(kind));
    }
}

impl Default for SymphoniaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for SymphoniaEngine {
    fn set_fade_enabled(&mut self, enabled: bool) {
        self.fade_enabled = enabled;
    }

    fn set_data_source(&mut self, source: &DataSource) -> Result<()> {
        if let DataSource::Uri(uri) = source {
            crate::source::path_from_uri(uri)?;
        }
        self.source = Some(source.clone());
        Ok(())
    }

    fn prepare(&mut self) -> Result<()> {
        if self.source.is_none() {
            return Err(AudioError::InvalidState("No data source".to_string()));
        }
        // probing happens on the next poll so the caller is not blocked
        self.prepare_requested = true;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.decoder.is_none() {
            return Err(AudioError::InvalidState("Not prepared".to_string()));
        }
        if self.playing {
            return Ok(());
        }

        if self.end_of_stream && self.clock.position_ms() >= self.decoded_ms() {
            // restart a completed playback from the beginning
            self.decoder_mut()?.seek(0)?;
            self.clock = PlaybackClock::default();
            self.decoded_frames = 0;
            self.end_of_stream = false;
        }

        if self.fade_enabled {
            self.fade = Some(FadeRamp::new(self.sample_rate(), FADE_IN_MS));
        }
        self.playing = true;
        self.clock.run();
        self.pending_events
            .push(EngineEvent::BufferingUpdate(BUFFERING_COMPLETE));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.playing = false;
        self.decoder = None;
        self.clock = PlaybackClock::default();
        self.decoded_frames = 0;
        self.end_of_stream = false;
        self.pending_seek = None;
        self.fade = None;
        self.sink.flush();
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.playing = false;
        self.clock.freeze();
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.stop()?;
        self.source = None;
        self.track_duration_ms = None;
        self.prepare_requested = false;
        self.pending_events.clear();
        self.looping = false;
        self.has_next_player = false;
        Ok(())
    }

    fn set_volume(&mut self, left: f32, right: f32) -> Result<()> {
        self.volume = (left, right);
        Ok(())
    }

    fn duration_ms(&mut self) -> Result<i32> {
        let duration = self
            .track_duration_ms
            .ok_or_else(|| AudioError::InvalidState("Not prepared".to_string()))?;
        Ok(duration.min(i32::MAX as u64) as i32)
    }

    fn position_ms(&mut self) -> Result<i32> {
        if self.decoder.is_none() {
            return Ok(0);
        }
        let mut position = self.clock.position_ms().min(self.decoded_ms());
        if self.duration() > 0 {
            position = position.min(self.duration());
        }
        Ok(position.min(i32::MAX as u64) as i32)
    }

    fn seek_to(&mut self, msec: i32) -> Result<()> {
        if msec < 0 {
            return Err(AudioError::InvalidArgument(format!("Negative position: {}", msec)));
        }
        let duration = self.duration();
        let decoder = self.decoder_mut()?;

        let mut target = msec as u64;
        if duration > 0 {
            target = target.min(duration);
        }
        let result = decoder.seek(target);
        if result.is_ok() {
            let sample_rate = self.sample_rate() as u64;
            self.sink.flush();
            self.clock.set(target);
            self.decoded_frames = target * sample_rate / 1000;
            self.end_of_stream = false;
        }
        self.pending_seek = Some(result);
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) -> Result<()> {
        self.looping = looping;
        Ok(())
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn set_audio_stream_type(&mut self, stream_type: i32) -> Result<()> {
        if !stream_type::is_valid(stream_type) {
            return Err(AudioError::InvalidArgument(format!("Stream type {}", stream_type)));
        }
        self.stream_type = stream_type;
        Ok(())
    }

    fn audio_stream_type(&self) -> i32 {
        self.stream_type
    }

    fn attach_aux_effect(&mut self, effect_id: i32) -> Result<()> {
        if !aux_effect::is_valid(effect_id) {
            return Err(AudioError::InvalidArgument(format!("Effect id {}", effect_id)));
        }
        self.aux_effect_id = effect_id;
        Ok(())
    }

    fn set_aux_effect_send_level(&mut self, level: f32) -> Result<()> {
        self.aux_send_level = level.clamp(0.0, 1.0);
        Ok(())
    }

    fn set_has_next_player(&mut self, has_next: bool) {
        self.has_next_player = has_next;
    }

    fn next_poll_delay(&self) -> Option<Duration> {
        if self.prepare_requested
            || self.pending_seek.is_some()
            || !self.pending_events.is_empty()
        {
            Some(Duration::ZERO)
        } else if self.playing {
            Some(POLL_INTERVAL)
        } else {
            None
        }
    }

    fn poll(&mut self, events: &mut Vec<EngineEvent>) {
        if self.prepare_requested {
            self.finish_prepare();
        }
        if let Some(result) = self.pending_seek.take() {
            self.pending_events.push(EngineEvent::SeekCompleted(result));
        }
        if self.playing {
            self.render();
        }
        events.append(&mut self.pending_events);
    }
}
