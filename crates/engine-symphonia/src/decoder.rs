// Audio decoding using Symphonia
// Produces interleaved stereo f32 frames from the default track of a source

use crate::source::open_source;
use mediaplayer_core::{AudioError, DataSource, Result};
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;

/// Output channel count
pub const OUTPUT_CHANNELS: usize = 2;

/// Track information
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub sample_rate: u32,
    pub channels: u16,
    /// 0 when unknown
    pub duration_ms: u64,
}

/// Demuxer and decoder for one source
pub struct TrackDecoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    info: TrackInfo,
}

impl TrackDecoder {
    /// Open and probe `source`
    pub fn open(source: &DataSource) -> Result<Self> {
        let (media_source, hint) = open_source(source)?;
        let media_source_stream = MediaSourceStream::new(media_source, Default::default());

        // Probe the media source
        let probe_result = symphonia::default::get_probe()
            .format(
                &hint,
                media_source_stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::UnsupportedFormat(format!("Failed to probe media: {}", e)))?;

        let format_reader = probe_result.format;

        // Get the default track
        let track = format_reader
            .default_track()
            .ok_or_else(|| AudioError::UnsupportedFormat("No default track found".to_string()))?;
        let track_id = track.id;
        let codec_params = &track.codec_params;

        let decoder = symphonia::default::get_codecs()
            .make(codec_params, &DecoderOptions::default())
            .map_err(|e| {
                AudioError::UnsupportedFormat(format!("Failed to create decoder: {}", e))
            })?;

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| AudioError::UnsupportedFormat("Sample rate not specified".to_string()))?;
        let channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(2);
        let duration_ms = codec_params
            .n_frames
            .map(|n| n * 1000 / sample_rate as u64)
            .unwrap_or(0);

        let info = TrackInfo {
            sample_rate,
            channels,
            duration_ms,
        };
        log::info!(
            "Loaded audio: {}Hz, {} channels, {} ms",
            info.sample_rate,
            info.channels,
            info.duration_ms
        );

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            info,
        })
    }

    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    /// Decode the next packet of the track as interleaved stereo samples.
    /// `Ok(None)` at end of stream.
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => {
                    return Err(AudioError::DecodingError(format!("Failed to read packet: {}", e)));
                }
            };

            // Skip packets that don't belong to our track
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => return Ok(Some(to_stereo(decoded))),
                Err(SymphoniaError::DecodeError(e)) => {
                    // corrupt packet, keep going
                    log::warn!("Skipping undecodable packet: {}", e);
                }
                Err(e) => {
                    return Err(AudioError::DecodingError(format!(
                        "Failed to decode packet: {}",
                        e
                    )));
                }
            }
        }
    }

    /// Seek to a specific time position
    pub fn seek(&mut self, position_ms: u64) -> Result<()> {
        let timestamp = position_ms * self.info.sample_rate as u64 / 1000;

        self.format_reader
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: timestamp,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| AudioError::InvalidState(format!("Seek failed: {}", e)))?;

        // Reset decoder after seek
        self.decoder.reset();
        Ok(())
    }
}

/// Convert a decoded buffer to interleaved stereo f32.
/// Mono is duplicated, channels beyond the second are dropped.
fn to_stereo(buffer: AudioBufferRef) -> Vec<f32> {
    let num_channels = buffer.spec().channels.count();
    let num_frames = buffer.frames();
    let mut planes: Vec<Vec<f32>> =
        vec![Vec::with_capacity(num_frames); num_channels.min(OUTPUT_CHANNELS)];

    macro_rules! collect_planes {
        ($buf:expr, $convert:expr) => {
            for (ch_idx, plane) in planes.iter_mut().enumerate() {
                plane.extend($buf.chan(ch_idx).iter().map($convert));
            }
        };
    }

    match buffer {
        AudioBufferRef::F32(buf) => collect_planes!(buf, |s: &f32| *s),
        AudioBufferRef::F64(buf) => collect_planes!(buf, |s: &f64| *s as f32),
        AudioBufferRef::S8(buf) => collect_planes!(buf, |s: &i8| *s as f32 / 128.0),
        AudioBufferRef::S16(buf) => collect_planes!(buf, |s: &i16| *s as f32 / 32768.0),
        AudioBufferRef::S24(buf) => {
            collect_planes!(buf, |s: &symphonia::core::sample::i24| s.inner() as f32 / 8388608.0)
        }
        AudioBufferRef::S32(buf) => collect_planes!(buf, |s: &i32| *s as f32 / 2147483648.0),
        AudioBufferRef::U8(buf) => collect_planes!(buf, |s: &u8| (*s as f32 - 128.0) / 128.0),
        AudioBufferRef::U16(buf) => collect_planes!(buf, |s: &u16| (*s as f32 - 32768.0) / 32768.0),
        AudioBufferRef::U24(buf) => collect_planes!(buf, |s: &symphonia::core::sample::u24| {
            (s.inner() as f32 - 8388608.0) / 8388608.0
        }),
        AudioBufferRef::U32(buf) => {
            collect_planes!(buf, |s: &u32| (*s as f32 - 2147483648.0) / 2147483648.0)
        }
    }

    let mut output = Vec::with_capacity(num_frames * OUTPUT_CHANNELS);
    match planes.as_slice() {
        [mono] => {
            for sample in mono {
                output.push(*sample);
                output.push(*sample);
            }
        }
        [left, right] => {
            for (l, r) in left.iter().zip(right) {
                output.push(*l);
                output.push(*r);
            }
        }
        _ => {}
    }
    output
}
