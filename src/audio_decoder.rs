//! Decodes a file (or an uploaded buffer) with symphonia, averages it down to
//! mono and resamples it to the rate the consuming stage needs.
//!
//! Files are read entirely into memory before decoding.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use rubato::{FftFixedIn, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{AnnotateError, Result};

const RESAMPLE_CHUNK: usize = 1024;

/// Mono waveform at a known sample rate
#[derive(Debug, Clone)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Load `path` as a mono waveform at `target_sr`.
pub fn load_mono(path: &Path, target_sr: u32) -> Result<Waveform> {
    let file_data = fs::read(path).map_err(|e| AnnotateError::load(path, e))?;
    let ext = path.extension().and_then(|e| e.to_str());
    decode_mono(file_data, ext, target_sr).map_err(|reason| AnnotateError::load(path, reason))
}

/// Decode an in-memory buffer; `name` supplies the probe hint and the path
/// reported on failure.
pub fn load_mono_from_memory(file_data: Vec<u8>, name: &str, target_sr: u32) -> Result<Waveform> {
    let ext = Path::new(name).extension().and_then(|e| e.to_str());
    decode_mono(file_data, ext, target_sr).map_err(|reason| AnnotateError::load(name, reason))
}

fn decode_mono(
    file_data: Vec<u8>,
    ext: Option<&str>,
    target_sr: u32,
) -> std::result::Result<Waveform, String> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(file_data)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = ext {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| format!("failed to probe audio format: {e}"))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| "no audio track found".to_string())?;

    let track_id = track.id;
    let mut source_sr = track.codec_params.sample_rate.unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| format!("failed to create decoder: {e}"))?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(format!("failed to read packet: {e}")),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(format!("decode failed: {e}")),
        };

        let spec = *decoded.spec();
        source_sr = spec.rate;
        let channels = spec.channels.count().max(1);

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);

        if channels == 1 {
            samples.extend_from_slice(buf.samples());
        } else {
            samples.extend(
                buf.samples()
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }
    }

    if samples.is_empty() {
        return Err("no audio decoded".to_string());
    }
    if source_sr == 0 {
        return Err("no sample rate in track".to_string());
    }

    let samples = resample(&samples, source_sr, target_sr)
        .map_err(|e| format!("resampling {source_sr} Hz -> {target_sr} Hz failed: {e}"))?;

    Ok(Waveform {
        samples,
        sample_rate: target_sr,
    })
}

/// Resample a mono signal, trimming the result to the expected length.
pub fn resample(
    samples: &[f32],
    source_sr: u32,
    target_sr: u32,
) -> std::result::Result<Vec<f32>, Box<dyn std::error::Error + Send + Sync>> {
    if source_sr == target_sr || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = FftFixedIn::<f32>::new(
        source_sr as usize,
        target_sr as usize,
        RESAMPLE_CHUNK,
        1,
        1,
    )?;

    let expected = (samples.len() as f64 * target_sr as f64 / source_sr as f64).round() as usize;
    let mut output = Vec::with_capacity(expected + RESAMPLE_CHUNK);
    let mut input_buffer = vec![vec![0.0f32; RESAMPLE_CHUNK]; 1];

    for chunk in samples.chunks(RESAMPLE_CHUNK) {
        input_buffer[0][..chunk.len()].copy_from_slice(chunk);
        input_buffer[0][chunk.len()..].fill(0.0);
        let waves_out = resampler.process(&input_buffer, None)?;
        output.extend_from_slice(&waves_out[0]);
    }

    // Flush the resampler's internal delay with silence.
    while output.len() < expected {
        input_buffer[0].fill(0.0);
        let waves_out = resampler.process(&input_buffer, None)?;
        if waves_out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&waves_out[0]);
    }

    output.truncate(expected);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_produces_expected_length() {
        let input: Vec<f32> = (0..44_100).map(|i| (i as f32 * 0.01).sin()).collect();
        let out = resample(&input, 44_100, 16_000).unwrap();
        assert_eq!(out.len(), 16_000);
    }

    #[test]
    fn resample_same_rate_is_identity() {
        let input = vec![0.1, -0.2, 0.3];
        assert_eq!(resample(&input, 16_000, 16_000).unwrap(), input);
    }

    #[test]
    fn garbage_bytes_fail_to_load() {
        let err = load_mono_from_memory(b"not audio at all".to_vec(), "x.mp3", 16_000)
            .unwrap_err();
        assert!(matches!(err, AnnotateError::Load { .. }));
    }
}
