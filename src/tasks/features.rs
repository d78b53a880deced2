//! Basic descriptive features, each computed independently so one failing
//! descriptor only nulls its own column.

use super::{Stage, Task};
use crate::audio_decoder::Waveform;
use crate::config::{FRAME_SIZE, HOP_SIZE, SAMPLE_RATE_HIGH};
use crate::descriptors::{self, mean_stdev, Frames, Rhythm};
use crate::error::{AnnotateError, Result};
use crate::record::{attempt, Fields, Value};

#[derive(Debug, Default)]
pub struct FeatureTask;

impl FeatureTask {
    pub fn new() -> Self {
        Self
    }
}

fn unavailable(name: &str, why: &str) -> AnnotateError {
    AnnotateError::Descriptor(name.to_string(), why.to_string())
}

impl Task for FeatureTask {
    fn stage(&self) -> Stage {
        Stage::Features
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE_HIGH
    }

    fn annotate(&self, audio: &Waveform) -> Result<Fields> {
        let y = &audio.samples;
        let sr = audio.sample_rate;
        if y.is_empty() {
            return Err(unavailable("waveform", "no samples decoded"));
        }

        let frames: Frames = descriptors::analyze_frames(y, sr, FRAME_SIZE, HOP_SIZE);
        let spectral = |pick: fn(&descriptors::SpectralShape) -> f32| {
            let values: Vec<f32> = frames.shape.iter().map(pick).collect();
            mean_stdev(&values).0
        };

        // One beat/key analysis feeds four columns.
        let rhythm = descriptors::rhythm(y, sr);
        let from_rhythm = |name: &str, pick: fn(&Rhythm) -> Option<Value>| {
            attempt(name, || match &rhythm {
                Ok(r) => pick(r).ok_or_else(|| unavailable(name, "not detected")),
                Err(e) => Err(unavailable(name, e)),
            })
        };

        let fields = vec![
            ("duration", attempt("duration", || Ok(audio.duration_secs() as f32))),
            ("tempo", from_rhythm("tempo", |r| r.bpm.map(Value::Number))),
            (
                "key",
                from_rhythm("key", |r| r.key.as_ref().map(|(tonic, _)| Value::Text(tonic.clone()))),
            ),
            (
                "scale",
                from_rhythm("scale", |r| r.key.as_ref().map(|(_, scale)| Value::Text(scale.to_string()))),
            ),
            (
                "danceability",
                from_rhythm("danceability", |r| r.danceability.map(Value::Number)),
            ),
            ("energy", attempt("energy", || Ok(descriptors::energy(y)))),
            ("rms", attempt("rms", || Ok(descriptors::rms(y)))),
            ("loudness", attempt("loudness", || Ok(descriptors::loudness(y)))),
            (
                "dynamic_complexity",
                attempt("dynamic_complexity", || {
                    descriptors::dynamic_complexity(y, sr)
                        .ok_or_else(|| unavailable("dynamic_complexity", "clip shorter than 2 s or silent"))
                }),
            ),
            (
                "zero_crossing_rate",
                attempt("zero_crossing_rate", || Ok(descriptors::zero_crossing_rate(y))),
            ),
            (
                "spectral_centroid",
                attempt("spectral_centroid", || Ok(spectral(|s| s.centroid))),
            ),
            (
                "spectral_rolloff",
                attempt("spectral_rolloff", || Ok(spectral(|s| s.rolloff))),
            ),
            (
                "spectral_flatness",
                attempt("spectral_flatness", || Ok(spectral(|s| s.flatness))),
            ),
            (
                "crest_factor",
                attempt("crest_factor", || {
                    descriptors::crest_factor(y).ok_or_else(|| unavailable("crest_factor", "silent"))
                }),
            ),
        ];

        Ok(fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_clip_nulls_only_undefined_fields() {
        let audio = Waveform {
            samples: vec![0.0; 44_100],
            sample_rate: 44_100,
        };
        let fields = FeatureTask::new().annotate(&audio).unwrap();
        let get = |n: &str| fields.iter().find(|(k, _)| k == n).map(|(_, v)| v.clone());

        assert_eq!(get("duration"), Some(Value::Number(1.0)));
        assert_eq!(get("energy"), Some(Value::Number(0.0)));
        assert_eq!(get("crest_factor"), Some(Value::Null));
        assert_eq!(get("dynamic_complexity"), Some(Value::Null));
        assert_eq!(get("tempo"), Some(Value::Null));
        assert_eq!(fields.len(), 14);
        assert_eq!(fields[1].0, "tempo");
        assert_eq!(fields[4].0, "danceability");
    }

    #[test]
    fn empty_waveform_is_an_error() {
        let audio = Waveform {
            samples: Vec::new(),
            sample_rate: 44_100,
        };
        assert!(FeatureTask::new().annotate(&audio).is_err());
    }
}
