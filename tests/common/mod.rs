#![allow(dead_code)]

use ndarray::Array2;
use std::path::Path;

use music_annotator::embedding::{Embedding, EmbeddingModel};
use music_annotator::error::{AnnotateError, Result};
use music_annotator::heads::{ClassifierHead, Prediction};

/// Write a 16-bit mono sine tone.
pub fn write_tone(path: &Path, seconds: f32, sample_rate: u32, freq: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let n = (seconds * sample_rate as f32) as usize;
    for i in 0..n {
        let t = i as f32 / sample_rate as f32;
        let s = (t * freq * 2.0 * std::f32::consts::PI).sin() * 0.5;
        writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// Raw WAV bytes of a short tone.
pub fn tone_bytes(seconds: f32) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_tone(&path, seconds, 44_100, 440.0);
    std::fs::read(path).unwrap()
}

/// Encoder that returns a fixed number of constant segments.
pub struct FixedEmbedder {
    pub segments: usize,
    pub dims: usize,
}

impl EmbeddingModel for FixedEmbedder {
    fn embed(&self, _samples: &[f32]) -> Result<Embedding> {
        Ok(Embedding::from_rows(Array2::from_elem(
            (self.segments, self.dims),
            0.5,
        )))
    }
}

/// Head that returns the same segments × classes matrix for every input.
pub struct FixedHead(pub Array2<f32>);

impl ClassifierHead for FixedHead {
    fn predict(&self, _embedding: &Embedding) -> Result<Prediction> {
        Ok(Prediction::Vector(self.0.clone()))
    }
}

/// Head whose output is not a float tensor.
pub struct OpaqueHead;

impl ClassifierHead for OpaqueHead {
    fn predict(&self, _embedding: &Embedding) -> Result<Prediction> {
        Ok(Prediction::Opaque("tensor<string>".into()))
    }
}

/// Encoder that rejects waveforms shorter than `min_samples`.
pub struct FailingEmbedder {
    pub min_samples: usize,
}

impl EmbeddingModel for FailingEmbedder {
    fn embed(&self, samples: &[f32]) -> Result<Embedding> {
        if samples.len() < self.min_samples {
            return Err(AnnotateError::Embedding(format!(
                "{} samples is too short",
                samples.len()
            )));
        }
        Ok(Embedding::from_rows(Array2::from_elem((2, 4), 0.5)))
    }
}

/// Head whose every call errors.
pub struct FailingHead;

impl ClassifierHead for FailingHead {
    fn predict(&self, _embedding: &Embedding) -> Result<Prediction> {
        Err(AnnotateError::head("failing", "session run failed"))
    }
}
