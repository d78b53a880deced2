//! Five binary one-vs-rest mood heads over the shared encoder.

use std::path::Path;
use std::sync::Arc;

use super::{Stage, Task};
use crate::audio_decoder::Waveform;
use crate::config::SAMPLE_RATE_LOW;
use crate::embedding::{Embedding, EmbeddingModel};
use crate::error::Result;
use crate::heads::{positive_probability, ClassifierHead, LabelScore};
use crate::labels::{ModelMetadata, MOOD_LABELS};
use crate::models::{self, HEAD_IO};
use crate::record::{Fields, Value};

pub struct MoodHead {
    pub label: String,
    pub head: Box<dyn ClassifierHead>,
    /// Column of the 2-class output holding the mood itself
    pub positive_index: usize,
}

pub struct MoodTask {
    embedder: Arc<dyn EmbeddingModel>,
    heads: Vec<MoodHead>,
}

impl MoodTask {
    pub fn new(embedder: Arc<dyn EmbeddingModel>, heads: Vec<MoodHead>) -> Self {
        Self { embedder, heads }
    }

    pub fn from_models_dir(models_dir: &Path) -> Result<Self> {
        let embedder = models::load_embedding(models_dir)?;
        Self::with_embedder(embedder, models_dir)
    }

    /// Load the mood heads around an already loaded encoder.
    pub fn with_embedder(embedder: Arc<dyn EmbeddingModel>, models_dir: &Path) -> Result<Self> {
        let mut heads = Vec::with_capacity(MOOD_LABELS.len());
        for label in MOOD_LABELS {
            let path = models::require(models_dir, &models::mood_model(label))?;
            let positive_index = positive_index(&path, label);
            heads.push(MoodHead {
                label: label.to_string(),
                head: models::load_head(&path, &HEAD_IO)?,
                positive_index,
            });
        }
        Ok(Self::new(embedder, heads))
    }

    /// Positive-class probability per mood. Any head error fails the whole
    /// mood record; an unusable payload only nulls that mood.
    pub fn predict(&self, embedding: &Embedding) -> Result<Vec<LabelScore>> {
        self.heads
            .iter()
            .map(|h| {
                let prediction = h.head.predict(embedding)?;
                Ok(LabelScore {
                    label: h.label.clone(),
                    probability: positive_probability(&prediction, h.positive_index),
                })
            })
            .collect()
    }
}

impl Task for MoodTask {
    fn stage(&self) -> Stage {
        Stage::Mood
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE_LOW
    }

    fn annotate(&self, audio: &Waveform) -> Result<Fields> {
        let embedding = self.embedder.embed(&audio.samples)?;
        Ok(self
            .predict(&embedding)?
            .into_iter()
            .map(|s| (s.label, Value::from(s.probability)))
            .collect())
    }
}

/// Index of the mood's own class in the head metadata (`mood_happy` ->
/// `happy`), defaulting to the first column.
fn positive_index(model_path: &Path, label: &str) -> usize {
    let class = label.trim_start_matches("mood_");
    match ModelMetadata::for_model(model_path) {
        Ok(Some(meta)) => meta.classes.iter().position(|c| c == class).unwrap_or(0),
        Ok(None) => 0,
        Err(e) => {
            tracing::warn!("Ignoring unreadable metadata for {:?}: {}", model_path, e);
            0
        }
    }
}
