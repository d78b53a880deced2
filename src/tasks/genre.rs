//! Discogs 400-style genre head, reduced to the five most probable styles.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use super::{Stage, Task};
use crate::audio_decoder::Waveform;
use crate::config::SAMPLE_RATE_LOW;
use crate::embedding::{Embedding, EmbeddingModel};
use crate::error::Result;
use crate::heads::{mean_over_segments, top_k, ClassifierHead, Prediction};
use crate::labels::{genre_labels, LabelSet};
use crate::models::{self, HEAD_IO};
use crate::record::{Fields, Value, PREDICTIONS_COLUMN};

pub const TOP_GENRES: usize = 5;
pub const INDICES_COLUMN: &str = "top_genre_indices";
pub const PROBABILITIES_COLUMN: &str = "top_genre_probabilities";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreScore {
    pub index: usize,
    pub label: String,
    pub probability: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopGenres {
    Ranked(Vec<GenreScore>),
    Opaque(String),
}

impl TopGenres {
    /// Two parallel comma-joined lists; probabilities to four decimals.
    pub fn to_fields(&self) -> Fields {
        match self {
            TopGenres::Ranked(scores) => {
                let indices = scores
                    .iter()
                    .map(|s| s.index.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                let probabilities = scores
                    .iter()
                    .map(|s| format!("{:.4}", s.probability))
                    .collect::<Vec<_>>()
                    .join(", ");
                vec![
                    (INDICES_COLUMN.to_string(), Value::Text(indices)),
                    (PROBABILITIES_COLUMN.to_string(), Value::Text(probabilities)),
                ]
            }
            TopGenres::Opaque(raw) => vec![
                (INDICES_COLUMN.to_string(), Value::Null),
                (PROBABILITIES_COLUMN.to_string(), Value::Null),
                (PREDICTIONS_COLUMN.to_string(), Value::Text(raw.clone())),
            ],
        }
    }
}

/// Rank an averaged probability vector.
pub fn rank(probs: &[f32], labels: &LabelSet, k: usize) -> Vec<GenreScore> {
    top_k(probs, k)
        .into_iter()
        .map(|(index, probability)| GenreScore {
            index,
            label: labels
                .get(index)
                .map_or_else(|| index.to_string(), str::to_string),
            probability,
        })
        .collect()
}

pub struct GenreTask {
    embedder: Arc<dyn EmbeddingModel>,
    head: Box<dyn ClassifierHead>,
    labels: LabelSet,
}

impl GenreTask {
    pub fn new(embedder: Arc<dyn EmbeddingModel>, head: Box<dyn ClassifierHead>, labels: LabelSet) -> Self {
        Self {
            embedder,
            head,
            labels,
        }
    }

    pub fn from_models_dir(models_dir: &Path) -> Result<Self> {
        let embedder = models::load_embedding(models_dir)?;
        Self::with_embedder(embedder, models_dir)
    }

    pub fn with_embedder(embedder: Arc<dyn EmbeddingModel>, models_dir: &Path) -> Result<Self> {
        let path = models::require(models_dir, models::GENRE_MODEL)?;
        let labels = genre_labels(&path);
        let head = models::load_head(&path, &HEAD_IO)?;
        Ok(Self::new(embedder, head, labels))
    }

    pub fn predict(&self, embedding: &Embedding) -> Result<TopGenres> {
        Ok(match self.head.predict(embedding)? {
            Prediction::Vector(m) => {
                TopGenres::Ranked(rank(&mean_over_segments(&m), &self.labels, TOP_GENRES))
            }
            Prediction::Opaque(raw) => TopGenres::Opaque(raw),
        })
    }
}

impl Task for GenreTask {
    fn stage(&self) -> Stage {
        Stage::Genre
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE_LOW
    }

    fn annotate(&self, audio: &Waveform) -> Result<Fields> {
        let embedding = self.embedder.embed(&audio.samples)?;
        Ok(self.predict(&embedding)?.to_fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::GENRE_COUNT;

    #[test]
    fn top_five_of_synthetic_vector() {
        let mut probs = vec![0.001f32; GENRE_COUNT];
        probs[17] = 0.91;
        probs[250] = 0.42;
        probs[3] = 0.42;
        probs[399] = 0.3333333;
        probs[120] = 0.05;
        let ranked = rank(&probs, &LabelSet::numbered(GENRE_COUNT), TOP_GENRES);
        let fields = TopGenres::Ranked(ranked).to_fields();

        assert_eq!(fields[0].1, Value::Text("17, 3, 250, 399, 120".into()));
        assert_eq!(
            fields[1].1,
            Value::Text("0.9100, 0.4200, 0.4200, 0.3333, 0.0500".into())
        );
    }

    #[test]
    fn ranked_labels_come_from_label_set() {
        let labels = LabelSet::from_static(&["Rock---Punk", "Jazz---Swing", "Pop---Disco"]);
        let ranked = rank(&[0.2, 0.7, 0.1], &labels, 2);
        assert_eq!(ranked[0].label, "Jazz---Swing");
        assert_eq!(ranked[1].label, "Rock---Punk");
    }

    #[test]
    fn opaque_genre_output_keeps_raw_payload() {
        let fields = TopGenres::Opaque("String tensor".into()).to_fields();
        assert_eq!(fields[0].1, Value::Null);
        assert_eq!(fields[2], (PREDICTIONS_COLUMN.to_string(), Value::Text("String tensor".into())));
    }
}
