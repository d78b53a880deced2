//! Direct labeled heads: one probability per label from a single call.
//! Used for instrument detection and mood/theme classification.

use std::path::Path;
use std::sync::Arc;

use super::{Stage, Task};
use crate::audio_decoder::Waveform;
use crate::config::SAMPLE_RATE_LOW;
use crate::embedding::{Embedding, EmbeddingModel};
use crate::error::Result;
use crate::heads::{to_scores, ClassifierHead, Scores};
use crate::labels::{LabelSet, INSTRUMENT_LABELS, MOOD_THEME_LABELS};
use crate::models::{self, HEAD_IO};
use crate::record::{scores_to_fields, Fields};

pub struct LabeledTask {
    stage: Stage,
    embedder: Arc<dyn EmbeddingModel>,
    head: Box<dyn ClassifierHead>,
    labels: LabelSet,
}

impl LabeledTask {
    pub fn new(
        stage: Stage,
        embedder: Arc<dyn EmbeddingModel>,
        head: Box<dyn ClassifierHead>,
        labels: LabelSet,
    ) -> Self {
        Self {
            stage,
            embedder,
            head,
            labels,
        }
    }

    pub fn instruments(models_dir: &Path) -> Result<Self> {
        let embedder = models::load_embedding(models_dir)?;
        Self::instruments_with(embedder, models_dir)
    }

    pub fn mood_themes(models_dir: &Path) -> Result<Self> {
        let embedder = models::load_embedding(models_dir)?;
        Self::mood_themes_with(embedder, models_dir)
    }

    pub fn instruments_with(embedder: Arc<dyn EmbeddingModel>, models_dir: &Path) -> Result<Self> {
        Self::load(
            Stage::Instruments,
            embedder,
            models_dir,
            models::INSTRUMENT_MODEL,
            LabelSet::from_static(INSTRUMENT_LABELS),
        )
    }

    pub fn mood_themes_with(embedder: Arc<dyn EmbeddingModel>, models_dir: &Path) -> Result<Self> {
        Self::load(
            Stage::MoodTheme,
            embedder,
            models_dir,
            models::MOOD_THEME_MODEL,
            LabelSet::from_static(MOOD_THEME_LABELS),
        )
    }

    fn load(
        stage: Stage,
        embedder: Arc<dyn EmbeddingModel>,
        models_dir: &Path,
        file: &str,
        labels: LabelSet,
    ) -> Result<Self> {
        let path = models::require(models_dir, file)?;
        let head = models::load_head(&path, &HEAD_IO)?;
        Ok(Self::new(stage, embedder, head, labels))
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn predict(&self, embedding: &Embedding) -> Result<Scores> {
        Ok(to_scores(self.head.predict(embedding)?, &self.labels))
    }
}

impl Task for LabeledTask {
    fn stage(&self) -> Stage {
        self.stage
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE_LOW
    }

    fn annotate(&self, audio: &Waveform) -> Result<Fields> {
        let embedding = self.embedder.embed(&audio.samples)?;
        Ok(scores_to_fields(&self.predict(&embedding)?, &self.labels))
    }
}
