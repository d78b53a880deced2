//! Label sets for each classification task.

use serde::Deserialize;
use std::path::Path;

use crate::error::Result;

/// The five binary mood heads, in output order
pub const MOOD_LABELS: &[&str] = &[
    "mood_aggressive",
    "mood_happy",
    "mood_party",
    "mood_relaxed",
    "mood_sad",
];

/// 56 MTG-Jamendo mood/theme labels
pub const MOOD_THEME_LABELS: &[&str] = &[
    "action", "adventure", "advertising", "background", "ballad", "calm", "children", "christmas",
    "commercial", "cool", "corporate", "dark", "deep", "documentary", "drama", "dramatic", "dream",
    "emotional", "energetic", "epic", "fast", "film", "fun", "funny", "game", "groovy", "happy",
    "heavy", "holiday", "hopeful", "inspiring", "love", "meditative", "melancholic", "melodic",
    "motivational", "movie", "nature", "party", "positive", "powerful", "relaxing", "retro",
    "romantic", "sad", "sexy", "slow", "soft", "soundscape", "space", "sport", "summer", "trailer",
    "travel", "upbeat", "uplifting",
];

/// 40 MTG-Jamendo instrument labels
pub const INSTRUMENT_LABELS: &[&str] = &[
    "accordion", "acousticbassguitar", "acousticguitar", "bass", "beat", "bell", "bongo", "brass",
    "cello", "clarinet", "classicalguitar", "computer", "doublebass", "drummachine", "drums",
    "electricguitar", "electricpiano", "flute", "guitar", "harmonica", "harp", "horn", "keyboard",
    "oboe", "orchestra", "organ", "pad", "percussion", "piano", "pipeorgan", "rhodes", "sampler",
    "saxophone", "strings", "synthesizer", "trombone", "trumpet", "viola", "violin", "voice",
];

/// Size of the Discogs genre/style taxonomy
pub const GENRE_COUNT: usize = 400;

/// Ordered labels a head's output aligns with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn from_static(labels: &[&str]) -> Self {
        Self::new(labels.iter().map(|l| l.to_string()).collect())
    }

    /// Labels that are just their index ("0", "1", ...).
    pub fn numbered(count: usize) -> Self {
        Self::new((0..count).map(|i| i.to_string()).collect())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }
}

/// The subset of a model's metadata JSON we read.
#[derive(Debug, Deserialize)]
pub struct ModelMetadata {
    #[serde(default)]
    pub classes: Vec<String>,
}

impl ModelMetadata {
    /// Metadata sitting next to a model file (`model.onnx` -> `model.json`).
    /// A missing file is `Ok(None)`.
    pub fn for_model(model_path: &Path) -> Result<Option<Self>> {
        let path = model_path.with_extension("json");
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

/// Genre labels from the model metadata when it lists exactly
/// [`GENRE_COUNT`] classes, else numbered labels.
pub fn genre_labels(model_path: &Path) -> LabelSet {
    match ModelMetadata::for_model(model_path) {
        Ok(Some(meta)) if meta.classes.len() == GENRE_COUNT => LabelSet::new(meta.classes),
        Ok(_) => LabelSet::numbered(GENRE_COUNT),
        Err(e) => {
            tracing::warn!("Ignoring unreadable genre metadata for {:?}: {}", model_path, e);
            LabelSet::numbered(GENRE_COUNT)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_set_sizes() {
        assert_eq!(MOOD_LABELS.len(), 5);
        assert_eq!(MOOD_THEME_LABELS.len(), 56);
        assert_eq!(INSTRUMENT_LABELS.len(), 40);
    }

    #[test]
    fn genre_labels_fall_back_to_indices() {
        let dir = tempfile::tempdir().unwrap();
        let labels = genre_labels(&dir.path().join("genre.onnx"));
        assert_eq!(labels.len(), GENRE_COUNT);
        assert_eq!(labels.get(399), Some("399"));
    }

    #[test]
    fn genre_labels_read_from_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let classes: Vec<String> = (0..GENRE_COUNT).map(|i| format!("Style{i}")).collect();
        std::fs::write(
            dir.path().join("genre.json"),
            serde_json::json!({ "name": "genre", "classes": classes }).to_string(),
        )
        .unwrap();
        let labels = genre_labels(&dir.path().join("genre.onnx"));
        assert_eq!(labels.get(7), Some("Style7"));
    }
}
