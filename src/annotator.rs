//! Single-file annotator used by `analyze` and the HTTP server.
//!
//! The encoder runs once per file and every head reads the same embedding.
//! Features use a 44.1 kHz decode and the encoder a separate 16 kHz decode.
//! A section that cannot be computed is left `null` and its reason goes into
//! `errors`; only an undecodable file fails the whole call.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::audio_decoder::{self, Waveform};
use crate::charts;
use crate::config::{SAMPLE_RATE_HIGH, SAMPLE_RATE_LOW};
use crate::embedding::{Embedding, EmbeddingModel};
use crate::error::{AnnotateError, Result};
use crate::heads::{LabelScore, Scores};
use crate::models;
use crate::record::Fields;
use crate::tasks::genre::GenreScore;
use crate::tasks::{FeatureTask, GenreTask, LabeledTask, MoodTask, Task, TopGenres};

pub const FEATURES: &str = "features";
pub const EMBEDDING: &str = "embedding";
pub const MOODS: &str = "moods";
pub const GENRES: &str = "genres";
pub const INSTRUMENTS: &str = "instruments";
pub const MOOD_THEMES: &str = "mood_themes";

/// Feature fields serialized as an object in column order.
#[derive(Debug, Clone, Default)]
pub struct FieldMap(pub Fields);

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Default, Serialize)]
pub struct Charts {
    pub mood_radar: Option<Json>,
    pub instruments: Option<Json>,
    pub mood_themes: Option<Json>,
}

#[derive(Debug, Serialize)]
pub struct Annotation {
    pub filename: String,
    pub features: Option<FieldMap>,
    pub moods: Option<Vec<LabelScore>>,
    pub genres: Option<Vec<GenreScore>>,
    pub instruments: Option<Vec<LabelScore>>,
    pub mood_themes: Option<Vec<LabelScore>>,
    pub charts: Charts,
    /// Section name -> reason it is missing
    pub errors: BTreeMap<String, String>,
}

impl Annotation {
    fn empty(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            features: None,
            moods: None,
            genres: None,
            instruments: None,
            mood_themes: None,
            charts: Charts::default(),
            errors: BTreeMap::new(),
        }
    }

    fn fail(&mut self, section: &str, reason: impl ToString) {
        let reason = reason.to_string();
        warn!("[{}] {} unavailable: {}", self.filename, section, reason);
        self.errors.insert(section.to_string(), reason);
    }
}

/// All tasks a single-file analysis can run. Model sections are optional so
/// the annotator still serves basic features when models are missing.
pub struct Annotator {
    features: FeatureTask,
    embedder: Option<Arc<dyn EmbeddingModel>>,
    mood: Option<MoodTask>,
    genre: Option<GenreTask>,
    instruments: Option<LabeledTask>,
    mood_themes: Option<LabeledTask>,
    /// Sections that failed to load, reported on every call
    unavailable: BTreeMap<String, String>,
}

impl Annotator {
    /// Features only; attach model sections with the `with_*` methods.
    pub fn new(embedder: Option<Arc<dyn EmbeddingModel>>) -> Self {
        Self {
            features: FeatureTask::new(),
            embedder,
            mood: None,
            genre: None,
            instruments: None,
            mood_themes: None,
            unavailable: BTreeMap::new(),
        }
    }

    pub fn with_mood(mut self, task: MoodTask) -> Self {
        self.mood = Some(task);
        self
    }

    pub fn with_genre(mut self, task: GenreTask) -> Self {
        self.genre = Some(task);
        self
    }

    pub fn with_instruments(mut self, task: LabeledTask) -> Self {
        self.instruments = Some(task);
        self
    }

    pub fn with_mood_themes(mut self, task: LabeledTask) -> Self {
        self.mood_themes = Some(task);
        self
    }

    /// Load the encoder once and every head around it. Load failures are
    /// remembered per section instead of failing construction.
    pub fn load(models_dir: &Path) -> Self {
        let embedder = match models::load_embedding(models_dir) {
            Ok(e) => e,
            Err(e) => {
                warn!("Encoder unavailable, serving basic features only: {}", e);
                let mut annotator = Self::new(None);
                for section in [MOODS, GENRES, INSTRUMENTS, MOOD_THEMES] {
                    annotator.unavailable.insert(section.to_string(), e.to_string());
                }
                return annotator;
            }
        };

        let mut annotator = Self::new(Some(embedder.clone()));
        match MoodTask::with_embedder(embedder.clone(), models_dir) {
            Ok(t) => annotator.mood = Some(t),
            Err(e) => annotator.mark_unavailable(MOODS, e),
        }
        match GenreTask::with_embedder(embedder.clone(), models_dir) {
            Ok(t) => annotator.genre = Some(t),
            Err(e) => annotator.mark_unavailable(GENRES, e),
        }
        match LabeledTask::instruments_with(embedder.clone(), models_dir) {
            Ok(t) => annotator.instruments = Some(t),
            Err(e) => annotator.mark_unavailable(INSTRUMENTS, e),
        }
        match LabeledTask::mood_themes_with(embedder, models_dir) {
            Ok(t) => annotator.mood_themes = Some(t),
            Err(e) => annotator.mark_unavailable(MOOD_THEMES, e),
        }
        info!(
            "Annotator ready ({} of 4 model sections loaded)",
            4 - annotator.unavailable.len()
        );
        annotator
    }

    fn mark_unavailable(&mut self, section: &str, error: AnnotateError) {
        warn!("{} unavailable: {}", section, error);
        self.unavailable.insert(section.to_string(), error.to_string());
    }

    /// Sections that could not be loaded, with the reason.
    pub fn unavailable(&self) -> &BTreeMap<String, String> {
        &self.unavailable
    }

    fn has_models(&self) -> bool {
        self.mood.is_some()
            || self.genre.is_some()
            || self.instruments.is_some()
            || self.mood_themes.is_some()
    }

    pub fn analyze_path(&self, path: &Path) -> Result<Annotation> {
        let bytes = std::fs::read(path).map_err(|e| AnnotateError::load(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.analyze_bytes(bytes, &name)
    }

    /// Annotate an in-memory file. `name` is the reported filename and the
    /// decoder's format hint.
    pub fn analyze_bytes(&self, bytes: Vec<u8>, name: &str) -> Result<Annotation> {
        let started = Instant::now();
        let audio = audio_decoder::load_mono_from_memory(bytes.clone(), name, SAMPLE_RATE_HIGH)?;
        // Decoded separately at the model rate, as the batch model stages do.
        let model_input = self
            .has_models()
            .then(|| audio_decoder::load_mono_from_memory(bytes, name, SAMPLE_RATE_LOW));
        let annotation = self.annotate(&audio, model_input, name);
        debug!("[{}] analyzed in {:?}", name, started.elapsed());
        Ok(annotation)
    }

    /// Annotate a waveform already decoded at the feature sample rate. The
    /// model input is resampled from it.
    pub fn analyze_waveform(&self, audio: &Waveform, name: &str) -> Annotation {
        let model_input = self.has_models().then(|| {
            audio_decoder::resample(&audio.samples, audio.sample_rate, SAMPLE_RATE_LOW)
                .map(|samples| Waveform {
                    samples,
                    sample_rate: SAMPLE_RATE_LOW,
                })
                .map_err(|e| AnnotateError::Embedding(e.to_string()))
        });
        self.annotate(audio, model_input, name)
    }

    fn annotate(&self, audio: &Waveform, model_input: Option<Result<Waveform>>, name: &str) -> Annotation {
        let mut out = Annotation::empty(name);
        for (section, reason) in &self.unavailable {
            out.errors.insert(section.clone(), reason.clone());
        }

        match self.features.annotate(audio) {
            Ok(fields) => out.features = Some(FieldMap(fields)),
            Err(e) => out.fail(FEATURES, e),
        }

        match model_input.map(|input| input.and_then(|w| self.embed(&w))) {
            Some(Ok(embedding)) => self.run_heads(&embedding, &mut out),
            Some(Err(e)) => out.fail(EMBEDDING, e),
            None => {}
        }

        out.charts = Charts {
            mood_radar: out.moods.as_deref().and_then(charts::mood_radar),
            instruments: out.instruments.as_deref().and_then(charts::instrument_bars),
            mood_themes: out.mood_themes.as_deref().and_then(charts::theme_bars),
        };
        out
    }

    fn embed(&self, audio: &Waveform) -> Result<Embedding> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| AnnotateError::Embedding("no encoder loaded".into()))?;
        embedder.embed(&audio.samples)
    }

    fn run_heads(&self, embedding: &Embedding, out: &mut Annotation) {
        if let Some(task) = &self.mood {
            match task.predict(embedding) {
                Ok(moods) => out.moods = Some(moods),
                Err(e) => out.fail(MOODS, e),
            }
        }
        if let Some(task) = &self.genre {
            match task.predict(embedding) {
                Ok(TopGenres::Ranked(genres)) => out.genres = Some(genres),
                Ok(TopGenres::Opaque(raw)) => out.fail(GENRES, format!("unusable head output: {raw}")),
                Err(e) => out.fail(GENRES, e),
            }
        }
        if let Some(task) = &self.instruments {
            match task.predict(embedding) {
                Ok(Scores::Labeled(scores)) => out.instruments = Some(scores),
                Ok(Scores::Opaque(raw)) => out.fail(INSTRUMENTS, format!("unusable head output: {raw}")),
                Err(e) => out.fail(INSTRUMENTS, e),
            }
        }
        if let Some(task) = &self.mood_themes {
            match task.predict(embedding) {
                Ok(Scores::Labeled(scores)) => out.mood_themes = Some(scores),
                Ok(Scores::Opaque(raw)) => out.fail(MOOD_THEMES, format!("unusable head output: {raw}")),
                Err(e) => out.fail(MOOD_THEMES, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    #[test]
    fn features_only_when_no_models() {
        let annotator = Annotator::new(None);
        let audio = Waveform {
            samples: (0..44_100).map(|i| (i as f32 * 0.05).sin()).collect(),
            sample_rate: 44_100,
        };
        let out = annotator.analyze_waveform(&audio, "tone.wav");

        let features = out.features.as_ref().unwrap();
        assert_eq!(features.0[0], ("duration".to_string(), Value::Number(1.0)));
        assert!(out.moods.is_none());
        assert!(out.errors.is_empty());

        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["filename"], "tone.wav");
        assert!(json["features"]["energy"].is_number());
        assert!(json["charts"]["mood_radar"].is_null());
    }

    #[test]
    fn missing_models_directory_is_reported_per_section() {
        let dir = tempfile::tempdir().unwrap();
        let annotator = Annotator::load(dir.path());
        let audio = Waveform {
            samples: vec![0.1; 22_050],
            sample_rate: 44_100,
        };
        let out = annotator.analyze_waveform(&audio, "x.wav");
        assert!(out.features.is_some());
        for section in [MOODS, GENRES, INSTRUMENTS, MOOD_THEMES] {
            assert!(out.errors.contains_key(section), "{section}");
        }
    }

    #[test]
    fn undecodable_bytes_fail_the_call() {
        let annotator = Annotator::new(None);
        assert!(matches!(
            annotator.analyze_bytes(b"not audio".to_vec(), "x.mp3"),
            Err(AnnotateError::Load { .. })
        ));
    }
}
