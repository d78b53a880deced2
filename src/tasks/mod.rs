//! Per-stage annotation tasks.
//!
//! A task turns one waveform into one record's fields. Model tasks own their
//! heads and share the encoder through an `Arc`, so the batch loop only ever
//! borrows them.

use std::fmt;
use std::path::Path;

use crate::audio_decoder::Waveform;
use crate::error::Result;
use crate::record::Fields;

pub mod features;
pub mod genre;
pub mod labeled;
pub mod low_level;
pub mod mood;

pub use features::FeatureTask;
pub use genre::{GenreTask, TopGenres};
pub use labeled::LabeledTask;
pub use low_level::LowLevelTask;
pub use mood::MoodTask;

/// The six pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Features,
    LowLevel,
    Mood,
    Genre,
    Instruments,
    MoodTheme,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Features,
        Stage::LowLevel,
        Stage::Mood,
        Stage::Genre,
        Stage::Instruments,
        Stage::MoodTheme,
    ];

    /// CSV file the stage writes into the results directory.
    pub fn output_file(self) -> &'static str {
        use crate::config::*;
        match self {
            Stage::Features => FEATURE_CSV,
            Stage::LowLevel => LOW_LEVEL_CSV,
            Stage::Mood => MOOD_CSV,
            Stage::Genre => GENRE_CSV,
            Stage::Instruments => INSTRUMENT_CSV,
            Stage::MoodTheme => MOOD_THEME_CSV,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Stage::Features => "Extracting basic audio features",
            Stage::LowLevel => "Extracting low-level audio features",
            Stage::Mood => "Classifying moods (aggressive, happy, party, relaxed, sad)",
            Stage::Genre => "Classifying genres",
            Stage::Instruments => "Detecting instruments",
            Stage::MoodTheme => "Classifying mood themes",
        }
    }

    /// Build the task for this stage from a models directory.
    pub fn build(self, models_dir: &Path) -> Result<Box<dyn Task>> {
        Ok(match self {
            Stage::Features => Box::new(FeatureTask::new()),
            Stage::LowLevel => Box::new(LowLevelTask::new()),
            Stage::Mood => Box::new(MoodTask::from_models_dir(models_dir)?),
            Stage::Genre => Box::new(GenreTask::from_models_dir(models_dir)?),
            Stage::Instruments => Box::new(LabeledTask::instruments(models_dir)?),
            Stage::MoodTheme => Box::new(LabeledTask::mood_themes(models_dir)?),
        })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Features => "features",
            Stage::LowLevel => "low-level",
            Stage::Mood => "mood",
            Stage::Genre => "genre",
            Stage::Instruments => "instruments",
            Stage::MoodTheme => "mood-theme",
        };
        f.write_str(name)
    }
}

pub trait Task {
    fn stage(&self) -> Stage;

    /// Rate the loader must deliver for this task.
    fn sample_rate(&self) -> u32;

    /// Fields for one file. An error drops the file from this task's table.
    fn annotate(&self, audio: &Waveform) -> Result<Fields>;
}
