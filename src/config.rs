//! Constants and default locations shared by the CLI, pipeline and server.

use std::path::{Path, PathBuf};

/// Sample rate for descriptive features
pub const SAMPLE_RATE_HIGH: u32 = 44_100;
/// Sample rate the embedding encoder expects
pub const SAMPLE_RATE_LOW: u32 = 16_000;

/// Frame and hop sizes for spectral descriptors
pub const FRAME_SIZE: usize = 2048;
pub const HOP_SIZE: usize = 1024;

/// Default input format for batch runs
pub const DEFAULT_INPUT_FORMAT: &str = "mp3";

pub const FEATURE_CSV: &str = "music_features.csv";
pub const LOW_LEVEL_CSV: &str = "low_level_features.csv";
pub const MOOD_CSV: &str = "mood_predictions.csv";
pub const GENRE_CSV: &str = "genre_predictions.csv";
pub const INSTRUMENT_CSV: &str = "instrument_predictions.csv";
pub const MOOD_THEME_CSV: &str = "mood_theme_predictions.csv";

/// Extensions accepted by the upload endpoint
pub const UPLOAD_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac"];
pub const DEFAULT_MAX_UPLOAD_MB: usize = 32;
pub const DEFAULT_PORT: u16 = 5000;

pub fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

pub fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

pub fn default_models_dir() -> PathBuf {
    PathBuf::from("assets/models")
}

/// Case-insensitive extension check against an allow-list.
pub fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            allowed
                .iter()
                .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}
