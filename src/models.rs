//! Model catalog and loading.
//!
//! Every model task needs two artifacts: the shared encoder and its own head.
//! Paths are checked when a task is constructed so a missing file aborts only
//! that task's stage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::embedding::EmbeddingModel;
use crate::error::{AnnotateError, Result};
use crate::heads::ClassifierHead;

pub const EMBEDDING_MODEL: &str = "discogs-effnet-bsdynamic-1.onnx";
pub const GENRE_MODEL: &str = "genre_discogs400-discogs-effnet-1.onnx";
pub const INSTRUMENT_MODEL: &str = "mtg_jamendo_instrument-discogs-effnet-1.onnx";
pub const MOOD_THEME_MODEL: &str = "mtg_jamendo_moodtheme-discogs-effnet-1.onnx";

/// Binary mood head file for a mood label such as `mood_happy`.
pub fn mood_model(mood: &str) -> String {
    format!("{mood}-discogs-effnet-1.onnx")
}

/// Resolve a model file inside `models_dir`, failing if it is absent.
pub fn require(models_dir: &Path, file: &str) -> Result<PathBuf> {
    let path = models_dir.join(file);
    if path.is_file() {
        Ok(path)
    } else {
        Err(AnnotateError::MissingModel(path))
    }
}

/// Tensor names for a head model.
#[derive(Debug, Clone)]
pub struct HeadIo {
    pub input: &'static str,
    pub output: &'static str,
}

pub const HEAD_IO: HeadIo = HeadIo {
    input: "embeddings",
    output: "activations",
};

pub fn load_embedding(models_dir: &Path) -> Result<Arc<dyn EmbeddingModel>> {
    let path = require(models_dir, EMBEDDING_MODEL)?;
    backend::load_embedding(&path)
}

pub fn load_head(path: &Path, io: &HeadIo) -> Result<Box<dyn ClassifierHead>> {
    backend::load_head(path, io)
}

#[cfg(feature = "onnx")]
mod backend {
    use super::*;
    use crate::onnx::{OnnxEmbedding, OnnxHead};

    pub fn load_embedding(path: &Path) -> Result<Arc<dyn EmbeddingModel>> {
        Ok(Arc::new(OnnxEmbedding::load(path)?))
    }

    pub fn load_head(path: &Path, io: &HeadIo) -> Result<Box<dyn ClassifierHead>> {
        Ok(Box::new(OnnxHead::load(path, io.input, io.output)?))
    }
}

#[cfg(not(feature = "onnx"))]
mod backend {
    use super::*;

    const DISABLED: &str = "built without the `onnx` feature";

    pub fn load_embedding(path: &Path) -> Result<Arc<dyn EmbeddingModel>> {
        let _ = path;
        Err(AnnotateError::Runtime(DISABLED.into()))
    }

    pub fn load_head(path: &Path, io: &HeadIo) -> Result<Box<dyn ClassifierHead>> {
        let _ = (path, io);
        Err(AnnotateError::Runtime(DISABLED.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = require(dir.path(), GENRE_MODEL).unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, AnnotateError::MissingModel(p) if p.ends_with(GENRE_MODEL)));
    }

    #[test]
    fn mood_model_names() {
        assert_eq!(mood_model("mood_sad"), "mood_sad-discogs-effnet-1.onnx");
    }
}
