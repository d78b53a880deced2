//! ONNX Runtime backed encoder and heads.
//!
//! Requires the `onnxruntime` shared library (dll/so/dylib) at runtime.
//! `Session::run` needs exclusive access, so each session sits behind a
//! mutex; concurrent server requests queue on it.

use ndarray::{Array2, Axis};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;
use std::sync::Mutex;

use crate::embedding::{Embedding, EmbeddingModel, MelFrontend, N_MELS, PATCH_FRAMES};
use crate::error::{AnnotateError, Result};
use crate::heads::{ClassifierHead, Prediction};

/// Patches per encoder call
const BATCH_SIZE: usize = 64;

enum RawOutput {
    Tensor(Vec<usize>, Vec<f32>),
    Other(String),
}

struct OnnxSession {
    name: String,
    session: Mutex<Session>,
    input: String,
    output: String,
}

impl OnnxSession {
    fn load(path: &Path, input: &str, output: &str) -> Result<Self> {
        let _ = ort::init().with_name("music_annotator").commit();

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| AnnotateError::Runtime(format!("failed to load {path:?}: {e}")))?;

        tracing::debug!("Loaded {:?}", path);
        for i in session.inputs() {
            tracing::debug!("  input '{}'", i.name());
        }
        for o in session.outputs() {
            tracing::debug!("  output '{}'", o.name());
        }

        Ok(Self {
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            session: Mutex::new(session),
            input: input.to_string(),
            output: output.to_string(),
        })
    }

    fn run(&self, shape: Vec<usize>, data: Vec<f32>) -> Result<RawOutput> {
        let failed = |e: &dyn std::fmt::Display| AnnotateError::head(&self.name, e);

        let input = Value::from_array((shape, data)).map_err(|e| failed(&e))?;
        let mut session = self
            .session
            .lock()
            .map_err(|_| AnnotateError::Runtime(format!("session `{}` poisoned", self.name)))?;
        let outputs = session
            .run(ort::inputs![self.input.as_str() => &input])
            .map_err(|e| failed(&e))?;

        let value = outputs
            .get(self.output.as_str())
            .ok_or_else(|| failed(&format!("missing output '{}'", self.output)))?;

        let raw = match value.try_extract_tensor::<f32>() {
            Ok((shape, data)) => {
                RawOutput::Tensor(shape.iter().map(|&d| d as usize).collect(), data.to_vec())
            }
            Err(_) => RawOutput::Other(format!("{:?}", value.dtype())),
        };
        Ok(raw)
    }
}

/// Discogs EffNet encoder: one 1280-d embedding per mel patch.
pub struct OnnxEmbedding {
    session: OnnxSession,
    frontend: MelFrontend,
}

impl OnnxEmbedding {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            session: OnnxSession::load(path, "melspectrogram", "embeddings")?,
            frontend: MelFrontend::new(crate::config::SAMPLE_RATE_LOW),
        })
    }
}

impl EmbeddingModel for OnnxEmbedding {
    fn embed(&self, waveform: &[f32]) -> Result<Embedding> {
        let patches = self.frontend.patches(waveform)?;
        let mut data = Vec::new();
        let mut dims = 0;

        for chunk in patches.axis_chunks_iter(Axis(0), BATCH_SIZE) {
            let n = chunk.len_of(Axis(0));
            let input: Vec<f32> = chunk.iter().copied().collect();
            match self.session.run(vec![n, PATCH_FRAMES, N_MELS], input) {
                Ok(RawOutput::Tensor(shape, out)) if shape.len() == 2 => {
                    dims = shape[1];
                    data.extend(out);
                }
                Ok(RawOutput::Tensor(shape, _)) => {
                    return Err(AnnotateError::Embedding(format!(
                        "unexpected embedding shape {shape:?}"
                    )))
                }
                Ok(RawOutput::Other(kind)) => {
                    return Err(AnnotateError::Embedding(format!(
                        "non-float embedding output {kind}"
                    )))
                }
                Err(e) => return Err(AnnotateError::Embedding(e.to_string())),
            }
        }

        if dims == 0 || data.is_empty() {
            return Err(AnnotateError::Embedding("encoder produced no embeddings".into()));
        }
        let rows = Array2::from_shape_vec((data.len() / dims, dims), data)
            .map_err(|e| AnnotateError::Embedding(e.to_string()))?;
        Ok(Embedding::from_rows(rows))
    }
}

/// A classifier head taking a segments × dims embedding matrix.
pub struct OnnxHead {
    session: OnnxSession,
}

impl OnnxHead {
    pub fn load(path: &Path, input: &str, output: &str) -> Result<Self> {
        Ok(Self {
            session: OnnxSession::load(path, input, output)?,
        })
    }
}

impl ClassifierHead for OnnxHead {
    fn predict(&self, embedding: &Embedding) -> Result<Prediction> {
        let matrix = embedding.as_matrix();
        let shape = vec![matrix.nrows(), matrix.ncols()];
        let input: Vec<f32> = matrix.iter().copied().collect();

        match self.session.run(shape, input)? {
            RawOutput::Tensor(shape, data) => {
                let rows = if shape.len() >= 2 { shape[0].max(1) } else { 1 };
                let cols = data.len() / rows;
                Array2::from_shape_vec((rows, cols), data)
                    .map(Prediction::Vector)
                    .map_err(|e| AnnotateError::head(&self.session.name, e))
            }
            RawOutput::Other(kind) => Ok(Prediction::Opaque(kind)),
        }
    }
}
