pub mod annotator;
pub mod audio_decoder;
pub mod batch;
pub mod charts;
pub mod config;
pub mod descriptors;
pub mod embedding;
pub mod error;
pub mod heads;
pub mod html_template;
pub mod labels;
pub mod models;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod pipeline;
pub mod record;
pub mod scanner;
pub mod server;
pub mod tasks;

pub use error::{AnnotateError, Result};
