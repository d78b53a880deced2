//! A head maps an [`Embedding`] to a [`Prediction`]. Whether the payload is a
//! usable probability matrix is decided here, once, so aggregation never has
//! to re-inspect it.

use ndarray::{Array2, Axis};
use serde::Serialize;

use crate::embedding::Embedding;
use crate::error::Result;
use crate::labels::LabelSet;

/// What a head returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    /// Segments × classes probabilities
    Vector(Array2<f32>),
    /// Anything else, kept verbatim for the output table
    Opaque(String),
}

impl Prediction {
    /// Single-row prediction, convenient for heads that emit one vector.
    pub fn from_vec(probs: Vec<f32>) -> Self {
        let n = probs.len();
        match Array2::from_shape_vec((1, n), probs) {
            Ok(m) => Prediction::Vector(m),
            Err(e) => Prediction::Opaque(e.to_string()),
        }
    }
}

pub trait ClassifierHead: Send + Sync {
    fn predict(&self, embedding: &Embedding) -> Result<Prediction>;
}

/// Average a segments × classes matrix over its segments.
pub fn mean_over_segments(matrix: &Array2<f32>) -> Vec<f32> {
    match matrix.mean_axis(Axis(0)) {
        Some(mean) => mean.to_vec(),
        None => Vec::new(),
    }
}

/// One label's probability; `None` when the head produced no value for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelScore {
    pub label: String,
    pub probability: Option<f32>,
}

/// Per-label outcome of a direct labeled head.
#[derive(Debug, Clone, PartialEq)]
pub enum Scores {
    Labeled(Vec<LabelScore>),
    Opaque(String),
}

/// Pair probabilities with labels positionally: extra values are dropped,
/// missing ones become `None`.
pub fn align_to_labels(probs: &[f32], labels: &LabelSet) -> Vec<LabelScore> {
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| LabelScore {
            label: label.to_string(),
            probability: probs.get(i).copied(),
        })
        .collect()
}

/// Reduce a head prediction to per-label scores.
pub fn to_scores(prediction: Prediction, labels: &LabelSet) -> Scores {
    match prediction {
        Prediction::Vector(m) => Scores::Labeled(align_to_labels(&mean_over_segments(&m), labels)),
        Prediction::Opaque(raw) => Scores::Opaque(raw),
    }
}

/// Positive-class probability of a binary head, averaged over segments.
pub fn positive_probability(prediction: &Prediction, positive_index: usize) -> Option<f32> {
    match prediction {
        Prediction::Vector(m) => mean_over_segments(m).get(positive_index).copied(),
        Prediction::Opaque(_) => None,
    }
}

/// Indices of the `k` largest values, descending; equal values keep their
/// original index order.
pub fn top_k(probs: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = probs.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn segments_are_averaged() {
        let m = array![[0.2, 0.8], [0.4, 0.6], [0.6, 0.4]];
        let mean = mean_over_segments(&m);
        assert!((mean[0] - 0.4).abs() < 1e-6);
        assert!((mean[1] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn short_vector_pads_with_none() {
        let labels = LabelSet::from_static(&["a", "b", "c"]);
        let scores = align_to_labels(&[0.5, 0.25], &labels);
        assert_eq!(scores[1].probability, Some(0.25));
        assert_eq!(scores[2].probability, None);
        assert_eq!(scores[2].label, "c");
    }

    #[test]
    fn long_vector_is_truncated() {
        let labels = LabelSet::from_static(&["a"]);
        let scores = align_to_labels(&[0.5, 0.25, 0.1], &labels);
        assert_eq!(scores.len(), 1);
    }

    #[test]
    fn positive_probability_from_three_segments() {
        let p = Prediction::Vector(array![[0.9, 0.1], [0.6, 0.4], [0.3, 0.7]]);
        let got = positive_probability(&p, 0).unwrap();
        assert!((got - 0.6).abs() < 1e-6);
        assert_eq!(positive_probability(&p, 2), None);
        assert_eq!(positive_probability(&Prediction::Opaque("x".into()), 0), None);
    }

    #[test]
    fn top_k_is_descending_and_stable() {
        let probs = [0.1, 0.5, 0.3, 0.5, 0.9, 0.0];
        let top = top_k(&probs, 3);
        assert_eq!(top, vec![(4, 0.9), (1, 0.5), (3, 0.5)]);
    }

    #[test]
    fn opaque_prediction_stays_opaque() {
        let labels = LabelSet::from_static(&["a"]);
        assert_eq!(
            to_scores(Prediction::Opaque("raw".into()), &labels),
            Scores::Opaque("raw".into())
        );
    }
}
