//! Embeddings and the log-mel frontend.
//!
//! The encoder itself is an external model; this module owns the embedding
//! type every head consumes, the trait the encoder is reached through, and the
//! log-mel patch frontend that prepares the encoder's input.

use ndarray::{s, Array1, Array2, Array3, ArrayView2, Axis};
use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;

use crate::error::{AnnotateError, Result};

// Frontend constants for the Discogs EffNet encoder
pub const FRAME_SIZE: usize = 512;
pub const HOP_SIZE: usize = 256;
pub const N_MELS: usize = 96;
pub const PATCH_FRAMES: usize = 128;
pub const PATCH_HOP: usize = 62;

/// One embedding per asset: a single vector, or one row per analysed segment.
#[derive(Debug, Clone, PartialEq)]
pub enum Embedding {
    Vector(Array1<f32>),
    Segments(Array2<f32>),
}

impl Embedding {
    /// Build from per-segment rows, collapsing a single row into `Vector`.
    pub fn from_rows(rows: Array2<f32>) -> Self {
        if rows.nrows() == 1 {
            Embedding::Vector(rows.row(0).to_owned())
        } else {
            Embedding::Segments(rows)
        }
    }

    pub fn segments(&self) -> usize {
        match self {
            Embedding::Vector(_) => 1,
            Embedding::Segments(m) => m.nrows(),
        }
    }

    pub fn dims(&self) -> usize {
        match self {
            Embedding::Vector(v) => v.len(),
            Embedding::Segments(m) => m.ncols(),
        }
    }

    /// Segment-major view; a vector is a single row.
    pub fn as_matrix(&self) -> ArrayView2<'_, f32> {
        match self {
            Embedding::Vector(v) => v.view().insert_axis(Axis(0)),
            Embedding::Segments(m) => m.view(),
        }
    }
}

/// Shared pre-trained encoder. Handles are read-only once constructed.
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, waveform: &[f32]) -> Result<Embedding>;
}

/// Log-mel spectrogram and patch extraction for the encoder input.
pub struct MelFrontend {
    window: Vec<f32>,
    filters: Array2<f32>,
}

impl MelFrontend {
    pub fn new(sample_rate: u32) -> Self {
        let window = (0..FRAME_SIZE)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / FRAME_SIZE as f32).cos()))
            .collect();
        Self {
            window,
            filters: mel_filterbank(sample_rate as usize, FRAME_SIZE, N_MELS),
        }
    }

    /// Frames × mel bands, compressed with log10(1 + 10000·x).
    pub fn log_mel_spectrogram(&self, samples: &[f32]) -> Array2<f32> {
        if samples.len() < FRAME_SIZE {
            return Array2::zeros((0, N_MELS));
        }
        let num_frames = (samples.len() - FRAME_SIZE) / HOP_SIZE + 1;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FRAME_SIZE);

        let mut spectrogram = Array2::<f32>::zeros((num_frames, N_MELS));
        let mut buffer = vec![Complex { re: 0.0, im: 0.0 }; FRAME_SIZE];

        for i in 0..num_frames {
            let frame = &samples[i * HOP_SIZE..i * HOP_SIZE + FRAME_SIZE];
            for (j, &x) in frame.iter().enumerate() {
                buffer[j] = Complex {
                    re: x * self.window[j],
                    im: 0.0,
                };
            }
            fft.process(&mut buffer);

            for m in 0..N_MELS {
                let energy: f32 = buffer[..FRAME_SIZE / 2 + 1]
                    .iter()
                    .zip(self.filters.row(m))
                    .map(|(c, w)| c.norm_sqr() * w)
                    .sum();
                spectrogram[[i, m]] = (1.0 + 10_000.0 * energy).log10();
            }
        }
        spectrogram
    }

    /// Patches × PATCH_FRAMES × N_MELS. The last patch is zero-padded, so
    /// any non-empty signal yields at least one patch.
    pub fn patches(&self, samples: &[f32]) -> Result<Array3<f32>> {
        if samples.is_empty() {
            return Err(AnnotateError::Embedding("empty waveform".into()));
        }
        let mut padded;
        let samples = if samples.len() < FRAME_SIZE {
            padded = samples.to_vec();
            padded.resize(FRAME_SIZE, 0.0);
            &padded[..]
        } else {
            samples
        };

        let mel = self.log_mel_spectrogram(samples);
        let frames = mel.nrows();
        let count = if frames <= PATCH_FRAMES {
            1
        } else {
            (frames - PATCH_FRAMES).div_ceil(PATCH_HOP) + 1
        };

        let mut out = Array3::<f32>::zeros((count, PATCH_FRAMES, N_MELS));
        for p in 0..count {
            let start = p * PATCH_HOP;
            let end = (start + PATCH_FRAMES).min(frames);
            out.slice_mut(s![p, ..end - start, ..])
                .assign(&mel.slice(s![start..end, ..]));
        }
        Ok(out)
    }
}

/// Triangular mel filters over `n_fft / 2 + 1` bins.
pub(crate) fn mel_filterbank(sr: usize, n_fft: usize, n_mels: usize) -> Array2<f32> {
    fn hz_to_mel(hz: f32) -> f32 {
        2595.0 * (1.0 + hz / 700.0).log10()
    }
    fn mel_to_hz(mel: f32) -> f32 {
        700.0 * (10.0f32.powf(mel / 2595.0) - 1.0)
    }

    let mel_max = hz_to_mel(sr as f32 / 2.0);
    let bin_points: Vec<usize> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
        .map(|hz| ((n_fft as f32 + 1.0) * hz / sr as f32).floor() as usize)
        .collect();

    let num_bins = n_fft / 2 + 1;
    let mut filters = Array2::<f32>::zeros((n_mels, num_bins));
    for m in 0..n_mels {
        let (left, center, right) = (bin_points[m], bin_points[m + 1], bin_points[m + 2]);
        for k in left..center.min(num_bins) {
            filters[[m, k]] = (k - left) as f32 / (center - left) as f32;
        }
        for k in center..right.min(num_bins) {
            filters[[m, k]] = (right - k) as f32 / (right - center) as f32;
        }
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn single_row_collapses_to_vector() {
        let e = Embedding::from_rows(array![[1.0, 2.0, 3.0]]);
        assert_eq!(e, Embedding::Vector(array![1.0, 2.0, 3.0]));
        assert_eq!(e.as_matrix().shape(), &[1, 3]);
    }

    #[test]
    fn segments_keep_their_shape() {
        let e = Embedding::from_rows(Array2::zeros((3, 8)));
        assert_eq!(e.segments(), 3);
        assert_eq!(e.dims(), 8);
    }

    #[test]
    fn empty_waveform_is_rejected() {
        let frontend = MelFrontend::new(16_000);
        assert!(matches!(
            frontend.patches(&[]),
            Err(AnnotateError::Embedding(_))
        ));
    }

    #[test]
    fn short_clip_yields_one_padded_patch() {
        let frontend = MelFrontend::new(16_000);
        let samples = vec![0.1f32; 1000];
        let patches = frontend.patches(&samples).unwrap();
        assert_eq!(patches.shape(), &[1, PATCH_FRAMES, N_MELS]);
    }

    #[test]
    fn long_clip_is_split_into_overlapping_patches() {
        let frontend = MelFrontend::new(16_000);
        // 10 s at 16 kHz -> 624 frames -> ceil((624 - 128) / 62) + 1 patches
        let samples: Vec<f32> = (0..160_000).map(|i| (i as f32 * 0.05).sin()).collect();
        let patches = frontend.patches(&samples).unwrap();
        let frames = (160_000 - FRAME_SIZE) / HOP_SIZE + 1;
        let expected = (frames - PATCH_FRAMES).div_ceil(PATCH_HOP) + 1;
        assert_eq!(patches.shape()[0], expected);
        assert!(patches.iter().all(|v| v.is_finite()));
    }
}
