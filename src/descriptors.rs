//! Signal descriptors for the basic and low-level feature stages.

use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;
use stratum_dsp::{analyze_audio, AnalysisConfig, Key};

use crate::embedding::mel_filterbank;

/// Bands in the low-level mel energy descriptor
pub const LOW_LEVEL_MEL_BANDS: usize = 40;
/// Window for short-term loudness in dynamic complexity
const LOUDNESS_WINDOW_SECS: f32 = 2.0;
const EPS: f32 = 1e-10;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Tempo, tonality and beat regularity of one clip. Each value is `None`
/// when the analysis ran but could not commit to an estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Rhythm {
    pub bpm: Option<f32>,
    /// Tonic note name and `major`/`minor`
    pub key: Option<(String, &'static str)>,
    /// Beat-grid stability in 0..1, used as a danceability proxy
    pub danceability: Option<f32>,
}

/// Run stratum-dsp's beat and key analysis over a mono clip.
pub fn rhythm(y: &[f32], sample_rate: u32) -> std::result::Result<Rhythm, String> {
    let result = analyze_audio(y, sample_rate, AnalysisConfig::default()).map_err(|e| e.to_string())?;

    let bpm = (result.bpm.is_finite() && result.bpm > 0.0).then_some(result.bpm);
    let key = (result.key_confidence > 0.0).then(|| split_key(result.key));
    let danceability = bpm.map(|_| result.grid_stability.clamp(0.0, 1.0));
    Ok(Rhythm {
        bpm,
        key,
        danceability,
    })
}

/// `Minor(9)` -> ("A", "minor")
pub fn split_key(key: Key) -> (String, &'static str) {
    match key {
        Key::Major(i) => (NOTE_NAMES[i as usize % 12].to_string(), "major"),
        Key::Minor(i) => (NOTE_NAMES[i as usize % 12].to_string(), "minor"),
    }
}

pub fn energy(y: &[f32]) -> f32 {
    y.iter().map(|x| x * x).sum()
}

pub fn rms(y: &[f32]) -> f32 {
    if y.is_empty() {
        return 0.0;
    }
    (energy(y) / y.len() as f32).sqrt()
}

/// Stevens' power law: energy^0.67
pub fn loudness(y: &[f32]) -> f32 {
    energy(y).powf(0.67)
}

pub fn zero_crossing_rate(y: &[f32]) -> f32 {
    if y.len() < 2 {
        return 0.0;
    }
    let crossings = y
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / (y.len() - 1) as f32
}

/// Peak amplitude over RMS.
pub fn crest_factor(y: &[f32]) -> Option<f32> {
    let r = rms(y);
    if r <= EPS {
        return None;
    }
    let peak = y.iter().fold(0.0f32, |m, x| m.max(x.abs()));
    Some(peak / r)
}

/// Mean absolute deviation of short-term loudness (dB) from its average,
/// over non-silent windows.
pub fn dynamic_complexity(y: &[f32], sample_rate: u32) -> Option<f32> {
    let window = (LOUDNESS_WINDOW_SECS * sample_rate as f32) as usize;
    if window == 0 || y.len() < window {
        return None;
    }
    let levels: Vec<f32> = y
        .chunks(window)
        .map(|c| 10.0 * (energy(c) / c.len() as f32 + EPS).log10())
        .filter(|db| *db > -90.0)
        .collect();
    if levels.is_empty() {
        return None;
    }
    let mean = levels.iter().sum::<f32>() / levels.len() as f32;
    Some(levels.iter().map(|l| (l - mean).abs()).sum::<f32>() / levels.len() as f32)
}

/// Descriptors of one magnitude spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralShape {
    pub centroid: f32,
    pub spread: f32,
    pub rolloff: f32,
    pub flatness: f32,
}

pub fn spectral_shape(magnitudes: &[f32], sample_rate: u32) -> SpectralShape {
    let bins = magnitudes.len().max(1);
    let bin_hz = sample_rate as f32 / (2.0 * (bins - 1).max(1) as f32);
    let total: f32 = magnitudes.iter().sum();

    if total <= EPS {
        return SpectralShape {
            centroid: 0.0,
            spread: 0.0,
            rolloff: 0.0,
            flatness: 0.0,
        };
    }

    let centroid = magnitudes
        .iter()
        .enumerate()
        .map(|(k, m)| k as f32 * bin_hz * m)
        .sum::<f32>()
        / total;
    let spread = (magnitudes
        .iter()
        .enumerate()
        .map(|(k, m)| (k as f32 * bin_hz - centroid).powi(2) * m)
        .sum::<f32>()
        / total)
        .sqrt();

    let threshold = 0.85 * total;
    let mut cumulative = 0.0;
    let mut rolloff_bin = bins - 1;
    for (k, m) in magnitudes.iter().enumerate() {
        cumulative += m;
        if cumulative >= threshold {
            rolloff_bin = k;
            break;
        }
    }

    let log_mean = magnitudes.iter().map(|m| (m + EPS).ln()).sum::<f32>() / bins as f32;
    let flatness = log_mean.exp() / (total / bins as f32);

    SpectralShape {
        centroid,
        spread,
        rolloff: rolloff_bin as f32 * bin_hz,
        flatness,
    }
}

/// Frame-wise analysis of a signal.
pub struct Frames {
    /// One entry per frame
    pub rms: Vec<f32>,
    pub zcr: Vec<f32>,
    pub shape: Vec<SpectralShape>,
    pub flux: Vec<f32>,
    /// Frames × mel bands, log-compressed
    pub mel: Array2<f32>,
}

impl Frames {
    pub fn len(&self) -> usize {
        self.rms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rms.is_empty()
    }
}

/// Hann-windowed framing with magnitude spectra. Signals shorter than one
/// frame are zero-padded to a single frame.
pub fn analyze_frames(y: &[f32], sample_rate: u32, frame_size: usize, hop: usize) -> Frames {
    let mut padded;
    let y = if y.len() < frame_size {
        padded = y.to_vec();
        padded.resize(frame_size, 0.0);
        &padded[..]
    } else {
        y
    };
    let num_frames = (y.len() - frame_size) / hop + 1;
    let window: Vec<f32> = (0..frame_size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / frame_size as f32).cos()))
        .collect();
    let filters = mel_filterbank(sample_rate as usize, frame_size, LOW_LEVEL_MEL_BANDS);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(frame_size);
    let mut buffer = vec![Complex { re: 0.0, im: 0.0 }; frame_size];

    let mut frames = Frames {
        rms: Vec::with_capacity(num_frames),
        zcr: Vec::with_capacity(num_frames),
        shape: Vec::with_capacity(num_frames),
        flux: Vec::with_capacity(num_frames),
        mel: Array2::zeros((num_frames, LOW_LEVEL_MEL_BANDS)),
    };
    let mut previous: Option<Vec<f32>> = None;

    for i in 0..num_frames {
        let frame = &y[i * hop..i * hop + frame_size];
        frames.rms.push(rms(frame));
        frames.zcr.push(zero_crossing_rate(frame));

        for (j, &x) in frame.iter().enumerate() {
            buffer[j] = Complex {
                re: x * window[j],
                im: 0.0,
            };
        }
        fft.process(&mut buffer);
        let magnitudes: Vec<f32> = buffer[..frame_size / 2 + 1].iter().map(|c| c.norm()).collect();

        frames.shape.push(spectral_shape(&magnitudes, sample_rate));
        frames.flux.push(match &previous {
            Some(prev) => prev
                .iter()
                .zip(&magnitudes)
                .map(|(a, b)| (b - a).max(0.0).powi(2))
                .sum::<f32>()
                .sqrt(),
            None => 0.0,
        });
        for m in 0..LOW_LEVEL_MEL_BANDS {
            let e: f32 = magnitudes
                .iter()
                .zip(filters.row(m))
                .map(|(mag, w)| mag * mag * w)
                .sum();
            frames.mel[[i, m]] = (e + EPS).log10();
        }
        previous = Some(magnitudes);
    }
    frames
}

/// Mean and population standard deviation.
pub fn mean_stdev(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sr: u32, secs: f32) -> Vec<f32> {
        (0..(sr as f32 * secs) as usize)
            .map(|i| (2.0 * PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn key_splits_into_tonic_and_scale() {
        assert_eq!(split_key(Key::Minor(9)), ("A".to_string(), "minor"));
        assert_eq!(split_key(Key::Major(13)), ("C#".to_string(), "major"));
    }

    #[test]
    fn rhythm_rejects_empty_input() {
        assert!(rhythm(&[], 44_100).is_err());
    }

    #[test]
    fn rms_of_full_scale_sine() {
        let y = sine(440.0, 44_100, 1.0);
        assert!((rms(&y) - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
    }

    #[test]
    fn zcr_of_alternating_signal_is_one() {
        assert_eq!(zero_crossing_rate(&[1.0, -1.0, 1.0, -1.0]), 1.0);
        assert_eq!(zero_crossing_rate(&[1.0]), 0.0);
    }

    #[test]
    fn centroid_tracks_sine_frequency() {
        let y = sine(1000.0, 44_100, 0.5);
        let frames = analyze_frames(&y, 44_100, 2048, 1024);
        let (centroid, _) =
            mean_stdev(&frames.shape.iter().map(|s| s.centroid).collect::<Vec<_>>());
        assert!((centroid - 1000.0).abs() < 100.0, "centroid {centroid}");
    }

    #[test]
    fn silence_has_no_crest_factor_or_dynamics() {
        let y = vec![0.0f32; 44_100 * 3];
        assert_eq!(crest_factor(&y), None);
        assert_eq!(dynamic_complexity(&y, 44_100), None);
    }

    #[test]
    fn steady_tone_has_low_dynamic_complexity() {
        let y = sine(220.0, 8_000, 6.0);
        let dc = dynamic_complexity(&y, 8_000).unwrap();
        assert!(dc < 0.1, "dynamic complexity {dc}");
    }

    #[test]
    fn short_signal_still_yields_one_frame() {
        let frames = analyze_frames(&[0.5; 100], 44_100, 2048, 1024);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames.mel.shape(), &[1, LOW_LEVEL_MEL_BANDS]);
    }
}
