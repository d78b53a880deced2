//! Frame-level descriptors aggregated into mean/stdev columns.

use super::{Stage, Task};
use crate::audio_decoder::Waveform;
use crate::config::{FRAME_SIZE, HOP_SIZE, SAMPLE_RATE_HIGH};
use crate::descriptors::{analyze_frames, mean_stdev, Frames};
use crate::error::{AnnotateError, Result};
use crate::record::{Fields, Value};
use ndarray::Axis;

#[derive(Debug, Default)]
pub struct LowLevelTask;

impl LowLevelTask {
    pub fn new() -> Self {
        Self
    }
}

fn push_stats(fields: &mut Fields, name: &str, values: &[f32]) {
    let (mean, stdev) = mean_stdev(values);
    fields.push((format!("lowlevel.{name}.mean"), Value::Number(mean)));
    fields.push((format!("lowlevel.{name}.stdev"), Value::Number(stdev)));
}

fn join(values: impl Iterator<Item = f32>) -> Value {
    Value::Text(values.map(|v| v.to_string()).collect::<Vec<_>>().join(", "))
}

pub fn aggregate(frames: &Frames) -> Fields {
    let mut fields = Fields::new();
    push_stats(&mut fields, "rms", &frames.rms);
    push_stats(&mut fields, "zerocrossingrate", &frames.zcr);

    let shape = |pick: fn(&crate::descriptors::SpectralShape) -> f32| -> Vec<f32> {
        frames.shape.iter().map(pick).collect()
    };
    push_stats(&mut fields, "spectral_centroid", &shape(|s| s.centroid));
    push_stats(&mut fields, "spectral_spread", &shape(|s| s.spread));
    push_stats(&mut fields, "spectral_rolloff", &shape(|s| s.rolloff));
    push_stats(&mut fields, "spectral_flatness", &shape(|s| s.flatness));
    push_stats(&mut fields, "spectral_flux", &frames.flux);

    let means = frames.mel.mean_axis(Axis(0));
    let stdevs = frames.mel.std_axis(Axis(0), 0.0);
    fields.push((
        "lowlevel.melbands.mean".to_string(),
        means.map_or(Value::Null, |m| join(m.iter().copied())),
    ));
    fields.push(("lowlevel.melbands.stdev".to_string(), join(stdevs.iter().copied())));
    fields
}

impl Task for LowLevelTask {
    fn stage(&self) -> Stage {
        Stage::LowLevel
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE_HIGH
    }

    fn annotate(&self, audio: &Waveform) -> Result<Fields> {
        if audio.is_empty() {
            return Err(AnnotateError::Descriptor(
                "frames".into(),
                "no samples decoded".into(),
            ));
        }
        let frames = analyze_frames(&audio.samples, audio.sample_rate, FRAME_SIZE, HOP_SIZE);
        Ok(aggregate(&frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::LOW_LEVEL_MEL_BANDS;

    #[test]
    fn columns_are_stable_and_melbands_are_vectors() {
        let audio = Waveform {
            samples: (0..44_100).map(|i| (i as f32 * 0.03).sin() * 0.5).collect(),
            sample_rate: 44_100,
        };
        let fields = LowLevelTask::new().annotate(&audio).unwrap();
        let names: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();

        assert_eq!(names[0], "lowlevel.rms.mean");
        assert_eq!(names[1], "lowlevel.rms.stdev");
        assert_eq!(names.len(), 7 * 2 + 2);
        match &fields.last().unwrap().1 {
            Value::Text(t) => assert_eq!(t.split(", ").count(), LOW_LEVEL_MEL_BANDS),
            other => panic!("expected text, got {other:?}"),
        }
    }
}
