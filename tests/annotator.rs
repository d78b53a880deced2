mod common;

use ndarray::{array, Array2};
use std::sync::Arc;

use common::{FailingEmbedder, FailingHead, FixedEmbedder, FixedHead};
use music_annotator::annotator::{Annotator, EMBEDDING, INSTRUMENTS, MOODS};
use music_annotator::audio_decoder::Waveform;
use music_annotator::embedding::{Embedding, EmbeddingModel};
use music_annotator::error::{AnnotateError, Result};
use music_annotator::heads::ClassifierHead;
use music_annotator::labels::LabelSet;
use music_annotator::tasks::mood::MoodHead;
use music_annotator::tasks::{LabeledTask, MoodTask, Stage};

fn tone(seconds: f32) -> Waveform {
    Waveform {
        samples: (0..(44_100.0 * seconds) as usize)
            .map(|i| (i as f32 * 0.06).sin() * 0.5)
            .collect(),
        sample_rate: 44_100,
    }
}

fn instruments(embedder: Arc<dyn EmbeddingModel>) -> LabeledTask {
    LabeledTask::new(
        Stage::Instruments,
        embedder,
        Box::new(FixedHead(array![[0.25, 0.75]])),
        LabelSet::from_static(&["piano", "drums"]),
    )
}

#[test]
fn head_failure_nulls_only_its_section() {
    let embedder: Arc<dyn EmbeddingModel> = Arc::new(FixedEmbedder { segments: 2, dims: 4 });
    let mood = MoodTask::new(
        embedder.clone(),
        vec![MoodHead {
            label: "mood_happy".into(),
            head: Box::new(FailingHead) as Box<dyn ClassifierHead>,
            positive_index: 1,
        }],
    );
    let annotator = Annotator::new(Some(embedder.clone()))
        .with_mood(mood)
        .with_instruments(instruments(embedder));

    let out = annotator.analyze_waveform(&tone(1.0), "song.wav");

    assert!(out.moods.is_none());
    assert!(out.errors.contains_key(MOODS));
    let scores = out.instruments.as_ref().unwrap();
    assert_eq!(scores.len(), 2);
    assert_eq!(scores[1].probability, Some(0.75));
    assert!(!out.errors.contains_key(INSTRUMENTS));
    assert!(out.features.is_some());
    assert!(out.charts.mood_radar.is_none());
    assert!(out.charts.instruments.is_some());
}

#[test]
fn encoder_failure_keeps_features() {
    let embedder: Arc<dyn EmbeddingModel> = Arc::new(FailingEmbedder {
        min_samples: usize::MAX,
    });
    let annotator = Annotator::new(Some(embedder.clone())).with_instruments(instruments(embedder));

    let out = annotator.analyze_waveform(&tone(1.0), "song.wav");

    assert!(out.errors.contains_key(EMBEDDING));
    assert!(out.instruments.is_none());
    assert!(out.features.is_some());
}

/// Encoder that only accepts exactly one second at 16 kHz.
struct OneSecondAt16k;

impl EmbeddingModel for OneSecondAt16k {
    fn embed(&self, samples: &[f32]) -> Result<Embedding> {
        if samples.len() != 16_000 {
            return Err(AnnotateError::Embedding(format!("got {} samples", samples.len())));
        }
        Ok(Embedding::from_rows(Array2::from_elem((1, 4), 0.5)))
    }
}

#[test]
fn model_input_is_decoded_at_the_encoder_rate() {
    let embedder: Arc<dyn EmbeddingModel> = Arc::new(OneSecondAt16k);
    let annotator = Annotator::new(Some(embedder.clone())).with_instruments(instruments(embedder));

    let out = annotator
        .analyze_bytes(common::tone_bytes(1.0), "tone.wav")
        .unwrap();

    assert!(!out.errors.contains_key(EMBEDDING), "{:?}", out.errors);
    assert!(out.instruments.is_some());
    let duration = &out.features.as_ref().unwrap().0[0];
    assert_eq!(duration.0, "duration");
}
