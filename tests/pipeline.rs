mod common;

use common::write_tone;
use music_annotator::error::AnnotateError;
use music_annotator::pipeline::{run_pipeline, run_with, PipelineConfig, StageSelection, StageStatus};
use music_annotator::tasks::{FeatureTask, LowLevelTask, Stage, Task};

fn config(data: &std::path::Path, results: &std::path::Path, selection: StageSelection) -> PipelineConfig {
    PipelineConfig {
        data_dir: data.to_path_buf(),
        results_dir: results.to_path_buf(),
        models_dir: data.join("models"),
        format: "wav".into(),
        selection,
    }
}

#[test]
fn failing_stage_does_not_stop_later_stages() {
    let data = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    write_tone(&data.path().join("a.wav"), 1.0, 44_100, 440.0);

    let selection = StageSelection::from_flags(&[Stage::Features, Stage::Mood, Stage::LowLevel]);
    let report = run_with(&config(data.path(), results.path(), selection), |stage, models_dir| {
        let task: Box<dyn Task> = match stage {
            Stage::Features => Box::new(FeatureTask::new()),
            Stage::LowLevel => Box::new(LowLevelTask::new()),
            _ => return Err(AnnotateError::MissingModel(models_dir.join("missing.onnx"))),
        };
        Ok(task)
    });

    let order: Vec<Stage> = report.stages.iter().map(|r| r.stage).collect();
    assert_eq!(order, vec![Stage::Features, Stage::LowLevel, Stage::Mood]);
    assert!(matches!(report.stages[2].status, StageStatus::Failed { .. }));
    assert_eq!(report.failed().count(), 1);

    assert!(results.path().join(Stage::Features.output_file()).exists());
    assert!(results.path().join(Stage::LowLevel.output_file()).exists());
    assert!(!results.path().join(Stage::Mood.output_file()).exists());
}

#[test]
fn model_stages_without_models_fail_individually() {
    let data = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    write_tone(&data.path().join("a.wav"), 1.0, 44_100, 440.0);

    let report = run_pipeline(&config(data.path(), results.path(), StageSelection::all()));

    assert_eq!(report.stages.len(), 6);
    // Descriptor stages need no models.
    assert!(matches!(report.stages[0].status, StageStatus::Completed(_)));
    assert!(matches!(report.stages[1].status, StageStatus::Completed(_)));
    assert_eq!(report.failed().count(), 4);
}
