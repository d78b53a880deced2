//! Runs the selected stages strictly in order, each over the whole data
//! directory. A stage that cannot be built or fails to write is recorded and
//! the next stage still runs.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::batch::{self, BatchSummary};
use crate::error::Result;
use crate::tasks::{Stage, Task};

/// Which stages to run. An empty selection means all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageSelection {
    stages: Vec<Stage>,
}

impl StageSelection {
    pub fn all() -> Self {
        Self {
            stages: Stage::ALL.to_vec(),
        }
    }

    /// Selected stages in pipeline order; empty input selects everything.
    pub fn from_flags(selected: &[Stage]) -> Self {
        if selected.is_empty() {
            return Self::all();
        }
        Self {
            stages: Stage::ALL
                .into_iter()
                .filter(|s| selected.contains(s))
                .collect(),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
    pub models_dir: PathBuf,
    pub format: String,
    pub selection: StageSelection,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Completed(BatchSummary),
    Failed { reason: String },
}

#[derive(Debug, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    pub elapsed: Duration,
}

#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
    pub total: Duration,
}

impl PipelineReport {
    pub fn failed(&self) -> impl Iterator<Item = &StageReport> {
        self.stages
            .iter()
            .filter(|r| matches!(r.status, StageStatus::Failed { .. }))
    }
}

/// Run the pipeline with tasks built from the models directory.
pub fn run_pipeline(config: &PipelineConfig) -> PipelineReport {
    run_with(config, |stage, models_dir| stage.build(models_dir))
}

/// Run the pipeline with a caller-supplied task factory.
pub fn run_with<F>(config: &PipelineConfig, mut build: F) -> PipelineReport
where
    F: FnMut(Stage, &Path) -> Result<Box<dyn Task>>,
{
    info!("========== MUSIC ANNOTATION PIPELINE ==========");
    info!("Data directory: {:?}", config.data_dir);
    info!("Results directory: {:?}", config.results_dir);
    info!("Models directory: {:?}", config.models_dir);

    let total_start = Instant::now();
    let mut reports = Vec::new();

    for (step, &stage) in config.selection.stages().iter().enumerate() {
        info!("STEP {}: {}...", step + 1, stage.description());
        let started = Instant::now();
        let output = config.results_dir.join(stage.output_file());

        // The task (and its models) lives only for this stage.
        let status = match build(stage, &config.models_dir) {
            Ok(task) => {
                match batch::run_batch(task.as_ref(), &config.data_dir, &output, &config.format) {
                    Ok(summary) => StageStatus::Completed(summary),
                    Err(e) => StageStatus::Failed {
                        reason: e.to_string(),
                    },
                }
            }
            Err(e) => StageStatus::Failed {
                reason: e.to_string(),
            },
        };

        let elapsed = started.elapsed();
        match &status {
            StageStatus::Completed(_) => {
                info!("[{}] Time taken: {:.2} seconds", stage, elapsed.as_secs_f64())
            }
            StageStatus::Failed { reason } => error!("[{}] Stage failed: {}", stage, reason),
        }
        reports.push(StageReport {
            stage,
            status,
            elapsed,
        });
    }

    let total = total_start.elapsed();
    info!(
        "Pipeline complete! Total time: {:.2} seconds ({:.2} minutes)",
        total.as_secs_f64(),
        total.as_secs_f64() / 60.0
    );
    PipelineReport {
        stages: reports,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selection_runs_everything_in_order() {
        assert_eq!(StageSelection::from_flags(&[]).stages(), &Stage::ALL);
    }

    #[test]
    fn selection_is_reordered_to_pipeline_order() {
        let sel = StageSelection::from_flags(&[Stage::MoodTheme, Stage::Features]);
        assert_eq!(sel.stages(), &[Stage::Features, Stage::MoodTheme]);
        assert!(!sel.contains(Stage::Genre));
    }
}
