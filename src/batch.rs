//! Runs one task over every matching file in a directory and writes the
//! table once at the end. Per-file failures are logged and skipped; only a
//! failure to list the directory or to write the table is returned.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::audio_decoder;
use crate::error::Result;
use crate::record::{PredictionRecord, ResultTable};
use crate::scanner;
use crate::tasks::Task;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// No input file matched the format
    NoFiles,
    /// Files were found but none produced a record
    NoResults,
    Written,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub files_found: usize,
    pub rows_written: usize,
    pub skipped: Vec<String>,
    pub outcome: BatchOutcome,
    pub output: PathBuf,
}

/// Load and annotate every file, returning the table and the skipped names.
pub fn collect(task: &dyn Task, files: &[PathBuf]) -> (ResultTable, Vec<String>) {
    let mut table = ResultTable::new();
    let mut skipped = Vec::new();
    let stage = task.stage();

    for path in files {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let started = Instant::now();

        let record = audio_decoder::load_mono(path, task.sample_rate())
            .and_then(|audio| task.annotate(&audio))
            .map(|fields| PredictionRecord::new(filename.clone(), fields));

        match record {
            Ok(record) => {
                debug!("[{}] {} done in {:?}", stage, filename, started.elapsed());
                table.push(record);
            }
            Err(e) => {
                warn!("[{}] Skipping {}: {}", stage, filename, e);
                skipped.push(filename);
            }
        }
    }
    (table, skipped)
}

/// Run `task` over `input_dir` and write the results to `output`.
///
/// Nothing is written when no file matches or no file succeeds.
pub fn run_batch(task: &dyn Task, input_dir: &Path, output: &Path, format: &str) -> Result<BatchSummary> {
    let files = scanner::scan_directory(input_dir, format)?;
    let mut summary = BatchSummary {
        files_found: files.len(),
        rows_written: 0,
        skipped: Vec::new(),
        outcome: BatchOutcome::NoFiles,
        output: output.to_path_buf(),
    };

    if files.is_empty() {
        warn!("No {} files found in {:?}", format.to_uppercase(), input_dir);
        return Ok(summary);
    }

    info!("[{}] Processing {} files from {:?}", task.stage(), files.len(), input_dir);
    let (table, skipped) = collect(task, &files);
    summary.skipped = skipped;

    if table.is_empty() {
        warn!("[{}] No predictions computed; {:?} not written", task.stage(), output);
        summary.outcome = BatchOutcome::NoResults;
        return Ok(summary);
    }

    table.write_csv(output)?;
    summary.rows_written = table.len();
    summary.outcome = BatchOutcome::Written;
    info!(
        "[{}] Processed {} files ({} skipped). Results saved to {:?}",
        task.stage(),
        table.len(),
        summary.skipped.len(),
        output
    );
    Ok(summary)
}
