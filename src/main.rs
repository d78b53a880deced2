use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use music_annotator::annotator::Annotator;
use music_annotator::batch::{self, BatchOutcome};
use music_annotator::config::{self, DEFAULT_INPUT_FORMAT, DEFAULT_MAX_UPLOAD_MB, DEFAULT_PORT};
use music_annotator::pipeline::{self, PipelineConfig, StageSelection};
use music_annotator::server::{self, ServerConfig};
use music_annotator::tasks::Stage;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract basic audio features
    Features(BatchArgs),
    /// Extract frame-level descriptor statistics
    LowLevel(BatchArgs),
    /// Predict the five binary moods
    Mood(BatchArgs),
    /// Predict the top-5 genres
    Genre(BatchArgs),
    /// Detect instruments
    Instruments(BatchArgs),
    /// Classify mood/theme tags
    MoodTheme(BatchArgs),
    /// Run several stages in sequence
    Pipeline(PipelineArgs),
    /// Annotate one file and print JSON
    Analyze(AnalyzeArgs),
    /// Start the web dashboard
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Directory with the audio files
    #[arg(short, long, env = "MUSIC_ANNOTATOR_DATA_DIR", default_value_os_t = config::default_data_dir())]
    input_dir: PathBuf,

    /// CSV to write (defaults to the stage's file in the results directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Results directory used when --output is not given
    #[arg(long, env = "MUSIC_ANNOTATOR_RESULTS_DIR", default_value_os_t = config::default_results_dir())]
    results_dir: PathBuf,

    /// Directory containing ONNX models
    #[arg(short, long, env = "MUSIC_ANNOTATOR_MODELS_DIR", default_value_os_t = config::default_models_dir())]
    models_dir: PathBuf,

    /// File extension to process
    #[arg(short, long, default_value = DEFAULT_INPUT_FORMAT)]
    format: String,
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// Run every stage (the default when no stage is selected)
    #[arg(long)]
    all: bool,
    #[arg(long)]
    features: bool,
    #[arg(long)]
    low_level: bool,
    #[arg(long)]
    mood: bool,
    #[arg(long)]
    genre: bool,
    #[arg(long)]
    instruments: bool,
    #[arg(long)]
    mood_theme: bool,

    #[arg(long, env = "MUSIC_ANNOTATOR_DATA_DIR", default_value_os_t = config::default_data_dir())]
    data_dir: PathBuf,

    #[arg(long, env = "MUSIC_ANNOTATOR_RESULTS_DIR", default_value_os_t = config::default_results_dir())]
    results_dir: PathBuf,

    #[arg(long, env = "MUSIC_ANNOTATOR_MODELS_DIR", default_value_os_t = config::default_models_dir())]
    models_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_INPUT_FORMAT)]
    format: String,
}

impl PipelineArgs {
    fn selection(&self) -> StageSelection {
        if self.all {
            return StageSelection::all();
        }
        let flags = [
            (self.features, Stage::Features),
            (self.low_level, Stage::LowLevel),
            (self.mood, Stage::Mood),
            (self.genre, Stage::Genre),
            (self.instruments, Stage::Instruments),
            (self.mood_theme, Stage::MoodTheme),
        ];
        let selected: Vec<Stage> = flags
            .into_iter()
            .filter_map(|(on, stage)| on.then_some(stage))
            .collect();
        StageSelection::from_flags(&selected)
    }
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Audio file to annotate
    file: PathBuf,

    #[arg(long, env = "MUSIC_ANNOTATOR_MODELS_DIR", default_value_os_t = config::default_models_dir())]
    models_dir: PathBuf,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Port to listen on
    #[arg(long, env = "MUSIC_ANNOTATOR_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(long, env = "MUSIC_ANNOTATOR_MODELS_DIR", default_value_os_t = config::default_models_dir())]
    models_dir: PathBuf,

    /// Extra static files served next to the dashboard
    #[arg(long)]
    web_dir: Option<PathBuf>,

    /// Upload size limit in megabytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_MB)]
    max_upload_mb: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Features(args) => run_stage(Stage::Features, args),
        Commands::LowLevel(args) => run_stage(Stage::LowLevel, args),
        Commands::Mood(args) => run_stage(Stage::Mood, args),
        Commands::Genre(args) => run_stage(Stage::Genre, args),
        Commands::Instruments(args) => run_stage(Stage::Instruments, args),
        Commands::MoodTheme(args) => run_stage(Stage::MoodTheme, args),
        Commands::Pipeline(args) => run_pipeline(args),
        Commands::Analyze(args) => run_analyze(args),
        Commands::Serve(args) => run_serve(args).await,
    }
}

fn run_stage(stage: Stage, args: BatchArgs) -> Result<()> {
    let output = args
        .output
        .unwrap_or_else(|| args.results_dir.join(stage.output_file()));

    let task = stage
        .build(&args.models_dir)
        .with_context(|| format!("Failed to set up the {stage} stage"))?;
    let summary = batch::run_batch(task.as_ref(), &args.input_dir, &output, &args.format)?;

    match summary.outcome {
        BatchOutcome::Written => info!("Wrote {} rows to {:?}", summary.rows_written, output),
        BatchOutcome::NoFiles | BatchOutcome::NoResults => warn!("No output written"),
    }
    Ok(())
}

fn run_pipeline(args: PipelineArgs) -> Result<()> {
    let config = PipelineConfig {
        selection: args.selection(),
        data_dir: args.data_dir,
        results_dir: args.results_dir,
        models_dir: args.models_dir,
        format: args.format,
    };
    let report = pipeline::run_pipeline(&config);

    for failed in report.failed() {
        warn!("Stage {} did not complete", failed.stage);
    }
    Ok(())
}

fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let annotator = Annotator::load(&args.models_dir);
    let annotation = annotator
        .analyze_path(&args.file)
        .with_context(|| format!("Failed to analyze {:?}", args.file))?;
    println!("{}", serde_json::to_string_pretty(&annotation)?);
    Ok(())
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    server::start_server(ServerConfig {
        port: args.port,
        models_dir: args.models_dir,
        web_dir: args.web_dir,
        max_upload_mb: args.max_upload_mb,
    })
    .await
}
