//! Mentis: Treatment outcome prediction
//!
//! Main entry point for the command line tool.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mentis::adapters::sanitize::SanitizingMakeWriter;
use mentis::adapters::{CsvDataset, FileArtifactStore, RandomForest, RandomForestTrainer};
use mentis::application::{predict_validated, EndpointError, PredictionRequest, TrainingConfig};
use mentis::ports::ArtifactStore;
use mentis::{InferenceService, MentisError, TrainingOutcome, TrainingService};

#[derive(Parser, Debug)]
#[command(
    name = "mentis",
    version,
    about = "Train and query a treatment outcome classifier."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit encoders and classifier on a CSV dataset and store them
    Train(TrainArgs),

    /// Predict outcomes for JSON requests (one object or an array)
    Predict(PredictArgs),

    /// Show the active artifact
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Labeled training dataset
    #[arg(long)]
    dataset: PathBuf,

    /// Artifact store directory
    #[arg(long)]
    artifacts: PathBuf,

    /// Number of trees [env: MENTIS_TREE_COUNT]
    #[arg(long)]
    trees: Option<usize>,

    /// Maximum tree depth [env: MENTIS_MAX_DEPTH]
    #[arg(long)]
    max_depth: Option<usize>,

    /// Forest seed [env: MENTIS_RANDOM_SEED]
    #[arg(long)]
    seed: Option<u64>,

    /// Held-out fraction [env: MENTIS_HOLDOUT_FRACTION]
    #[arg(long)]
    holdout: Option<f64>,

    /// Split seed [env: MENTIS_SPLIT_SEED]
    #[arg(long)]
    split_seed: Option<u64>,
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Artifact store directory
    #[arg(long)]
    artifacts: PathBuf,

    /// JSON request file; stdin when absent
    #[arg(long)]
    input: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Artifact store directory
    #[arg(long)]
    artifacts: PathBuf,
}

fn main() -> Result<()> {
    // stdout carries command output, so console logs go to stderr
    let log_mode = std::env::var("MENTIS_LOG_MODE").unwrap_or_else(|_| "stderr".to_string());

    let (writer, _guard) = if log_mode == "file" {
        let log_file =
            std::env::var("MENTIS_LOG_FILE").unwrap_or_else(|_| "mentis.log".to_string());

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("opening log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    match Cli::parse().command {
        Command::Train(args) => run_train(args),
        Command::Predict(args) => run_predict(args),
        Command::Inspect(args) => run_inspect(args),
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let mut config = TrainingConfig::from_env_or_default();
    if let Some(x) = args.trees {
        config.tree_count = x;
    }
    if let Some(x) = args.max_depth {
        config.max_depth = x;
    }
    if let Some(x) = args.seed {
        config.random_seed = x;
    }
    if let Some(x) = args.holdout {
        config.holdout_fraction = x;
    }
    if let Some(x) = args.split_seed {
        config.split_seed = x;
    }
    config.validate().map_err(MentisError::Validation)?;

    let store = Arc::new(FileArtifactStore::new(&args.artifacts));
    let service = TrainingService::new(
        RandomForestTrainer::new(config.forest()),
        store,
        config.holdout(),
    );

    match service.run(&CsvDataset::new(&args.dataset))? {
        TrainingOutcome::Succeeded(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        TrainingOutcome::FailedNoData => bail!("training failed: no complete rows in dataset"),
        TrainingOutcome::FailedFit(e) => bail!("training failed: {e}"),
    }
}

fn run_predict(args: PredictArgs) -> Result<()> {
    let raw = match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let store = FileArtifactStore::new(&args.artifacts);
    let service = InferenceService::<RandomForest>::from_store(&store)?;

    match serde_json::from_str::<serde_json::Value>(&raw)? {
        serde_json::Value::Array(items) => {
            let records = items
                .into_iter()
                .map(|v| serde_json::from_value::<PredictionRequest>(v).map(PredictionRequest::into_record))
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let results: Vec<serde_json::Value> = predict_validated(&service, records)
                .into_iter()
                .map(|result| match result {
                    Ok(p) => serde_json::json!(p),
                    Err(EndpointError::InvalidRequest(errors)) => {
                        serde_json::json!({ "error": errors.join("; ") })
                    }
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        value => {
            let record = serde_json::from_value::<PredictionRequest>(value)?.into_record();
            record
                .validate()
                .map_err(|errors| MentisError::Validation(errors.join("; ")))?;
            let prediction = service.predict(&record).map_err(MentisError::from)?;
            println!("{}", serde_json::to_string(&prediction)?);
        }
    }
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let store = FileArtifactStore::new(&args.artifacts);
    if store.active()?.is_none() {
        bail!("no artifact in {}", args.artifacts.display());
    }

    let service = InferenceService::<RandomForest>::from_store(&store)?;
    let pair = service.artifacts();
    if let Some(info) = pair.info() {
        println!("version:    {}", info.version);
        println!("serial:     {}", info.serial);
        println!("created_at: {}", info.created_at.to_rfc3339());
    }

    let forest = pair.model();
    println!(
        "forest:     {} trees, max_depth {}, seed {}, average depth {:.2}, {} nodes",
        forest.n_trees(),
        forest.config().max_depth,
        forest.config().random_seed,
        forest.avg_depth(),
        forest.total_nodes()
    );

    println!("vocabularies:");
    let encoders = pair.encoders();
    for key in encoders.keys() {
        let mapping = encoders.get(key)?;
        println!("  {key} ({}): {}", mapping.len(), mapping.categories().join(", "));
    }
    Ok(())
}
