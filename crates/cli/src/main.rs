//! dtree-sim command line interface
//!
//! Uploads a dataset into an isolated storage session, trains a decision
//! tree on it and reports evaluation metrics.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dtsim_cli::{report, run_session, RunOptions};
use dtsim_storage::{StoreConfig, StoreConnector};
use dtsim_trainer::{CsvParser, PurityMeasure, TabularParser, TrainParams, DEFAULT_SHEET};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "dtree-sim")]
#[command(about = "Decision tree training on session-isolated uploads", long_about = None)]
#[command(version)]
struct Cli {
    /// Storage configuration file (TOML); DTSIM_* environment variables override it
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: "text" or "pretty"
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a dataset, train a tree and evaluate it
    Run(RunArgs),
    /// List the sheets of a data file
    Sheets {
        /// Data file to inspect
        file: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Training data (CSV)
    #[arg(long, value_name = "PATH")]
    train: PathBuf,

    /// Optional test data (CSV) evaluated with the training encoders
    #[arg(long, value_name = "PATH")]
    test: Option<PathBuf>,

    /// Sheet to read from each upload
    #[arg(long, default_value = DEFAULT_SHEET)]
    sheet: String,

    /// Target column
    #[arg(long)]
    target: String,

    /// Feature columns, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    features: Vec<String>,

    /// Maximum tree depth (positive)
    #[arg(long, default_value = "2", allow_hyphen_values = true)]
    max_depth: i64,

    /// Split criterion: "entropy" or "gini"
    #[arg(long, default_value = "entropy")]
    purity: String,

    /// Seed for the feature visiting order
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Print the trained tree
    #[arg(long)]
    show_tree: bool,

    /// Print the label encoding of a column (repeatable)
    #[arg(long, value_name = "COLUMN")]
    show_encoding: Vec<String>,

    /// Print only the evaluation results, as JSON
    #[arg(long)]
    json: bool,

    /// Keep the session's stored data instead of tearing it down
    #[arg(long)]
    keep: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    match cli.command {
        Commands::Run(args) => {
            let config = StoreConfig::load(cli.config.as_deref())
                .context("Failed to load storage configuration")?;
            run(&config, &args)
        }
        Commands::Sheets { file } => {
            let bytes = fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            for sheet in CsvParser::default().sheet_names(&bytes)? {
                println!("{sheet}");
            }
            Ok(())
        }
    }
}

fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run(config: &StoreConfig, args: &RunArgs) -> Result<()> {
    let options = RunOptions {
        train: args.train.clone(),
        test: args.test.clone(),
        sheet: args.sheet.clone(),
        target: args.target.clone(),
        features: args.features.clone(),
        params: TrainParams {
            max_depth: args.max_depth,
            purity: args.purity.parse::<PurityMeasure>()?,
            seed: args.seed,
        },
        keep: args.keep,
    };

    let connector =
        StoreConnector::from_config(config).context("Failed to connect to the object store")?;
    info!(backend = ?config.backend, "object store ready");
    let outcome = run_session(&connector, CsvParser::default(), &options)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome.evaluations_json()?)?);
        return Ok(());
    }

    let model = &outcome.model;
    print!("{}", report::render_model_summary(model, &model.structure_hash()?));
    if args.show_tree {
        println!();
        print!("{}", model.render_text(&args.features, &outcome.class_names));
    }
    for column in &args.show_encoding {
        println!();
        match outcome.encodings.inverse_table(column) {
            Some(pairs) => print!("{}", report::render_encoding(column, &pairs)),
            None => println!("Column '{column}' is numeric and was not encoded"),
        }
    }
    for (title, result) in &outcome.evaluations {
        println!();
        print!("{}", report::render_evaluation(title, result));
    }

    Ok(())
}
