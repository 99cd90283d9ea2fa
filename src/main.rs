//! review-engine - command-line front end for the reviewed-prediction
//! versioning engine.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use review_engine::config::{Backend, ConfigError, EngineConfig};
use review_engine::engine::{Engine, EngineError};
use review_engine::model::PredictionId;
use review_engine::service::ReviewError;

#[derive(Parser)]
#[command(name = "review-engine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Versioning and approval of human-reviewed prediction reports")]
struct Cli {
    /// TOML config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Review store directory (overrides the config file)
    #[arg(short, long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Storage backend (overrides the config file)
    #[arg(long, value_name = "BACKEND", global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new in-progress prediction
    InitPrediction {
        /// Prediction ID (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Owning company
        #[arg(long)]
        company: String,

        /// Model that produced the prediction
        #[arg(long)]
        model_version: String,
    },

    /// Mark a prediction's run as finished
    CompletePrediction {
        prediction_id: String,
    },

    /// Save a new version of a prediction's report
    SaveVersion {
        prediction_id: String,

        /// Model version label of the edit
        #[arg(long)]
        model_version: String,

        /// JSON file with a {section: text} object
        #[arg(long, value_name = "FILE")]
        content_file: Option<PathBuf>,

        /// Section text as NAME=TEXT, may be repeated
        #[arg(long = "section", value_name = "NAME=TEXT")]
        sections: Vec<String>,

        /// Approve the version on save
        #[arg(long)]
        approve: bool,
    },

    /// Approve a version
    Approve {
        version_id: String,
    },

    /// Withdraw approval from a version
    Disapprove {
        version_id: String,
    },

    /// List a prediction's versions, newest first
    List {
        prediction_id: String,

        /// Only show the approved version
        #[arg(long)]
        approved: bool,
    },

    /// Show a version's content
    Show {
        version_id: String,
    },

    /// Show a prediction's machine-generated content
    ShowPrediction {
        prediction_id: String,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_filter);

    match run(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> Result<EngineConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(backend) = &cli.backend {
        config.backend = backend.parse()?;
    }
    config.validate()?;
    Ok(config)
}

fn run(command: Commands, config: EngineConfig) -> Result<(), CliError> {
    if config.backend == Backend::Memory {
        warn!("memory backend selected, nothing will be persisted");
    }
    let engine = Engine::open(config)?;
    let workflow = engine.workflow();

    match command {
        Commands::InitPrediction {
            id,
            company,
            model_version,
        } => {
            let id = id
                .map(|raw| {
                    PredictionId::new(raw).map_err(|e| CliError::Usage(format!("invalid prediction ID: {}", e)))
                })
                .transpose()?;
            print_json(&engine.register_prediction(id, &company, &model_version)?)
        }

        Commands::CompletePrediction { prediction_id } => {
            let id = PredictionId::new(prediction_id)
                .map_err(|e| CliError::Usage(format!("invalid prediction ID: {}", e)))?;
            print_json(&engine.complete_prediction(&id)?)
        }

        Commands::SaveVersion {
            prediction_id,
            model_version,
            content_file,
            sections,
            approve,
        } => {
            let content = build_content(content_file, &sections)?;
            let request = serde_json::json!({
                "predictionId": prediction_id,
                "modelVersion": model_version,
                "content": content,
                "approve": approve,
            });
            print_json(&workflow.save_version(&request)?)
        }

        Commands::Approve { version_id } => {
            print_json(&workflow.set_approval(&version_id, &serde_json::json!({ "approve": true }))?)
        }

        Commands::Disapprove { version_id } => {
            print_json(&workflow.set_approval(&version_id, &serde_json::json!({ "approve": false }))?)
        }

        Commands::List {
            prediction_id,
            approved,
        } => {
            if approved {
                print_json(&workflow.approved_version(&prediction_id)?)
            } else {
                print_json(&workflow.list_versions(&prediction_id)?)
            }
        }

        Commands::Show { version_id } => print_json(&workflow.version_content(&version_id)?),

        Commands::ShowPrediction { prediction_id } => print_json(&workflow.prediction_content(&prediction_id)?),
    }
}

/// Merge the content file with `--section` overrides into one JSON object.
fn build_content(content_file: Option<PathBuf>, sections: &[String]) -> Result<Value, CliError> {
    let mut content = match content_file {
        Some(path) => {
            let raw = std::fs::read_to_string(&path).map_err(|source| CliError::Io { path, source })?;
            serde_json::from_str::<Value>(&raw)?
        }
        None => Value::Object(Map::new()),
    };

    if !sections.is_empty() {
        let object = content
            .as_object_mut()
            .ok_or_else(|| CliError::Usage("content file must hold a JSON object".to_string()))?;
        for pair in sections {
            let (name, text) = pair
                .split_once('=')
                .ok_or_else(|| CliError::Usage(format!("expected NAME=TEXT, got '{}'", pair)))?;
            object.insert(name.to_string(), Value::String(text.to_string()));
        }
    }
    Ok(content)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
