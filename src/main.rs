// ========================================================================================
//
//                      THE SERVICE ENTRY POINT: RETENTION
//
// ========================================================================================
//
// Resolves configuration, builds the one prediction pipeline the process owns, and
// either serves it over HTTP or runs a single prediction from a file.
//
// Artifacts are loaded eagerly when serving so problems show up in the startup log,
// but a failed load is not fatal: the pipeline retries on every request until the
// files are in place.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use retention::artifacts::ArtifactStore;
use retention::config::ServiceConfig;
use retention::pipeline::Pipeline;
use retention::server::build_router;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

// ========================================================================================
//                         COMMAND-LINE INTERFACE DEFINITION
// ========================================================================================

#[derive(Parser)]
#[command(
    name = "retention",
    version,
    about = "Serve dropout-risk predictions from a pretrained student retention model."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Overrides shared by every subcommand. Unset flags fall back to the config file.
#[derive(Args)]
struct Overrides {
    /// TOML configuration file (defaults to $RETENTION_CONFIG, then built-in defaults)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the classifier, scaler and schema artifacts
    #[arg(long, value_name = "DIR")]
    artifacts: Option<PathBuf>,

    /// Probability above which a student is predicted to persist
    #[arg(long, value_name = "P")]
    threshold: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        #[command(flatten)]
        overrides: Overrides,

        /// Address to listen on, e.g. 0.0.0.0:8000
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,
    },

    /// Predict for a single student record stored as JSON
    #[command(about = "Predict one record (outputs: prediction JSON on stdout)")]
    Predict {
        /// Path to a JSON object with the student's attributes
        record: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },
}

// ========================================================================================
//                           THE MAIN ORCHESTRATION LOGIC
// ========================================================================================

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Serve { overrides, listen } => serve_command(&overrides, listen),
        Commands::Predict { record, overrides } => predict_command(&record, &overrides),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn resolve_config(overrides: &Overrides) -> anyhow::Result<ServiceConfig> {
    let config = ServiceConfig::resolve(overrides.config.as_deref())?
        .with_overrides(overrides.artifacts.clone(), overrides.threshold)?;
    Ok(config)
}

fn build_pipeline(config: &ServiceConfig) -> Pipeline {
    Pipeline::new(
        ArtifactStore::new(config.artifact_dir.clone()),
        config.decision_threshold,
    )
}

fn serve_command(overrides: &Overrides, listen: Option<String>) -> anyhow::Result<()> {
    let mut config = resolve_config(overrides)?;
    if let Some(addr) = listen {
        config.listen_addr = addr;
    }

    let pipeline = Arc::new(build_pipeline(&config));
    info!("Loading model artifacts...");
    if pipeline.store().ensure_loaded().is_err() {
        warn!("Model artifacts failed to load. API will return errors for predictions.");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
        info!(
            "Listening on {} (decision threshold {})",
            config.listen_addr, config.decision_threshold
        );
        axum::serve(listener, build_router(pipeline)).await?;
        anyhow::Ok(())
    })?;

    info!("Shutting down...");
    Ok(())
}

fn predict_command(record_path: &Path, overrides: &Overrides) -> anyhow::Result<()> {
    let config = resolve_config(overrides)?;
    let text = std::fs::read_to_string(record_path)
        .with_context(|| format!("Failed to read {}", record_path.display()))?;
    let body: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", record_path.display()))?;

    let prediction = build_pipeline(&config).predict_json(&body)?;
    println!("{}", serde_json::to_string_pretty(&prediction)?);
    Ok(())
}
