//! Atlas CLI - boot the runtime against a page and print the boot report.
//!
//! ```text
//! atlas [PAGE]
//!
//!   PAGE   HTML file to inspect, or `-` for stdin. Defaults to an empty page.
//! ```
//!
//! Configuration is read from `~/.atlas/config.toml` (or `$ATLAS_CONFIG`).
//! The report is printed to stdout as JSON; the exit status is 2 when the
//! runtime ended in fallback mode.

use anyhow::{Context, Result};
use clap::Parser;
use std::{
    fs::{self, OpenOptions},
    io::{self, Read},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::{Arc, Mutex},
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use atlas_bootstrap::{FeatureBundle, HttpUnitLoader, Orchestrator, Runtime};
use atlas_config::AtlasConfig;

#[derive(Debug, Parser)]
#[command(name = "atlas")]
#[command(about = "Boot the Atlas runtime against a page and print the boot report", long_about = None)]
struct Cli {
    /// HTML file to inspect, or `-` for stdin. Defaults to an empty page.
    page: Option<PathBuf>,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_atlas_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stdout carries the report, so log to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_atlas_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in atlas_log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn atlas_log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: next to the config file, normally ~/.atlas/logs/atlas.log
    if let Some(config_path) = AtlasConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("atlas.log"));
    }

    candidates.push(PathBuf::from(".atlas").join("logs").join("atlas.log"));

    candidates
}

fn read_page(page: Option<&Path>) -> Result<String> {
    match page {
        None => Ok(String::new()),
        Some(path) if path == Path::new("-") => {
            let mut page = String::new();
            io::stdin()
                .read_to_string(&mut page)
                .context("failed to read page from stdin")?;
            Ok(page)
        }
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read page {}", path.display())),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let page = read_page(cli.page.as_deref())?;
    let config = AtlasConfig::load()
        .context("failed to load configuration")?
        .unwrap_or_default();

    let loader = HttpUnitLoader::new(&config.assets_base_url())?;
    let features: Vec<FeatureBundle> = config
        .features
        .iter()
        .map(FeatureBundle::from_config)
        .collect();

    let runtime = Runtime::new(config);
    runtime.install_panic_hook();

    let mut orchestrator = Orchestrator::new(runtime, Arc::new(loader)).with_features(features);
    let report = orchestrator.boot(&page).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.is_fallback() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}
