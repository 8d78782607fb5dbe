//! CLI entry point for beamscan.
//!
//! Subcommands:
//! - `run`: execute the configured scan to completion and persist the
//!   grid (CSV) plus its manifest (JSON). Ctrl-C requests an orderly abort
//!   at the next safe point boundary.
//! - `plan`: validate the configuration and preview the traversal without
//!   touching hardware.
//! - `exercise`: drive the rig to the plan's extreme points and back to
//!   centre, to verify travel before committing to a long scan.
//!
//! # Usage
//!
//! ```bash
//! beamscan --config config/scan.toml plan
//! beamscan --config config/scan.toml run
//! RUST_LOG=debug beamscan run --output /tmp/scans
//! ```

use anyhow::Context;
use beamscan::config::ScanConfig;
use beamscan::rig;
use clap::{Parser, Subcommand};
use scan_core::Coordinate;
use scan_engine::{ScanEngine, ScanState};
use scan_storage::{write_grid_csv, ScanManifest};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "beamscan")]
#[command(about = "Raster-scan a beam profile over a two-axis positioning rig", long_about = None)]
struct Cli {
    /// Path to the scan configuration file
    #[arg(long, global = true, default_value = "config/scan.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured scan and persist the result grid
    Run {
        /// Override the configured output directory
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration and preview the traversal
    Plan,

    /// Drive the rig to the plan's extreme points to verify travel
    Exercise,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ScanConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run { output } => run_scan(config, output).await,
        Commands::Plan => preview_plan(&config),
        Commands::Exercise => exercise_travel(&config).await,
    }
}

async fn run_scan(config: ScanConfig, output: Option<PathBuf>) -> anyhow::Result<()> {
    let (registry, handles) = rig::build_rig(&config).await?;
    for device in registry.list_devices() {
        info!(id = %device.id, name = %device.name, "device ready");
    }

    let engine = Arc::new(ScanEngine::new(
        handles.positioner,
        handles.channel,
        config.engine_settings(),
    ));

    // First Ctrl-C asks for an orderly stop at the next safe boundary.
    {
        let engine = engine.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; finishing the current point");
                engine.abort();
            }
        });
    }

    // Pull-based progress reporting alongside the scan.
    let reporter = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(2));
            loop {
                ticker.tick().await;
                if let Some(progress) = engine.progress().await {
                    if let Some(phase) = progress.phase {
                        info!(
                            completed = progress.completed,
                            total = progress.total,
                            failed = progress.failed,
                            elapsed = ?progress.elapsed,
                            %phase,
                            "scan progress"
                        );
                    }
                }
            }
        })
    };

    let outcome = engine.run(config.plan()).await?;
    reporter.abort();

    // Persist the grid and its manifest regardless of how the session ended.
    let directory = output.unwrap_or_else(|| config.output.directory.clone());
    std::fs::create_dir_all(&directory)
        .with_context(|| format!("failed to create {}", directory.display()))?;
    let stem = format!("scan_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S"));
    let csv_path = directory.join(format!("{stem}.csv"));
    write_grid_csv(&csv_path, &outcome.grid)?;
    ScanManifest::new(&outcome, config.acquisition)
        .write_json(&directory.join(format!("{stem}.json")))?;

    let failed = outcome.grid.failed();
    if !failed.is_empty() {
        warn!(count = failed.len(), "points failed after retries:");
        for coordinate in &failed {
            warn!(%coordinate, "failed point");
        }
    }

    match outcome.state {
        ScanState::Completed => {
            info!(
                points = outcome.grid.recorded(),
                elapsed = ?outcome.elapsed,
                path = %csv_path.display(),
                "scan complete"
            );
            Ok(())
        }
        ScanState::Aborted => anyhow::bail!(
            "scan aborted; partial grid saved to {}",
            csv_path.display()
        ),
        ScanState::Faulted => anyhow::bail!(
            "scan faulted (hardware may require a manual reset); partial grid saved to {}",
            csv_path.display()
        ),
        other => anyhow::bail!("scan ended in unexpected state {other}"),
    }
}

fn preview_plan(config: &ScanConfig) -> anyhow::Result<()> {
    let plan = config.plan();
    plan.validate()?;

    println!(
        "{} points ({} cols x {} rows), {:?} traversal",
        plan.len(),
        plan.cols(),
        plan.rows(),
        plan.traversal
    );

    let coordinates: Vec<Coordinate> = plan.path().map(|(_, c)| c).collect();
    for coordinate in coordinates.iter().take(5) {
        println!("  {coordinate}");
    }
    if coordinates.len() > 6 {
        println!("  ... {} more", coordinates.len() - 6);
    }
    if coordinates.len() > 5 {
        if let Some(last) = coordinates.last() {
            println!("  {last}");
        }
    }
    Ok(())
}

/// Visit the plan's centre and the four mid-edge extremes, then return to
/// centre; a quick travel check before an hours-long sweep.
async fn exercise_travel(config: &ScanConfig) -> anyhow::Result<()> {
    let plan = config.plan();
    plan.validate()?;
    let (_registry, handles) = rig::build_rig(config).await?;

    let centre = Coordinate::new(
        (plan.x.min + plan.x.max) / 2.0,
        (plan.y.min + plan.y.max) / 2.0,
    );
    let targets = [
        centre,
        Coordinate::new(plan.x.max, centre.y),
        Coordinate::new(plan.x.min, centre.y),
        Coordinate::new(centre.x, plan.y.max),
        Coordinate::new(centre.x, plan.y.min),
        centre,
    ];

    for target in &targets {
        info!(%target, "exercising");
        handles.positioner.move_to(target).await?;
        tokio::time::sleep(config.scan.settle).await;
    }
    info!("travel check complete");
    Ok(())
}
