//! music-dna-daemon: offline cache controller and hover audio player.
//!
//! This binary can run in two modes:
//! - CLI mode: one-shot install, fetch or audio resolution for testing
//! - Daemon mode: JSON-RPC server driven by the page host

use std::sync::Arc;

use anyhow::{bail, Context};
use reqwest::Url;

use music_dna_daemon::audio::resolve;
use music_dna_daemon::cache::storage_from_config;
use music_dna_daemon::cli::Cli;
use music_dna_daemon::config::{DaemonConfig, StorageKind};
use music_dna_daemon::rpc::{run_server, ServerState};
use music_dna_daemon::types::{Destination, Request};
use music_dna_daemon::worker::{
    FetchOutcome, HttpNetwork, OfflineController, RecordingHost, WorkerState,
};

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout carries the JSON-RPC stream.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("music_dna_daemon=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let mut config = DaemonConfig::from_env();
    cli.apply_to(&mut config);
    if let Some(problem) = config.validate() {
        bail!("invalid configuration: {}", problem);
    }

    if cli.is_daemon_mode() {
        run_daemon_mode(config).await
    } else if cli.is_cli_mode() {
        run_cli_mode(&cli, config).await
    } else {
        print_usage();
        Ok(())
    }
}

/// Runs the one-shot CLI commands.
async fn run_cli_mode(cli: &Cli, config: DaemonConfig) -> anyhow::Result<()> {
    if let Some(ref method) = cli.resolve {
        resolve_audio(method, &cli.age_group);
    }

    if cli.install || cli.fetch.is_some() {
        let controller = build_cli_controller(&config).await?;

        eprintln!("=== music-dna-daemon CLI ===");
        eprintln!("Origin: {}", config.origin);
        eprintln!("Storage: {}", config.storage);
        if config.storage == StorageKind::Disk {
            eprintln!("Cache directory: {}", config.effective_cache_path().display());
        }
        eprintln!();

        if cli.install && controller.state() == WorkerState::Active {
            eprintln!("Already active from persisted caches ({})", config.static_cache_name());
            eprintln!();
        } else if cli.install {
            install_and_activate(&controller).await?;
        }

        if let Some(ref target) = cli.fetch {
            fetch_once(&controller, target, &cli.destination).await?;
        }
    }

    Ok(())
}

async fn build_cli_controller(config: &DaemonConfig) -> anyhow::Result<OfflineController> {
    let origin = config.origin_url().context("origin is not a valid URL")?;
    let network = HttpNetwork::new(origin, config.request_timeout())?;
    let controller = OfflineController::new(
        config,
        storage_from_config(config),
        Arc::new(network),
        Arc::new(RecordingHost::new()),
    )?;
    controller.resume().await?;
    Ok(controller)
}

async fn install_and_activate(controller: &OfflineController) -> anyhow::Result<()> {
    eprintln!("Installing static files...");
    let installed = controller.install().await.context("install failed")?;
    eprintln!("  Cached: {} files", installed.cached);

    let activated = controller.activate().await.context("activate failed")?;
    eprintln!("  Removed stale caches: {}", activated.deleted.len());
    for name in &activated.deleted {
        eprintln!("    - {}", name);
    }
    eprintln!("State: {}", activated.state);
    eprintln!();
    Ok(())
}

async fn fetch_once(
    controller: &OfflineController,
    target: &str,
    destination: &str,
) -> anyhow::Result<()> {
    let url = match Url::parse(target) {
        Ok(url) => url,
        Err(_) => controller
            .origin()
            .join(target)
            .with_context(|| format!("invalid url: {}", target))?,
    };

    // The fetch handler only intercepts once active.
    if !controller.state().can_intercept_fetch() {
        install_and_activate(controller).await?;
    }

    let request = Request::new(
        reqwest::Method::GET,
        url.clone(),
        Destination::parse(destination),
    );
    eprintln!("Fetching {}...", url);

    match controller.handle_fetch(&request).await {
        FetchOutcome::Passthrough => eprintln!("  Not intercepted"),
        FetchOutcome::Respond { response, source } => {
            eprintln!("  Source: {:?}", source);
            eprintln!("  Status: {} {}", response.status, response.status_text);
            eprintln!("  Body: {} bytes", response.body.len());
            if let Some(text) = response.text() {
                println!("{}", text);
            }
        }
    }

    controller.settle_background_writes().await;
    Ok(())
}

fn resolve_audio(method: &str, age_group: &str) {
    eprintln!("Resolving audio for \"{}\" ({})", method, age_group);
    match resolve(method, age_group, &mut rand::thread_rng()) {
        Some(track) => {
            eprintln!("  Path: {}", track.path);
            eprintln!("  Title: {}", track.title);
            eprintln!(
                "  Variant: {} ({} {:?})",
                track.variant,
                track.age_group.as_str(),
                track.relationship
            );
            if track.fallback {
                eprintln!("  Note: unknown age group, variant picked at random");
            }
        }
        None => eprintln!("  No audio for this discovery method"),
    }
    eprintln!();
}

/// Runs the daemon mode (JSON-RPC server).
async fn run_daemon_mode(config: DaemonConfig) -> anyhow::Result<()> {
    eprintln!("=== music-dna-daemon JSON-RPC Server ===");
    eprintln!("Reading from stdin, writing to stdout.");
    eprintln!("Send JSON-RPC requests to control the daemon.");
    eprintln!();
    eprintln!("Origin: {}", config.origin);
    eprintln!("Caches: {} / {}", config.static_cache_name(), config.dynamic_cache_name());
    eprintln!("Storage: {}", config.storage);
    eprintln!("Asset root: {}", config.effective_asset_root().display());
    eprintln!();

    let state = ServerState::from_config(&config)
        .await
        .context("failed to start daemon")?;
    eprintln!("Worker state: {}", state.controller.state());
    run_server(state).await?;
    Ok(())
}

/// Prints usage information.
fn print_usage() {
    eprintln!("music-dna-daemon: offline cache controller and hover audio player");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  Warm the static cache:");
    eprintln!("    music-dna-daemon --install");
    eprintln!();
    eprintln!("  Fetch through the controller:");
    eprintln!("    music-dna-daemon --fetch /index.html --destination document");
    eprintln!();
    eprintln!("  Resolve a hover preview:");
    eprintln!("    music-dna-daemon --resolve Radio --age-group 35-54");
    eprintln!();
    eprintln!("  Daemon mode (JSON-RPC server):");
    eprintln!("    music-dna-daemon --daemon");
    eprintln!();
    eprintln!("Run 'music-dna-daemon --help' for full options.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_usage_doesnt_panic() {
        print_usage();
    }

    #[test]
    fn resolve_audio_doesnt_panic() {
        resolve_audio("Radio", "18-34");
        resolve_audio("Unknown Method", "18-34");
    }
}
