//! Course Hub server
//!
//! Loads configuration, builds the store and services, and serves the HTTP
//! API until interrupted.

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use course_hub::core::factory::create_app_state;
use course_hub::{api::start_server, init_logging, Config, Error};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("course-hub")
        .version(course_hub::VERSION)
        .about("Course enrollment backend over a document store.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
        )
        .arg(
            Arg::new("http-addr")
                .long("http-addr")
                .value_name("ADDR")
                .help("HTTP server bind address")
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("FILE")
                .help("JSON seed file loaded into the store at start-up")
        )
        .arg(
            Arg::new("static-dir")
                .long("static-dir")
                .value_name("DIR")
                .help("Directory holding the dashboard front-end")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)")
        )
        .arg(
            Arg::new("no-derive-course-id")
                .long("no-derive-course-id")
                .action(ArgAction::SetTrue)
                .help("Never guess a course id from a module id")
        )
        .arg(
            Arg::new("export-seed")
                .long("export-seed")
                .value_name("FILE")
                .help("Write the loaded store to a seed file and exit")
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let mut config = Config::load(config_path.as_deref())?;
    apply_cli_overrides(&mut config, &matches)?;
    config.validate()?;

    init_logging(&config.logging)?;

    let state = create_app_state(config).context("building application state")?;
    info!(
        "📦 Store ready: {:?} with {} documents",
        state.store.storage_type(),
        state.store.document_count()
    );

    if let Some(path) = matches.get_one::<String>("export-seed") {
        let written = state.store.export_seed(std::path::Path::new(path))?;
        info!("💾 Exported {} documents to {}", written, path);
        return Ok(());
    }

    start_server(Arc::new(state), shutdown_signal()).await?;

    info!("Shutdown complete");
    Ok(())
}

/// Apply command line argument overrides to configuration
fn apply_cli_overrides(config: &mut Config, matches: &ArgMatches) -> course_hub::Result<()> {
    if let Some(addr) = matches.get_one::<String>("http-addr") {
        config.server.http_addr = addr
            .parse()
            .map_err(|e| Error::config(format!("Invalid HTTP address: {}", e)))?;
    }

    if let Some(seed) = matches.get_one::<String>("seed") {
        config.storage.seed_file = Some(PathBuf::from(seed));
    }

    if let Some(dir) = matches.get_one::<String>("static-dir") {
        config.server.static_dir = Some(PathBuf::from(dir));
    }

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }

    if matches.get_flag("no-derive-course-id") {
        config.resolver.derive_course_id = false;
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C signal, shutting down");
        },
        _ = terminate => {
            warn!("Received terminate signal, shutting down");
        },
    }
}
