// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! brood daemon (broodd)
//!
//! Serves a master or proxy job, as selected by the run file, until the
//! job is finished and every client has gone quiet.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use brood_core::{exit, RunConfig};
use brood_daemon::lifecycle::{self, Daemon};
use brood_daemon::server;
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// How often the daemon checks whether it is done
const CHECK_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "broodd", version, about = "Serve a brood master or proxy job")]
struct Args {
    /// Run file (TOML)
    config: PathBuf,

    /// Listen address, overriding [network].listen
    #[arg(long)]
    listen: Option<String>,

    /// Output directory, overriding [output].dir
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log file, overriding [output].log_file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("broodd: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<i32> {
    let mut config = match RunConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("broodd: {}", e);
            return Ok(exit::BAD_ARGUMENTS);
        }
    };
    if let Some(listen) = args.listen {
        config.network.listen = listen;
    }
    if let Some(output) = args.output {
        config.output.dir = output;
    }
    if args.log_file.is_some() {
        config.output.log_file = args.log_file;
    }

    std::fs::create_dir_all(&config.output.dir)
        .with_context(|| format!("creating {}", config.output.dir.display()))?;
    let _log_guard = setup_logging(&config)?;

    info!(config = %args.config.display(), kind = ?config.job.kind, "Starting broodd");

    let daemon = match lifecycle::startup(&config).await {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to start daemon: {}", e);
            eprintln!("broodd: {}", e);
            return Ok(e.exit_code());
        }
    };

    let addr = daemon.local_addr()?;
    info!(%addr, "Daemon ready");

    // Signal ready for the parent process, with the bound address
    println!("READY {}", addr);
    std::io::stdout().flush()?;

    let code = serve(&daemon).await?;
    daemon.shutdown();
    info!(code, "Daemon stopped");
    Ok(code)
}

async fn serve(daemon: &Daemon) -> anyhow::Result<i32> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let period = daemon.config.timeouts.contact;
    let mut sweep = interval_at(Instant::now() + period, period);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut check = interval(CHECK_INTERVAL);
    let io_timeout = daemon.config.network.io_timeout;

    let code = loop {
        tokio::select! {
            result = daemon.listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        debug!(%peer, "connection accepted");
                        let coordinator = Arc::clone(&daemon.coordinator);
                        tokio::spawn(async move {
                            if let Err(e) = server::handle_connection(coordinator, stream, io_timeout).await {
                                error!(%peer, "Error handling connection: {}", e);
                            }
                        });
                    }
                    Err(e) => error!("Error accepting connection: {}", e),
                }
            }

            _ = sweep.tick() => {
                let coordinator = Arc::clone(&daemon.coordinator);
                let summary = tokio::task::spawn_blocking(move || coordinator.sweep()).await?;
                if !summary.evicted.is_empty() || !summary.stale.is_empty() {
                    info!(
                        dummies = summary.dummies,
                        evicted = ?summary.evicted,
                        stale = ?summary.stale,
                        "sweep"
                    );
                }
            }

            _ = check.tick() => {
                if let Some(code) = daemon.check() {
                    break code;
                }
            }

            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                break exit::SUCCESS;
            }

            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down...");
                break exit::SUCCESS;
            }
        }
    };
    Ok(code)
}

fn setup_logging(
    config: &RunConfig,
) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let (non_blocking, guard) = match &config.output.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            std::fs::create_dir_all(dir)?;
            let name = path
                .file_name()
                .with_context(|| format!("log file {} has no file name", path.display()))?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}
