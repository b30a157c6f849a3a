//! keyholdd - Single-secret holding daemon
//!
//! Local processes fetch or replace the stored secret over a
//! unix-domain socket with a one-line protocol:
//!
//! - `G\n` - respond with the secret bytes (nothing if unset)
//! - `P<secret>\n` - replace the secret; no response
//!
//! Usage:
//!   keyholdd [SOCKET_PATH]
//!
//! The socket defaults to `~/.keyhold.sock` and is created owner-only.
//! The secret is memory-only and lost on exit.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use keyhold_core::Config;
use keyholdd::error::CellError;
use keyholdd::{guard, server, SecureCell};

#[derive(Parser)]
#[command(name = "keyholdd")]
#[command(about = "Single-secret holding daemon - serves one secret to local clients over a unix socket")]
#[command(version)]
struct Cli {
    /// Absolute path for the socket endpoint (default: ~/.keyhold.sock)
    socket_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config =
        Config::new(cli.socket_path.as_deref()).context("resolving socket path")?;

    // Harden before the secret exists anywhere in memory.
    let status = guard::disable_core_dumps();
    if status.is_protected() {
        tracing::debug!(prctl = status.prctl, rlimit = status.rlimit, "core dumps disabled");
    } else {
        tracing::warn!("could not disable core dumps on this platform");
    }

    let cell = Arc::new(
        SecureCell::with_capacity(config.buffer_size).context("allocating secret buffer")?,
    );

    let mut sigint = signal(SignalKind::interrupt()).context("registering SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("registering SIGTERM handler")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (fatal_tx, mut fatal_rx) = mpsc::channel::<CellError>(1);

    let listener = tokio::spawn(server::run(
        config,
        Arc::clone(&cell),
        shutdown_rx,
        fatal_tx,
    ));

    // Block until something ends the process: a signal, a fatal cell
    // error escalated by a connection task, or the listener going away
    // on its own (which drops the fatal channel's sender).
    let fatal = tokio::select! {
        _ = sigint.recv() => {
            tracing::info!("received SIGINT, shutting down");
            None
        }
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM, shutting down");
            None
        }
        err = fatal_rx.recv() => err,
    };

    // Ordered teardown: stop accepting, remove the endpoint, zeroize
    // and release the secret, then exit. In-flight connections are not
    // drained; the protocol is one-shot and stateless.
    let _ = shutdown_tx.send(true);
    let listener_result = listener
        .await
        .unwrap_or_else(|err| Err(anyhow::anyhow!("listener task panicked: {err}")));
    cell.destroy();

    match fatal {
        Some(err) => {
            tracing::error!("exiting on fatal secret-cell error: {err}");
            Err(err.into())
        }
        None => {
            listener_result?;
            tracing::info!("shutdown complete");
            Ok(())
        }
    }
}
