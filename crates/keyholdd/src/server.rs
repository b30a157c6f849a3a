//! Unix-socket listener and per-connection handling
//!
//! The listener binds the endpoint under a restrictive umask so the
//! socket file is created owner-only, then accepts connections until
//! told to shut down. Every accepted connection is served on its own
//! task: one request line in, at most one response out, then the
//! connection closes. A misbehaving client affects nobody else.
//!
//! Per-request failures are logged and contained. Secret-cell failures
//! are escalated over the fatal channel; the run loop in `main` turns
//! them into a controlled teardown.

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, watch};

use keyhold_core::Config;

use crate::cell::SecureCell;
use crate::error::{CellError, RequestError};
use crate::protocol::{self, Command};

/// Owner-only endpoint: mask out group/other plus the execute bit.
const SOCKET_UMASK: libc::mode_t = 0o177;

/// Bind the endpoint with creation permissions restricted to the owner.
fn bind_endpoint(path: &Path) -> io::Result<UnixListener> {
    let previous = unsafe { libc::umask(SOCKET_UMASK) };
    let listener = UnixListener::bind(path);
    unsafe { libc::umask(previous) };
    listener
}

/// Accept loop. Runs until the shutdown channel fires or accepting
/// fails, then removes the endpoint file (best-effort) and returns.
/// An `Err` from this function is a setup failure: the endpoint could
/// not be bound and the service never started.
pub async fn run(
    config: Config,
    cell: Arc<SecureCell>,
    mut shutdown: watch::Receiver<bool>,
    fatal: mpsc::Sender<CellError>,
) -> Result<()> {
    let listener = bind_endpoint(&config.socket_path).with_context(|| {
        format!("failed to bind socket at {}", config.socket_path.display())
    })?;
    tracing::info!(path = %config.socket_path.display(), "listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let cell = Arc::clone(&cell);
                    let fatal = fatal.clone();
                    let buffer_size = config.buffer_size;
                    tokio::spawn(async move {
                        if let Err(err) = handle_client(stream, &cell, buffer_size, &fatal).await {
                            tracing::warn!("{err}");
                        }
                    });
                }
                Err(err) => {
                    tracing::warn!("exiting accept loop: {err}");
                    break;
                }
            },
            _ = shutdown.changed() => break,
        }
    }

    drop(listener);
    // Absence is fine; the endpoint may already be gone.
    let _ = std::fs::remove_file(&config.socket_path);
    tracing::info!("listener stopped, endpoint removed");
    Ok(())
}

/// Serve exactly one request on `stream`, then close it.
async fn handle_client(
    stream: UnixStream,
    cell: &SecureCell,
    buffer_size: usize,
    fatal: &mpsc::Sender<CellError>,
) -> Result<(), RequestError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let mut line = Vec::with_capacity(buffer_size + 2);
    reader.read_until(b'\n', &mut line).await?;
    if line.last() != Some(&b'\n') {
        // Covers both an immediate close and a partial line
        return Err(RequestError::Read(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before delimiter",
        )));
    }

    match protocol::parse(&line, buffer_size)? {
        Command::Get => match cell.read() {
            Ok(secret) => {
                if !secret.is_empty() {
                    if let Err(err) = writer.write_all(&secret).await {
                        tracing::debug!("response write failed: {err}");
                    }
                }
            }
            Err(err) => escalate(fatal, err).await,
        },
        Command::Put(payload) => {
            if let Err(err) = cell.write(payload) {
                escalate(fatal, err).await;
            }
        }
        Command::Unknown(cmd) => {
            // Silently ignored on the wire for client compatibility
            tracing::debug!(cmd, "ignoring unknown command");
        }
    }

    let _ = writer.shutdown().await;
    Ok(())
}

/// Hand a cell failure to the run loop for process teardown. If the
/// receiver is already gone the process is shutting down anyway.
async fn escalate(fatal: &mpsc::Sender<CellError>, err: CellError) {
    tracing::error!("secret cell failure: {err}");
    let _ = fatal.send(err).await;
}
