//! Error taxonomy for the daemon
//!
//! Three classes with different blast radii:
//!
//! - [`RequestError`]: scoped to one connection. Logged, the connection
//!   closes, the daemon keeps serving.
//! - [`PageError`] / [`CellError`]: the secret cell can no longer be
//!   trusted. Escalated to the run loop, which tears the process down.
//! - Setup errors (bind, allocation, path resolution): `anyhow` chains
//!   in `main`, fatal before the daemon ever serves.

use thiserror::Error;

/// Errors from syscalls backing the locked page.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PageError {
    #[error("mmap failed")]
    Map,

    #[error("mprotect(PROT_READ) failed")]
    Protect,

    #[error("mprotect(PROT_READ|PROT_WRITE) failed")]
    Unprotect,
}

/// Errors from the secure cell. Every variant is fatal to the process:
/// a failed write sequence leaves no trustworthy state to keep serving.
#[derive(Debug, Error)]
pub enum CellError {
    #[error("cell page operation failed: {0}")]
    Page(#[from] PageError),

    #[error("secret too long: {len} bytes exceeds capacity {capacity}")]
    TooLong { len: usize, capacity: usize },

    #[error("cell lock poisoned by a failed write sequence")]
    Poisoned,

    #[error("cell already destroyed")]
    Destroyed,
}

/// Per-request errors, contained to the connection that produced them.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("received error on read: {0}")]
    Read(#[from] std::io::Error),

    #[error("bad payload length: {actual}")]
    Length { actual: usize },
}
