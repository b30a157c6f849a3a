//! Socket path resolution for the keyhold daemon

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Name of the socket dotfile placed in the invoking user's home.
pub const SOCKET_FILE_NAME: &str = ".keyhold.sock";

/// Errors from resolving the socket path
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("can't figure out where to put our socket: no home directory")]
    NoHomeDir,

    #[error("socket path override must be absolute: {0}")]
    NotAbsolute(String),
}

/// Default socket path: a dotfile in the invoking user's home directory.
pub fn default_socket_path() -> Result<PathBuf, PathError> {
    let home = dirs::home_dir().ok_or(PathError::NoHomeDir)?;
    Ok(home.join(SOCKET_FILE_NAME))
}

/// Resolve the socket path from an optional CLI override.
///
/// An override must be an absolute path; anything else is a setup error
/// rather than a silent fall-through to the default.
pub fn resolve_socket_path(over: Option<&Path>) -> Result<PathBuf, PathError> {
    match over {
        Some(path) if path.is_absolute() => Ok(path.to_path_buf()),
        Some(path) => Err(PathError::NotAbsolute(path.display().to_string())),
        None => default_socket_path(),
    }
}
