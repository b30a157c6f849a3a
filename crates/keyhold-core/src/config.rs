//! Daemon configuration
//!
//! Built once at startup from the CLI and the environment, then passed
//! into each component. There are no process-wide mutable globals.

use std::path::{Path, PathBuf};

use crate::paths::{resolve_socket_path, PathError};

/// Maximum secret size in bytes when not otherwise configured.
pub const DEFAULT_BUFFER_SIZE: usize = 256;

/// Runtime configuration for the keyhold daemon
#[derive(Debug, Clone)]
pub struct Config {
    /// Filesystem path of the unix socket endpoint
    pub socket_path: PathBuf,
    /// Maximum secret size in bytes
    pub buffer_size: usize,
}

impl Config {
    /// Build a config from an optional socket path override.
    pub fn new(socket_override: Option<&Path>) -> Result<Self, PathError> {
        Ok(Self {
            socket_path: resolve_socket_path(socket_override)?,
            buffer_size: DEFAULT_BUFFER_SIZE,
        })
    }

    /// Replace the buffer size, e.g. for tests with small secrets.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_buffer_size() {
        let config = Config::new(Some(Path::new("/tmp/keyhold-test.sock"))).unwrap();
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(config.socket_path, PathBuf::from("/tmp/keyhold-test.sock"));
    }

    #[test]
    fn test_with_buffer_size() {
        let config = Config::new(Some(Path::new("/tmp/keyhold-test.sock")))
            .unwrap()
            .with_buffer_size(8);
        assert_eq!(config.buffer_size, 8);
    }
}
