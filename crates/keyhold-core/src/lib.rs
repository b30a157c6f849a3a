//! Keyhold Core - Shared functionality for the keyhold daemon
//!
//! Configuration and socket path resolution, kept separate from the
//! daemon so the defaults are usable from tests and future tooling.

pub mod config;
pub mod paths;

pub use config::Config;
pub use paths::{default_socket_path, resolve_socket_path, PathError};
