//! keyholdd - Single-secret holding daemon
//!
//! Holds one secret in hardened memory and serves it to local clients
//! over a unix socket. The secret never touches a file, an environment
//! variable, or an argument list; it lives in a locked, dump-protected
//! mapping and is zeroized on every overwrite and on shutdown.

pub mod cell;
pub mod error;
pub mod guard;
pub mod page;
pub mod protocol;
pub mod server;

pub use cell::SecureCell;
pub use error::{CellError, PageError, RequestError};
