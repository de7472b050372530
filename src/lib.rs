//! Run a command inside the namespaces of another process.
//!
//! The helper borrows the environment and a chosen set of namespaces (IPC,
//! UTS, network, PID, mount) of a target process, then runs a Base64 encoded
//! shell command there. See the `ns-relocate` binary for the command line.

pub mod decoder;
pub mod environ;
pub mod error;
pub mod launcher;
pub mod namespace;
pub mod target;

pub use error::{LaunchError, Result};
