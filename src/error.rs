//! Failures of the relocation sequence.
//!
//! Every variant is fatal to an invocation. The binary prints the `Display`
//! form on stderr and exits with [`LaunchError::exit_code`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::namespace::NamespaceKind;

pub type Result<T> = std::result::Result<T, LaunchError>;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("stop process error: {0}")]
    SelfPause(#[source] nix::Error),

    #[error("{0} is not a valid process ID")]
    InvalidTarget(String),

    #[error("cmd args is empty")]
    MissingCommand,

    #[error("cannot read environment of target [{}]: {source}", path.display())]
    EnvironmentUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("environment of target [{}] exceeds {max} bytes", path.display())]
    EnvironmentTooLarge { path: PathBuf, max: usize },

    #[error("failed to set environment variable [{0}]")]
    EnvironmentVariable(String),

    #[error("stat namespace file [{}] error: {source}", path.display())]
    NamespaceLookup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("open target namespace file [{}] error: {source}", path.display())]
    NamespaceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("setns({kind}) via [{}] error: {source}", path.display())]
    NamespaceJoin {
        kind: NamespaceKind,
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("encoded command length {len} is not a multiple of 4")]
    InvalidLength { len: usize },

    #[error("encoded command has invalid byte 0x{byte:02x} at offset {offset}")]
    InvalidEncoding { offset: usize, byte: u8 },

    #[error("encoded command ends with an incomplete block of {symbols} symbols")]
    IncompleteBlock { symbols: usize },

    #[error("decoded command contains a NUL byte")]
    EmbeddedNul,

    #[error("decode buffer holds {capacity} bytes, {needed} required")]
    OutputTooSmall { needed: usize, capacity: usize },

    #[error("cannot allocate {0} bytes for decoding")]
    Allocation(usize),

    #[error("failed to run {shell}: {source}")]
    Spawn {
        shell: &'static str,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    /// Exit status reported to the supervisor for this failure.
    ///
    /// Usage errors exit with 1, a bad encoded length with 254 and every
    /// other failure with 255.
    pub fn exit_code(&self) -> u8 {
        match self {
            LaunchError::InvalidTarget(_) | LaunchError::MissingCommand => 1,
            LaunchError::InvalidLength { .. } => 254,
            _ => 255,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::errno::Errno;

    #[test]
    fn test_usage_errors_exit_one() {
        assert_eq!(LaunchError::MissingCommand.exit_code(), 1);
        assert_eq!(LaunchError::InvalidTarget("0".into()).exit_code(), 1);
    }

    #[test]
    fn test_step_failures_exit_nonzero() {
        let lookup = LaunchError::NamespaceLookup {
            path: PathBuf::from("/proc/1/ns/net"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(lookup.exit_code(), 255);

        assert_eq!(LaunchError::InvalidLength { len: 5 }.exit_code(), 254);
        assert_eq!(
            LaunchError::InvalidEncoding { offset: 0, byte: b'!' }.exit_code(),
            255
        );
        assert_eq!(
            LaunchError::SelfPause(nix::Error::Sys(Errno::EPERM)).exit_code(),
            255
        );
    }

    #[test]
    fn test_messages_name_the_resource() {
        let err = LaunchError::NamespaceJoin {
            kind: NamespaceKind::Mnt,
            path: PathBuf::from("/proc/42/ns/mnt"),
            source: nix::Error::Sys(Errno::EPERM),
        };
        let msg = err.to_string();
        assert!(msg.contains("mnt"));
        assert!(msg.contains("/proc/42/ns/mnt"));

        let err = LaunchError::EnvironmentVariable("=oops".into());
        assert!(err.to_string().contains("[=oops]"));
        assert_eq!(err.exit_code(), 255);
    }
}
