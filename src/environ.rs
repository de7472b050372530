//! Importing the environment of the target process.
//!
//! The kernel exposes the initial environment of a process as a block of
//! NUL-terminated `KEY=VALUE` records in `/proc/<pid>/environ`. The records
//! are collected into an [`EnvOverlay`] that is installed on the command
//! being launched; the helper's own environment is left alone.

use log::debug;
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{self, Read};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::process::Command;

use crate::error::{LaunchError, Result};
use crate::target::TargetProcess;

/// Largest environment block accepted from a target.
pub const MAX_ENVIRON_LEN: usize = 4 * 1024 * 1024;

const INITIAL_CAPACITY: usize = 16 * 1024;

/// Variables to install on top of the inherited environment.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnvOverlay {
    vars: Vec<(OsString, OsString)>,
}

impl EnvOverlay {
    pub fn new() -> Self {
        EnvOverlay::default()
    }

    pub fn set<K: AsRef<OsStr>, V: AsRef<OsStr>>(&mut self, key: K, value: V) {
        self.vars
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
    }

    /// Value `key` will have once applied. Later records win.
    pub fn get<K: AsRef<OsStr>>(&self, key: K) -> Option<&OsStr> {
        self.vars
            .iter()
            .rev()
            .find(|(k, _)| k.as_os_str() == key.as_ref())
            .map(|(_, v)| v.as_os_str())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Install every variable on `cmd`, overwriting inherited values.
    pub fn apply(&self, cmd: &mut Command) {
        for (key, value) in &self.vars {
            cmd.env(key, value);
        }
    }
}

/// Read a whole environment block.
///
/// A block larger than [`MAX_ENVIRON_LEN`] is an error, never a truncated
/// result.
pub fn read_environ(path: &Path) -> Result<Vec<u8>> {
    let unreadable = |source: io::Error| LaunchError::EnvironmentUnreadable {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(unreadable)?;

    let mut block = Vec::new();
    block
        .try_reserve(INITIAL_CAPACITY)
        .map_err(|_| unreadable(io::Error::from(io::ErrorKind::OutOfMemory)))?;
    file.take(MAX_ENVIRON_LEN as u64 + 1)
        .read_to_end(&mut block)
        .map_err(unreadable)?;

    if block.len() > MAX_ENVIRON_LEN {
        return Err(LaunchError::EnvironmentTooLarge {
            path: path.to_path_buf(),
            max: MAX_ENVIRON_LEN,
        });
    }
    Ok(block)
}

/// Split an environment block into variables.
pub fn parse_environ(block: &[u8]) -> Result<EnvOverlay> {
    let mut overlay = EnvOverlay::new();
    for record in block.split(|&b| b == 0).filter(|r| !r.is_empty()) {
        match record.iter().position(|&b| b == b'=') {
            Some(eq) if eq > 0 => overlay.set(
                OsStr::from_bytes(&record[..eq]),
                OsStr::from_bytes(&record[eq + 1..]),
            ),
            _ => {
                return Err(LaunchError::EnvironmentVariable(
                    String::from_utf8_lossy(record).into_owned(),
                ))
            }
        }
    }
    Ok(overlay)
}

pub fn import_environment(target: &TargetProcess) -> Result<EnvOverlay> {
    let path = target.proc_dir().join("environ");
    let block = read_environ(&path)?;
    let overlay = parse_environ(&block)?;
    debug!(
        "read {} bytes, {} variables from {}",
        block.len(),
        overlay.len(),
        path.display()
    );
    Ok(overlay)
}
