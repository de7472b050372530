use libc::pid_t;
use nix::unistd::Pid;
use std::fmt;
use std::path::PathBuf;

use crate::error::{LaunchError, Result};

/// The process whose environment and namespaces are borrowed.
///
/// Only the ID is held. The process itself may exit at any time, in which
/// case later lookups under `/proc` fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetProcess {
    pid: Pid,
}

impl TargetProcess {
    pub fn new(pid: pid_t) -> Result<Self> {
        if pid <= 0 {
            return Err(LaunchError::InvalidTarget(pid.to_string()));
        }
        Ok(TargetProcess {
            pid: Pid::from_raw(pid),
        })
    }

    /// Parse a `-t` argument. Anything but a positive `pid_t` is rejected.
    pub fn parse(arg: &str) -> Result<Self> {
        let pid = arg
            .trim()
            .parse::<pid_t>()
            .map_err(|_| LaunchError::InvalidTarget(arg.to_string()))?;
        TargetProcess::new(pid)
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn proc_dir(&self) -> PathBuf {
        PathBuf::from(format!("/proc/{}", self.pid))
    }
}

impl fmt::Display for TargetProcess {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.pid)
    }
}
