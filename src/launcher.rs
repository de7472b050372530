//! Sequencing of a relocation: self-pause, environment import, namespace
//! joins, decoding and finally running the command.

use log::{debug, warn};
use nix::sys::signal::{kill, Signal};
use nix::unistd::getpid;
use std::ffi::OsStr;
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus};

use crate::decoder::decode_command;
use crate::environ::{import_environment, EnvOverlay};
use crate::error::{LaunchError, Result};
use crate::namespace::{join_namespace, NamespaceSelection};
use crate::target::TargetProcess;

/// Interpreter the decoded command is handed to.
pub const SHELL: &str = "/bin/sh";

/// Stages a launch passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    SelfPaused,
    EnvImported,
    NamespacesJoined,
    CommandDecoded,
    Executed,
    Exited,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A validated invocation.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub target: TargetProcess,
    pub encoded_command: String,
    pub namespaces: NamespaceSelection,
    pub import_env: bool,
}

impl LaunchRequest {
    /// Validate the raw `-t` and `-c` values. The target is checked first.
    pub fn new(
        target: Option<&str>,
        encoded_command: Option<&str>,
        namespaces: NamespaceSelection,
        import_env: bool,
    ) -> Result<Self> {
        let target = TargetProcess::parse(target.unwrap_or("0"))?;
        let encoded_command = match encoded_command {
            Some(cmd) if !cmd.is_empty() => cmd.to_string(),
            _ => return Err(LaunchError::MissingCommand),
        };
        Ok(LaunchRequest {
            target,
            encoded_command,
            namespaces,
            import_env,
        })
    }
}

/// Stop the calling process until a supervisor sends `SIGCONT`.
pub fn self_pause() -> Result<()> {
    kill(getpid(), Signal::SIGSTOP).map_err(LaunchError::SelfPause)?;
    debug!("entered {}", State::SelfPaused);
    Ok(())
}

/// Run everything after the self-pause and return the command's status.
pub fn run(request: &LaunchRequest) -> Result<ExitStatus> {
    let overlay = if request.import_env {
        let overlay = import_environment(&request.target)?;
        if overlay.is_empty() {
            warn!("process {} has an empty environment", request.target);
        }
        debug!("entered {} ({} variables)", State::EnvImported, overlay.len());
        overlay
    } else {
        EnvOverlay::new()
    };

    for kind in request.namespaces.kinds() {
        join_namespace(&request.target, kind)?;
    }
    debug!("entered {}", State::NamespacesJoined);

    let raw = decode_command(&request.encoded_command)?;
    if raw.contains(&0) {
        return Err(LaunchError::EmbeddedNul);
    }
    debug!("entered {} ({} bytes)", State::CommandDecoded, raw.len());

    let status = execute(OsStr::from_bytes(&raw), &overlay)?;
    debug!("entered {} with {}", State::Executed, status);
    Ok(status)
}

/// Run `command` through [`SHELL`], blocking until it finishes.
pub fn execute(command: &OsStr, overlay: &EnvOverlay) -> Result<ExitStatus> {
    let mut cmd = Command::new(SHELL);
    cmd.arg("-c").arg(command);
    overlay.apply(&mut cmd);
    cmd.status()
        .map_err(|source| LaunchError::Spawn { shell: SHELL, source })
}

/// Exit code of this process for a finished command: the command's own code,
/// or `128 + signal` when it was killed.
pub fn exit_code_of(status: ExitStatus) -> u8 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code as u8,
        (None, Some(signal)) => 128u8.wrapping_add(signal as u8),
        (None, None) => 255,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(encoded: &str) -> LaunchRequest {
        let pid = std::process::id().to_string();
        LaunchRequest::new(Some(&pid), Some(encoded), NamespaceSelection::new(), false).unwrap()
    }

    #[test]
    fn test_target_checked_before_command() {
        match LaunchRequest::new(Some("0"), None, NamespaceSelection::new(), false) {
            Err(LaunchError::InvalidTarget(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        match LaunchRequest::new(None, Some("ZWNobw=="), NamespaceSelection::new(), false) {
            Err(LaunchError::InvalidTarget(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_command_required() {
        for cmd in [None, Some("")].iter() {
            match LaunchRequest::new(Some("1"), *cmd, NamespaceSelection::new(), false) {
                Err(LaunchError::MissingCommand) => {}
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_run_reports_command_exit_code() {
        // "exit 3"
        let status = run(&request("ZXhpdCAz")).unwrap();
        assert_eq!(exit_code_of(status), 3);
    }

    #[test]
    fn test_run_rejects_bad_encoding_before_executing() {
        assert!(matches!(
            run(&request("ZXhpd")),
            Err(LaunchError::InvalidLength { len: 5 })
        ));
        assert!(matches!(
            run(&request("ZXhp!CAz")),
            Err(LaunchError::InvalidEncoding { offset: 4, .. })
        ));
        // "a\0b"
        assert!(matches!(run(&request("YQBi")), Err(LaunchError::EmbeddedNul)));
    }

    #[test]
    fn test_overlay_reaches_command() {
        let mut overlay = EnvOverlay::new();
        overlay.set("RELOCATED", "yes");
        let status = execute(OsStr::new("test \"$RELOCATED\" = yes"), &overlay).unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(exit_code_of(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code_of(ExitStatus::from_raw(7 << 8)), 7);
        assert_eq!(exit_code_of(ExitStatus::from_raw(9)), 137);
        assert_eq!(exit_code_of(ExitStatus::from_raw(15)), 143);
    }
}
