//! Joining the namespaces of the target process.

use caps::{CapSet, Capability};
use log::{debug, warn};
use nix::errno::Errno;
use nix::sched::{setns, CloneFlags};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::os::unix::fs::MetadataExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use crate::error::{LaunchError, Result};
use crate::target::TargetProcess;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceKind {
    Ipc,
    Uts,
    Net,
    Pid,
    Mnt,
}

impl NamespaceKind {
    /// Order in which selected namespaces are joined. The mount namespace
    /// comes last because entering it changes what `/proc` paths resolve to.
    pub const JOIN_ORDER: [NamespaceKind; 5] = [
        NamespaceKind::Ipc,
        NamespaceKind::Uts,
        NamespaceKind::Net,
        NamespaceKind::Pid,
        NamespaceKind::Mnt,
    ];

    /// File name under `/proc/<pid>/ns`.
    pub fn name(self) -> &'static str {
        match self {
            NamespaceKind::Ipc => "ipc",
            NamespaceKind::Uts => "uts",
            NamespaceKind::Net => "net",
            NamespaceKind::Pid => "pid",
            NamespaceKind::Mnt => "mnt",
        }
    }

    pub fn clone_flag(self) -> CloneFlags {
        match self {
            NamespaceKind::Ipc => CloneFlags::CLONE_NEWIPC,
            NamespaceKind::Uts => CloneFlags::CLONE_NEWUTS,
            NamespaceKind::Net => CloneFlags::CLONE_NEWNET,
            NamespaceKind::Pid => CloneFlags::CLONE_NEWPID,
            NamespaceKind::Mnt => CloneFlags::CLONE_NEWNS,
        }
    }

    pub fn self_path(self) -> PathBuf {
        PathBuf::from("/proc/self/ns").join(self.name())
    }

    pub fn target_path(self, target: &TargetProcess) -> PathBuf {
        target.proc_dir().join("ns").join(self.name())
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of namespace kinds to join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceSelection {
    flags: CloneFlags,
}

impl Default for NamespaceSelection {
    fn default() -> Self {
        NamespaceSelection {
            flags: CloneFlags::empty(),
        }
    }
}

impl NamespaceSelection {
    pub fn new() -> Self {
        NamespaceSelection::default()
    }

    pub fn set(&mut self, kind: NamespaceKind, enabled: bool) {
        self.flags.set(kind.clone_flag(), enabled)
    }

    pub fn contains(&self, kind: NamespaceKind) -> bool {
        self.flags.contains(kind.clone_flag())
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Selected kinds in [`NamespaceKind::JOIN_ORDER`].
    pub fn kinds(&self) -> impl Iterator<Item = NamespaceKind> + '_ {
        NamespaceKind::JOIN_ORDER
            .iter()
            .copied()
            .filter(move |kind| self.contains(*kind))
    }
}

/// Outcome of a successful [`join_namespace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joined {
    /// The caller was already a member; nothing was done.
    AlreadyMember,
    Entered,
}

/// Move the calling process into the `kind` namespace of `target`.
pub fn join_namespace(target: &TargetProcess, kind: NamespaceKind) -> Result<Joined> {
    join_namespace_with(target, kind, setns)
}

/// [`join_namespace`] with the join primitive supplied by the caller.
pub fn join_namespace_with<F>(target: &TargetProcess, kind: NamespaceKind, join: F) -> Result<Joined>
where
    F: FnOnce(RawFd, CloneFlags) -> nix::Result<()>,
{
    join_paths(kind, &kind.self_path(), &kind.target_path(target), join)
}

fn join_paths<F>(kind: NamespaceKind, own: &Path, target: &Path, join: F) -> Result<Joined>
where
    F: FnOnce(RawFd, CloneFlags) -> nix::Result<()>,
{
    let own_ino = namespace_inode(own)?;
    let target_ino = namespace_inode(target)?;
    if own_ino == target_ino {
        debug!("already in {} namespace {} of {}", kind, target_ino, target.display());
        return Ok(Joined::AlreadyMember);
    }

    let handle = OpenOptions::new()
        .read(true)
        .open(target)
        .map_err(|source| LaunchError::NamespaceOpen {
            path: target.to_path_buf(),
            source,
        })?;

    join(handle.as_raw_fd(), kind.clone_flag()).map_err(|source| {
        if let nix::Error::Sys(Errno::EPERM) = source {
            report_capability(kind);
        }
        LaunchError::NamespaceJoin {
            kind,
            path: target.to_path_buf(),
            source,
        }
    })?;

    debug!("joined {} namespace {} via {}", kind, target_ino, target.display());
    Ok(Joined::Entered)
}

fn namespace_inode(path: &Path) -> Result<u64> {
    fs::metadata(path)
        .map(|meta| meta.ino())
        .map_err(|source| LaunchError::NamespaceLookup {
            path: path.to_path_buf(),
            source,
        })
}

fn report_capability(kind: NamespaceKind) {
    match caps::has_cap(None, CapSet::Effective, Capability::CAP_SYS_ADMIN) {
        Ok(false) => warn!(
            "CAP_SYS_ADMIN is not in the effective set, needed to join the {} namespace",
            kind
        ),
        Ok(true) => debug!("setns({}) refused despite CAP_SYS_ADMIN", kind),
        Err(err) => debug!("cannot read capabilities: {}", err),
    }
}
