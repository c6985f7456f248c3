//! Identification of the process behind a connection.
//!
//! The PID comes from the socket's peer credentials (`SO_PEERCRED` on Linux,
//! `LOCAL_PEERPID` on macOS). The name is looked up in the process table.
//! Both steps are best-effort and the result is only used for display.

use std::ffi::OsString;
use std::path::Path;

use git_credential_relay_core::PeerInfo;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tokio::net::UnixStream;
use tracing::debug;

/// Resolve the identity of the peer connected on `stream`.
///
/// Never fails: an unavailable PID gives [`PeerInfo::unknown`], an
/// unresolvable name keeps the PID with no name.
pub fn resolve(stream: &UnixStream) -> PeerInfo {
    match peer_pid(stream) {
        Some(pid) => PeerInfo::new(pid, process_name(pid)),
        None => PeerInfo::unknown(),
    }
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios"
))]
fn peer_pid(stream: &UnixStream) -> Option<u32> {
    match stream.peer_cred() {
        Ok(cred) => cred.pid().and_then(|pid| u32::try_from(pid).ok()),
        Err(e) => {
            debug!(error = %e, "Failed to read peer credentials");
            None
        }
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios"
)))]
fn peer_pid(_stream: &UnixStream) -> Option<u32> {
    None
}

/// Length at which Linux truncates a process's `comm` name.
const COMM_LEN: usize = 15;

/// Look up a process name by PID.
pub fn process_name(pid: u32) -> Option<String> {
    let mut sys = System::new();
    let sysinfo_pid = Pid::from_u32(pid);
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[sysinfo_pid]),
        false,
        ProcessRefreshKind::nothing()
            .with_cmd(UpdateKind::OnlyIfNotSet)
            .with_exe(UpdateKind::OnlyIfNotSet),
    );
    let process = sys.process(sysinfo_pid)?;

    let comm = process.name().to_string_lossy();
    if comm.is_empty() {
        debug!(pid, "Process has no name");
        return None;
    }
    Some(untruncated_name(&comm, process.cmd(), process.exe()))
}

/// Undo `comm` truncation using the command line or executable path.
///
/// A candidate is only used if it extends the short name.
fn untruncated_name(comm: &str, cmd: &[OsString], exe: Option<&Path>) -> String {
    if comm.len() < COMM_LEN {
        return comm.to_string();
    }
    cmd.first()
        .map(Path::new)
        .into_iter()
        .chain(exe)
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy())
        .find(|name| name.starts_with(comm))
        .map(|name| name.into_owned())
        .unwrap_or_else(|| comm.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[tokio::test]
    async fn resolves_own_process_over_socket_pair() {
        let (a, _b) = UnixStream::pair().unwrap();
        let peer = resolve(&a);

        assert_eq!(peer.pid, Some(std::process::id()));
        assert!(peer.name.is_some());
        assert!(peer.to_string().ends_with(&format!("(pid {})", std::process::id())));
    }

    #[test]
    fn process_name_of_current_process() {
        let name = process_name(std::process::id());
        if cfg!(any(target_os = "linux", target_os = "macos")) {
            assert!(name.is_some());
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn process_name_is_not_truncated() {
        // Test binaries are named `git_credential_relayd-<hash>`, well past 15 bytes
        let exe = std::env::current_exe().unwrap();
        let expected = exe.file_name().unwrap().to_string_lossy().into_owned();
        assert!(expected.len() > COMM_LEN);

        assert_eq!(process_name(std::process::id()), Some(expected));
    }

    #[test]
    fn short_names_are_kept() {
        let cmd = vec![OsString::from("/usr/bin/git-remote-https")];
        assert_eq!(untruncated_name("git", &cmd, None), "git");
    }

    #[test]
    fn truncated_name_is_restored_from_cmd() {
        let cmd = vec![OsString::from("/usr/lib/git-core/git-credential-relay")];
        assert_eq!(
            untruncated_name("git-credential-", &cmd, None),
            "git-credential-relay"
        );
    }

    #[test]
    fn truncated_name_falls_back_to_exe() {
        // argv[0] rewritten to something unrelated
        let cmd = vec![OsString::from("worker")];
        let exe = Path::new("/opt/tools/git-credential-manager");
        assert_eq!(
            untruncated_name("git-credential-", &cmd, Some(exe)),
            "git-credential-manager"
        );
    }

    #[test]
    fn truncated_name_without_match_is_kept() {
        assert_eq!(untruncated_name("kworker/0:1-eve", &[], None), "kworker/0:1-eve");
    }

    #[test]
    fn process_name_of_missing_process_is_none() {
        // Far above any default pid_max
        assert!(process_name(u32::MAX - 1).is_none());
    }
}
