//! Manual socket binding provider.
//!
//! Binds the relay's Unix socket at a fixed path, replacing any stale socket
//! file left behind by a previous run.

use std::future::Future;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};

use git_credential_relay_core::{default_socket_path, SocketError, SocketProvider};
use tokio::net::UnixListener;
use tracing::debug;

/// Default listen backlog.
pub const DEFAULT_BACKLOG: u32 = 16;

/// Serializes changes to the process-wide umask.
static UMASK_LOCK: Mutex<()> = Mutex::new(());

/// Hold this while creating files that must not see the bind umask.
pub(crate) fn umask_lock() -> MutexGuard<'static, ()> {
    UMASK_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Socket provider that binds a Unix socket at a given path.
pub struct ManualSocketProvider {
    /// Path to the Unix socket.
    path: PathBuf,
    /// Maximum number of pending connections.
    backlog: u32,
}

impl ManualSocketProvider {
    /// Create a new manual socket provider with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backlog: DEFAULT_BACKLOG,
        }
    }

    /// Set the listen backlog.
    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Bind the socket.
    async fn bind(&self) -> Result<UnixListener, SocketError> {
        // Create parent directory if needed
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(SocketError::DirectoryCreationFailed)?;
                debug!(path = %parent.display(), "Created socket directory");
            }
        }

        // Remove a stale socket; a missing file is fine
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed existing socket"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(SocketError::StaleSocket(e)),
        }

        // The umask keeps the socket private from the moment it exists
        let listener = {
            let _guard = umask_lock();
            let old_umask = unsafe { libc::umask(0o177) };
            let result = std::os::unix::net::UnixListener::bind(&self.path);
            unsafe { libc::umask(old_umask) };
            result.map_err(SocketError::BindFailed)?
        };

        // Set permissions to 0600 (owner only)
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, perms).map_err(SocketError::Permissions)?;
        }

        // listen(2) on a listening socket only updates its backlog
        let backlog = libc::c_int::try_from(self.backlog).unwrap_or(libc::c_int::MAX);
        if unsafe { libc::listen(listener.as_raw_fd(), backlog) } != 0 {
            return Err(SocketError::BindFailed(io::Error::last_os_error()));
        }

        listener
            .set_nonblocking(true)
            .map_err(SocketError::BindFailed)?;
        let listener = UnixListener::from_std(listener).map_err(SocketError::BindFailed)?;

        debug!(
            path = %self.path.display(),
            backlog = self.backlog,
            "Socket bound successfully"
        );
        Ok(listener)
    }
}

impl Default for ManualSocketProvider {
    fn default() -> Self {
        Self::new(default_socket_path())
    }
}

impl SocketProvider for ManualSocketProvider {
    fn listen(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<UnixListener, SocketError>> + Send + '_>> {
        Box::pin(self.bind())
    }

    fn socket_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
