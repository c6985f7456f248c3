//! Socket provider implementations for the relay.
//!
//! - [`ManualSocketProvider`]: Binds the socket at a configured path
//!
//! It implements the [`SocketProvider`] trait from `git-credential-relay-core`.
//!
//! [`SocketProvider`]: git_credential_relay_core::SocketProvider

mod manual;

pub use manual::{ManualSocketProvider, DEFAULT_BACKLOG};

/// A temp directory created outside any bind's umask window.
#[cfg(test)]
pub(crate) fn tempdir() -> tempfile::TempDir {
    let _guard = manual::umask_lock();
    tempfile::tempdir().unwrap()
}
