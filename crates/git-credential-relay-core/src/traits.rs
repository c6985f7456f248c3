//! Trait definitions for pluggable components.
//!
//! These traits define the interfaces for:
//! - Operator approval (terminal prompt or a scripted responder)
//! - The credential backend (`git credential` or an in-process double)
//! - Socket provisioning
//!
//! By using traits, the relay can be tested end to end without a terminal
//! and without running `git`.

use std::future::Future;
use std::pin::Pin;

use tokio::net::UnixListener;

use crate::protocol::CredentialMap;
use crate::types::ConfirmRequest;

/// Error type for trust gate operations.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Reading the answer or writing the question failed.
    #[error("prompt I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Generic UI error.
    #[error("UI error: {0}")]
    UiError(String),
}

/// Error type for credential delegate operations.
///
/// A command that runs and exits non-zero is not an error. These variants
/// only cover failing to run the command at all.
#[derive(Debug, thiserror::Error)]
pub enum DelegateError {
    /// The command could not be started.
    #[error("failed to start credential command `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Talking to the running command failed.
    #[error("credential command I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The command did not finish in time and was killed.
    #[error("credential command timed out after {0} seconds")]
    Timeout(u64),
}

/// Error type for socket provider operations.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    /// Failed to bind to the socket.
    #[error("failed to bind socket: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Failed to remove a stale socket file.
    #[error("failed to remove stale socket: {0}")]
    StaleSocket(#[source] std::io::Error),

    /// Failed to restrict the socket file permissions.
    #[error("failed to set socket permissions: {0}")]
    Permissions(#[source] std::io::Error),

    /// Failed to create the socket directory.
    #[error("failed to create socket directory: {0}")]
    DirectoryCreationFailed(#[source] std::io::Error),
}

/// Trait for operator approval of `get` requests.
///
/// Implementations block (asynchronously) until the operator answers.
///
/// # Example (Mock Implementation)
///
/// ```ignore
/// struct AlwaysYes;
///
/// impl TrustGate for AlwaysYes {
///     async fn confirm(&self, request: ConfirmRequest) -> Result<bool, PromptError> {
///         Ok(true)
///     }
/// }
/// ```
pub trait TrustGate: Send + Sync {
    /// Ask whether the credential described by `request` may be disclosed.
    ///
    /// # Returns
    ///
    /// `true` if the operator approved, `false` for any other answer.
    ///
    /// # Errors
    ///
    /// Returns `PromptError` if the operator could not be asked at all.
    fn confirm(
        &self,
        request: ConfirmRequest,
    ) -> Pin<Box<dyn Future<Output = Result<bool, PromptError>> + Send + '_>>;
}

/// Trait for the credential backend the relay delegates to.
///
/// Both operations take the request with `op` already removed.
pub trait CredentialDelegate: Send + Sync {
    /// Look up a credential. Whatever the backend produced is returned,
    /// possibly an empty map.
    fn fill(
        &self,
        request: CredentialMap,
    ) -> Pin<Box<dyn Future<Output = Result<CredentialMap, DelegateError>> + Send + '_>>;

    /// Persist a credential. The backend's output and exit status are ignored.
    fn approve(
        &self,
        request: CredentialMap,
    ) -> Pin<Box<dyn Future<Output = Result<(), DelegateError>> + Send + '_>>;
}

/// Trait for socket provider implementations.
pub trait SocketProvider: Send + Sync {
    /// Create and return a Unix socket listener ready to accept connections.
    fn listen(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<UnixListener, SocketError>> + Send + '_>>;

    /// Return the socket path (for logging/debugging).
    fn socket_path(&self) -> Option<&std::path::Path> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delegate_error_display() {
        let err = DelegateError::Spawn {
            program: "git".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(
            err.to_string(),
            "failed to start credential command `git`: not found"
        );
        assert_eq!(
            DelegateError::Timeout(30).to_string(),
            "credential command timed out after 30 seconds"
        );
    }

    #[test]
    fn socket_error_display() {
        let err = SocketError::BindFailed(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "address in use",
        ));
        assert_eq!(err.to_string(), "failed to bind socket: address in use");
    }

    #[test]
    fn prompt_error_from_io() {
        let err: PromptError =
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "closed").into();
        assert_eq!(err.to_string(), "prompt I/O failed: closed");
    }
}
