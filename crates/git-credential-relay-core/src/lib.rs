//! Core types and utilities for git-credential-relay.
//!
//! This crate provides the building blocks shared by the relay daemon and
//! the git credential helper that talks to it over a forwarded socket.
//!
//! # Modules
//!
//! - [`protocol`]: The `key=value` block codec (`CredentialMap`, `ErrorReply`)
//! - [`types`]: Operations, peer identity and the target shown to the operator
//! - [`traits`]: Pluggable component traits (`TrustGate`, `CredentialDelegate`, `SocketProvider`)
//! - [`config`]: TOML configuration
//!
//! # Example
//!
//! ```
//! use git_credential_relay_core::protocol::{encode_block, CredentialMap};
//! use git_credential_relay_core::types::Operation;
//!
//! let mut request: CredentialMap =
//!     [("op", "get"), ("protocol", "https"), ("host", "example.com")]
//!         .into_iter()
//!         .collect();
//!
//! assert_eq!(Operation::take_from(&mut request), Operation::Get);
//! assert_eq!(encode_block(&request), "protocol=https\nhost=example.com\n\n");
//! ```

pub mod config;
pub mod protocol;
pub mod traits;
pub mod types;

// Re-export commonly used types at the crate root for convenience
pub use config::{default_socket_path, Config, ConfigError};
pub use protocol::{CredentialMap, ErrorReply, ProtocolError};
pub use traits::{
    CredentialDelegate, DelegateError, PromptError, SocketError, SocketProvider, TrustGate,
};
pub use types::{ConfirmRequest, CredentialTarget, Operation, PeerInfo};
