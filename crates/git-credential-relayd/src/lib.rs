//! git-credential-relay daemon implementation.
//!
//! This crate provides the relay that sits on the operator's machine: it
//! listens on a Unix socket (usually forwarded to a remote host with
//! `ssh -R`), asks the operator before disclosing any credential, and hands
//! approved requests to `git credential`.

pub mod daemon;
pub mod delegate;
pub mod peer;
pub mod prompt;
pub mod socket;

// Re-export main components
pub use daemon::{PeerResolver, Relay};
pub use delegate::{GitCredentialDelegate, MockCredentialDelegate};
pub use prompt::{MockTrustGate, TerminalTrustGate};
pub use socket::ManualSocketProvider;
