//! Core types for git-credential-relay.
//!
//! This module contains the data structures passed between the relay's
//! components: the requested operation, the identity of the connecting
//! peer, and the target description shown to the operator.

use std::fmt;

use crate::protocol::CredentialMap;

/// The operation a peer asks for, taken from the `op` key of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Look up a credential. Requires operator approval.
    Get,
    /// Persist a credential. Approved automatically.
    Store,
    /// Forget a credential. Always rejected.
    Erase,
    /// Anything else.
    Unknown(String),
}

impl Operation {
    /// Key that carries the operation in a request.
    pub const KEY: &'static str = "op";

    /// Parse an operation name. Matching is exact.
    ///
    /// # Examples
    ///
    /// ```
    /// use git_credential_relay_core::types::Operation;
    ///
    /// assert_eq!(Operation::parse("get"), Operation::Get);
    /// assert_eq!(Operation::parse("GET"), Operation::Unknown("GET".to_string()));
    /// ```
    pub fn parse(name: &str) -> Self {
        match name {
            "get" => Operation::Get,
            "store" => Operation::Store,
            "erase" => Operation::Erase,
            other => Operation::Unknown(other.to_string()),
        }
    }

    /// Remove the `op` key from a request and parse it.
    ///
    /// A request without `op` is a `get`.
    pub fn take_from(request: &mut CredentialMap) -> Self {
        match request.remove(Self::KEY) {
            Some(name) => Self::parse(&name),
            None => Operation::Get,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Get => write!(f, "get"),
            Operation::Store => write!(f, "store"),
            Operation::Erase => write!(f, "erase"),
            Operation::Unknown(name) => write!(f, "{}", name),
        }
    }
}

/// Best-effort identity of the process on the other end of a connection.
///
/// Only ever shown to the operator. It must not be used to decide whether a
/// request is trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerInfo {
    /// Process ID, if the platform reported one.
    pub pid: Option<u32>,
    /// Process name, if the PID could be resolved.
    pub name: Option<String>,
}

impl PeerInfo {
    /// A peer whose PID could not be determined.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// A peer with a known PID and optionally a resolved name.
    pub fn new(pid: u32, name: Option<String>) -> Self {
        Self {
            pid: Some(pid),
            name,
        }
    }
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pid {
            Some(pid) => write!(
                f,
                "{} (pid {})",
                self.name.as_deref().unwrap_or("?"),
                pid
            ),
            None => write!(f, "?"),
        }
    }
}

/// What a `get` request is asking for, in the form shown to the operator.
///
/// Displays as `protocol://[username@]host/path` with trailing slashes
/// trimmed. A missing protocol or host shows as `?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialTarget {
    pub protocol: String,
    pub host: String,
    pub path: String,
    pub username: String,
}

impl CredentialTarget {
    /// Extract the target fields from a request.
    pub fn from_request(request: &CredentialMap) -> Self {
        Self {
            protocol: request.get("protocol").unwrap_or("?").to_string(),
            host: request.get("host").unwrap_or("?").to_string(),
            path: request.get("path").unwrap_or_default().to_string(),
            username: request.get("username").unwrap_or_default().to_string(),
        }
    }
}

impl fmt::Display for CredentialTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.protocol)?;
        if !self.username.is_empty() {
            write!(f, "{}@", self.username)?;
        }
        let location = format!("{}/{}", self.host, self.path);
        write!(f, "{}", location.trim_end_matches('/'))
    }
}

/// Everything the trust gate needs to ask the operator about a request.
#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    pub target: CredentialTarget,
    pub peer: PeerInfo,
}

impl ConfirmRequest {
    pub fn new(target: CredentialTarget, peer: PeerInfo) -> Self {
        Self { target, peer }
    }
}
