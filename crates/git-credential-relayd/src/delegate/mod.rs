//! Credential delegate implementations.
//!
//! - [`GitCredentialDelegate`]: Runs `git credential fill|approve` (production)
//! - [`MockCredentialDelegate`]: In-process double for testing
//!
//! Both implement the [`CredentialDelegate`] trait from `git-credential-relay-core`.
//!
//! [`CredentialDelegate`]: git_credential_relay_core::CredentialDelegate

mod git;
mod mock;

pub use git::GitCredentialDelegate;
pub use mock::{DelegateCall, MockCredentialDelegate};
