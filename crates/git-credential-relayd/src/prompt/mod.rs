//! Trust gate implementations.
//!
//! - [`TerminalTrustGate`]: Asks the operator on the terminal (production)
//! - [`MockTrustGate`]: Scripted answers for testing
//!
//! Both implement the [`TrustGate`] trait from `git-credential-relay-core`.
//!
//! [`TrustGate`]: git_credential_relay_core::TrustGate

mod mock;
mod terminal;

pub use mock::MockTrustGate;
pub use terminal::{ask, is_affirmative, TerminalTrustGate};
