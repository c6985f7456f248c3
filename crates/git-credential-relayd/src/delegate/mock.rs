//! Mock credential delegate for testing.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use git_credential_relay_core::{CredentialDelegate, CredentialMap, DelegateError};

/// Which delegate operation was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegateCall {
    Fill,
    Approve,
}

#[derive(Clone, Copy)]
enum Failure {
    Error,
    Panic,
}

/// An in-process credential delegate.
///
/// `fill` returns a preset map; every call is recorded together with the
/// request it received. Clones share the same call log.
///
/// # Example
///
/// ```
/// use git_credential_relayd::delegate::MockCredentialDelegate;
///
/// let mock = MockCredentialDelegate::with_fill([("username", "alice"), ("password", "secret")]);
/// assert!(mock.calls().is_empty());
/// ```
#[derive(Clone)]
pub struct MockCredentialDelegate {
    /// What `fill` returns.
    fill_response: CredentialMap,
    /// Fail instead of answering.
    failure: Option<Failure>,
    /// Calls seen so far.
    calls: Arc<Mutex<Vec<(DelegateCall, CredentialMap)>>>,
}

impl MockCredentialDelegate {
    /// Create a mock whose `fill` returns the given pairs.
    pub fn with_fill<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fill_response: pairs.into_iter().collect(),
            failure: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock whose `fill` returns nothing.
    pub fn empty() -> Self {
        Self::with_fill(Vec::<(String, String)>::new())
    }

    /// Create a mock whose operations fail as if the command could not start.
    pub fn failing() -> Self {
        Self {
            failure: Some(Failure::Error),
            ..Self::empty()
        }
    }

    /// Create a mock whose operations panic.
    pub fn panicking() -> Self {
        Self {
            failure: Some(Failure::Panic),
            ..Self::empty()
        }
    }

    /// Get the calls seen so far.
    pub fn calls(&self) -> Vec<(DelegateCall, CredentialMap)> {
        self.calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: DelegateCall, request: CredentialMap) -> Result<(), DelegateError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((call, request));
        }
        match self.failure {
            Some(Failure::Error) => Err(DelegateError::Spawn {
                program: "mock".to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "mock failure"),
            }),
            Some(Failure::Panic) => panic!("mock credential delegate panicked"),
            None => Ok(()),
        }
    }
}

impl Default for MockCredentialDelegate {
    fn default() -> Self {
        Self::empty()
    }
}

impl CredentialDelegate for MockCredentialDelegate {
    fn fill(
        &self,
        request: CredentialMap,
    ) -> Pin<Box<dyn Future<Output = Result<CredentialMap, DelegateError>> + Send + '_>> {
        Box::pin(async move {
            self.record(DelegateCall::Fill, request)?;
            Ok(self.fill_response.clone())
        })
    }

    fn approve(
        &self,
        request: CredentialMap,
    ) -> Pin<Box<dyn Future<Output = Result<(), DelegateError>> + Send + '_>> {
        Box::pin(async move { self.record(DelegateCall::Approve, request) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fill_returns_preset_and_records() {
        let mock = MockCredentialDelegate::with_fill([("password", "secret")]);
        let request: CredentialMap = [("host", "example.com")].into_iter().collect();

        let response = mock.fill(request.clone()).await.unwrap();
        assert_eq!(response.get("password"), Some("secret"));

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, DelegateCall::Fill);
        assert_eq!(calls[0].1, request);
    }

    #[tokio::test]
    async fn approve_records() {
        let mock = MockCredentialDelegate::empty();
        let handle = mock.clone();

        mock.approve(CredentialMap::new()).await.unwrap();
        assert_eq!(handle.calls()[0].0, DelegateCall::Approve);
    }

    #[tokio::test]
    async fn failing_mock_errors() {
        let mock = MockCredentialDelegate::failing();
        assert!(mock.fill(CredentialMap::new()).await.is_err());
        assert!(mock.approve(CredentialMap::new()).await.is_err());
        assert_eq!(mock.calls().len(), 2);
    }
}
