//! Mock trust gate for testing.
//!
//! Stands in for the operator so the relay can be exercised without a
//! terminal.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use git_credential_relay_core::{ConfirmRequest, PromptError, TrustGate};

/// A scripted trust gate.
///
/// Returns a fixed answer (or error), counts calls, and records every
/// request it was asked about. Clones share the same counters.
///
/// # Example
///
/// ```
/// use git_credential_relayd::prompt::MockTrustGate;
///
/// let approve = MockTrustGate::approving();
/// let deny = MockTrustGate::denying();
/// assert_eq!(approve.call_count(), 0);
/// ```
#[derive(Clone)]
pub struct MockTrustGate {
    /// The answer to give.
    answer: bool,
    /// Error message to fail with instead of answering.
    error: Option<String>,
    /// Number of times confirm was called.
    call_count: Arc<AtomicUsize>,
    /// Requests seen so far.
    requests: Arc<Mutex<Vec<ConfirmRequest>>>,
}

impl MockTrustGate {
    fn with_answer(answer: bool) -> Self {
        Self {
            answer,
            error: None,
            call_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that approves every request.
    pub fn approving() -> Self {
        Self::with_answer(true)
    }

    /// Create a mock that denies every request.
    pub fn denying() -> Self {
        Self::with_answer(false)
    }

    /// Create a mock whose prompt fails.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::with_answer(false)
        }
    }

    /// Get the number of times confirm was called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get the requests seen so far.
    pub fn requests(&self) -> Vec<ConfirmRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Default for MockTrustGate {
    fn default() -> Self {
        Self::denying()
    }
}

impl TrustGate for MockTrustGate {
    fn confirm(
        &self,
        request: ConfirmRequest,
    ) -> Pin<Box<dyn Future<Output = Result<bool, PromptError>> + Send + '_>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let answer = self.answer;
        let error = self.error.clone();

        Box::pin(async move {
            match error {
                Some(message) => Err(PromptError::UiError(message)),
                None => Ok(answer),
            }
        })
    }
}
