//! Terminal trust gate.
//!
//! Asks the operator on the relay's own terminal, one request at a time.

use std::future::Future;
use std::io::{self, BufRead, Write};
use std::pin::Pin;

use git_credential_relay_core::{ConfirmRequest, PromptError, TrustGate};
use tracing::debug;

/// Trust gate that prints the request to stdout and reads `y`/`n` from stdin.
pub struct TerminalTrustGate;

impl TerminalTrustGate {
    /// Create a new terminal trust gate.
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalTrustGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether an answer counts as approval: `y` or `yes`, any case, surrounding
/// whitespace ignored.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Write the question for `request` to `output` and read one answer line from `input`.
///
/// End of input counts as denial.
pub fn ask<R: BufRead, W: Write>(
    request: &ConfirmRequest,
    input: &mut R,
    output: &mut W,
) -> io::Result<bool> {
    writeln!(output)?;
    writeln!(
        output,
        "[{}] requested Git credentials for: {}",
        request.peer, request.target
    )?;
    write!(output, "Allow? [y/N] ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

impl TrustGate for TerminalTrustGate {
    fn confirm(
        &self,
        request: ConfirmRequest,
    ) -> Pin<Box<dyn Future<Output = Result<bool, PromptError>> + Send + '_>> {
        Box::pin(async move {
            // Stdin reads block, so keep them off the runtime
            let approved = tokio::task::spawn_blocking(move || {
                let stdin = io::stdin();
                let stdout = io::stdout();
                ask(&request, &mut stdin.lock(), &mut stdout.lock())
            })
            .await
            .map_err(|e| PromptError::UiError(format!("Task failed: {}", e)))??;

            debug!(approved, "Operator answered");
            Ok(approved)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_credential_relay_core::{CredentialMap, CredentialTarget, PeerInfo};
    use std::io::Cursor;

    fn alice_request() -> ConfirmRequest {
        let map: CredentialMap = [
            ("protocol", "https"),
            ("host", "example.com"),
            ("path", "repo.git"),
            ("username", "alice"),
        ]
        .into_iter()
        .collect();
        ConfirmRequest::new(
            CredentialTarget::from_request(&map),
            PeerInfo::new(1234, Some("git".into())),
        )
    }

    #[test]
    fn affirmative_answers() {
        for answer in ["y", "Y", "yes", "YES", "Yes", "  y  ", "yes\n", "\ty\r\n"] {
            assert!(is_affirmative(answer), "{:?} should approve", answer);
        }
    }

    #[test]
    fn negative_answers() {
        for answer in ["", "\n", "n", "no", "yeah", "ye", "y es", "sure"] {
            assert!(!is_affirmative(answer), "{:?} should deny", answer);
        }
    }

    #[test]
    fn ask_prints_target_and_peer() {
        let mut input = Cursor::new(b"y\n".to_vec());
        let mut output = Vec::new();

        let approved = ask(&alice_request(), &mut input, &mut output).unwrap();
        assert!(approved);

        let text = String::from_utf8(output).unwrap();
        assert_eq!(
            text,
            "\n[git (pid 1234)] requested Git credentials for: https://alice@example.com/repo.git\nAllow? [y/N] "
        );
    }

    #[test]
    fn ask_denies_on_empty_line() {
        let mut input = Cursor::new(b"\n".to_vec());
        let mut output = Vec::new();
        assert!(!ask(&alice_request(), &mut input, &mut output).unwrap());
    }

    #[test]
    fn ask_denies_on_end_of_input() {
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        assert!(!ask(&alice_request(), &mut input, &mut output).unwrap());
    }

    #[test]
    fn ask_reads_only_one_line() {
        let mut input = Cursor::new(b"no\nyes\n".to_vec());
        let mut output = Vec::new();

        assert!(!ask(&alice_request(), &mut input, &mut output).unwrap());
        assert!(ask(&alice_request(), &mut input, &mut output).unwrap());
    }
}
