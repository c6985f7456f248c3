//! Credential delegate backed by `git credential`.
//!
//! Runs `<program> <args...> <action>` with the request block on stdin. With
//! the default configuration that is `git credential fill` and
//! `git credential approve`, so whatever credential helpers the operator has
//! configured locally do the actual storage.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use git_credential_relay_core::config::DelegateConfig;
use git_credential_relay_core::protocol::{encode_block, parse_output};
use git_credential_relay_core::{CredentialDelegate, CredentialMap, DelegateError};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;
use zeroize::Zeroize;

/// Delegate that shells out to a `git credential`-compatible command.
pub struct GitCredentialDelegate {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl GitCredentialDelegate {
    /// Create a delegate running `program args... <action>`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: None,
        }
    }

    /// Create a delegate from the `[delegate]` config section.
    pub fn from_config(config: &DelegateConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone()).with_timeout(config.timeout())
    }

    /// Kill the command if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the command for `action`, feeding it `input`.
    ///
    /// Returns stdout when `capture` is set, otherwise an empty buffer. The
    /// exit status is only logged.
    async fn run(
        &self,
        action: &str,
        input: &CredentialMap,
        capture: bool,
    ) -> Result<Vec<u8>, DelegateError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(action)
            .stdin(Stdio::piped())
            .stdout(if capture {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DelegateError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let mut block = encode_block(input).into_bytes();
            let written = stdin.write_all(&block).await;
            block.zeroize();
            match written {
                Ok(()) => {}
                // The command may exit without reading its input
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!(action, "Credential command closed stdin early");
                }
                Err(e) => return Err(DelegateError::Io(e)),
            }
            // Dropping stdin closes it so the command sees end of input
        }

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| DelegateError::Timeout(limit.as_secs()))??,
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            debug!(action, status = %output.status, "Credential command exited unsuccessfully");
        }
        Ok(output.stdout)
    }
}

impl Default for GitCredentialDelegate {
    fn default() -> Self {
        Self::from_config(&DelegateConfig::default())
    }
}

impl CredentialDelegate for GitCredentialDelegate {
    fn fill(
        &self,
        request: CredentialMap,
    ) -> Pin<Box<dyn Future<Output = Result<CredentialMap, DelegateError>> + Send + '_>> {
        Box::pin(async move {
            let mut stdout = self.run("fill", &request, true).await?;
            let response = parse_output(&stdout);
            stdout.zeroize();
            debug!(keys = response.len(), "Credential fill finished");
            Ok(response)
        })
    }

    fn approve(
        &self,
        request: CredentialMap,
    ) -> Pin<Box<dyn Future<Output = Result<(), DelegateError>> + Send + '_>> {
        Box::pin(async move {
            self.run("approve", &request, false).await?;
            debug!("Credential approve finished");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> GitCredentialDelegate {
        // `sh -c <script> sh <action>` puts the action in $1
        GitCredentialDelegate::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "sh".to_string()],
        )
    }

    fn request() -> CredentialMap {
        [("protocol", "https"), ("host", "example.com")]
            .into_iter()
            .collect()
    }

    #[tokio::test]
    async fn fill_parses_command_output() {
        let delegate = sh("cat >/dev/null; printf 'username=alice\\npassword=secret\\n'");
        let response = delegate.fill(request()).await.unwrap();

        let expected: CredentialMap = [("username", "alice"), ("password", "secret")]
            .into_iter()
            .collect();
        assert_eq!(response, expected);
    }

    #[tokio::test]
    async fn fill_passes_action_and_request() {
        // Echo back the action and the request block
        let delegate = sh("echo \"action=$1\"; cat");
        let response = delegate.fill(request()).await.unwrap();

        assert_eq!(response.get("action"), Some("fill"));
        assert_eq!(response.get("protocol"), Some("https"));
        assert_eq!(response.get("host"), Some("example.com"));
    }

    #[tokio::test]
    async fn fill_ignores_exit_status() {
        let delegate = sh("cat >/dev/null; echo password=partial; exit 1");
        let response = delegate.fill(request()).await.unwrap();
        assert_eq!(response.get("password"), Some("partial"));
    }

    #[tokio::test]
    async fn fill_with_no_output_is_empty() {
        let delegate = sh("cat >/dev/null; exit 128");
        let response = delegate.fill(request()).await.unwrap();
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn fill_tolerates_command_not_reading_stdin() {
        let delegate = sh("echo username=bob");
        let response = delegate.fill(request()).await.unwrap();
        assert_eq!(response.get("username"), Some("bob"));
    }

    #[tokio::test]
    async fn approve_receives_request() {
        let dir = crate::socket::tempdir();
        let out = dir.path().join("stored");
        let script = format!("echo \"$1\" > '{0}'; cat >> '{0}'; exit 3", out.display());

        let delegate = sh(&script);
        delegate.approve(request()).await.unwrap();

        let stored = std::fs::read_to_string(&out).unwrap();
        assert_eq!(stored, "approve\nprotocol=https\nhost=example.com\n\n");
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let delegate = GitCredentialDelegate::new("/nonexistent/credential-command", vec![]);
        let result = delegate.fill(request()).await;
        assert!(matches!(result, Err(DelegateError::Spawn { .. })));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let delegate = sh("sleep 5").with_timeout(Some(Duration::from_millis(100)));
        let result = delegate.fill(request()).await;
        assert!(matches!(result, Err(DelegateError::Timeout(_))));
    }

    #[test]
    fn from_config_uses_program_and_args() {
        let config = DelegateConfig {
            program: "pass-helper".to_string(),
            args: vec!["--store".to_string()],
            timeout: Some(9),
        };
        let delegate = GitCredentialDelegate::from_config(&config);
        assert_eq!(delegate.program, "pass-helper");
        assert_eq!(delegate.args, vec!["--store".to_string()]);
        assert_eq!(delegate.timeout, Some(Duration::from_secs(9)));
    }
}
