//! git-credential-relay - Git credential helper for the remote side.
//!
//! Forwards git's credential requests over a Unix socket to a
//! `git-credential-relayd` running on another machine, where the operator
//! approves them.
//!
//! # Usage
//!
//! ```bash
//! # Tell git to use this helper
//! git config --global credential.helper relay
//!
//! # Or point it at a different forwarded socket
//! export GIT_CREDENTIAL_RELAY_SOCKET=/tmp/my-relay.sock
//! ```
//!
//! Git passes the action (`get`, `store` or `erase`) as the first argument
//! and the credential description on stdin. For `get`, the credential is
//! printed to stdout.

use std::io::{self, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use git_credential_relay_core::config::REMOTE_SOCKET_PATH;
use git_credential_relay_core::protocol::{encode_block, read_block_blocking};
use git_credential_relay_core::{CredentialMap, ErrorReply, Operation};
use zeroize::Zeroize;

/// Git credential helper that asks a remote git-credential-relayd.
#[derive(Parser)]
#[command(name = "git-credential-relay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the forwarded relay socket
    #[arg(
        short,
        long,
        value_name = "PATH",
        env = "GIT_CREDENTIAL_RELAY_SOCKET",
        default_value = REMOTE_SOCKET_PATH
    )]
    socket: PathBuf,

    /// Credential action requested by git (get, store, erase)
    action: String,
}

/// Whether this helper handles `action`. Git expects helpers to ignore the rest.
fn is_supported_action(action: &str) -> bool {
    !matches!(Operation::parse(action), Operation::Unknown(_))
}

/// Build the relay request: `op` first, then git's fields.
fn build_request(action: &str, input: &CredentialMap) -> CredentialMap {
    let mut request = CredentialMap::new();
    request.insert(Operation::KEY, action);
    for (key, value) in input.iter().filter(|(key, _)| *key != Operation::KEY) {
        request.insert(key, value);
    }
    request
}

/// Send a request to the relay and receive its response.
fn send_request(socket_path: &Path, request: &CredentialMap) -> Result<CredentialMap> {
    let mut stream = UnixStream::connect(socket_path)
        .with_context(|| format!("Failed to connect to relay at {:?}", socket_path))?;

    let mut block = encode_block(request);
    let sent = stream.write_all(block.as_bytes());
    block.zeroize();
    sent.context("Failed to send request")?;
    stream.flush().context("Failed to flush request")?;

    let mut reader = BufReader::new(stream);
    read_block_blocking(&mut reader).context("Failed to read response")
}

fn run(cli: &Cli) -> Result<ExitCode> {
    if !is_supported_action(&cli.action) {
        return Ok(ExitCode::SUCCESS);
    }

    let input = read_block_blocking(&mut io::stdin().lock()).context("Failed to read stdin")?;
    let request = build_request(&cli.action, &input);
    let response = send_request(&cli.socket, &request)?;

    if let Some(message) = response.get(ErrorReply::KEY) {
        eprintln!("git-credential-relay: {}", message);
        return Ok(ExitCode::FAILURE);
    }

    if !response.is_empty() {
        // Git reads key=value lines; the blank terminator is harmless
        let mut block = encode_block(&response);
        let mut stdout = io::stdout().lock();
        let written = stdout.write_all(block.as_bytes()).and_then(|_| stdout.flush());
        block.zeroize();
        written.context("Failed to write credential")?;
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("git-credential-relay: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::BufReader;
    use std::os::unix::net::UnixListener;
    use std::thread;

    fn map(pairs: &[(&str, &str)]) -> CredentialMap {
        pairs.iter().copied().collect()
    }

    /// Serve one connection with a canned response; return what was received.
    fn fake_relay(
        path: &Path,
        response: CredentialMap,
    ) -> thread::JoinHandle<CredentialMap> {
        let listener = UnixListener::bind(path).unwrap();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let request = read_block_blocking(&mut reader).unwrap();
            let mut writer = stream;
            writer.write_all(encode_block(&response).as_bytes()).unwrap();
            request
        })
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_uses_default_socket() {
        std::env::remove_var("GIT_CREDENTIAL_RELAY_SOCKET");
        let cli = Cli::parse_from(["git-credential-relay", "get"]);
        assert_eq!(cli.socket, PathBuf::from(REMOTE_SOCKET_PATH));
        assert_eq!(cli.action, "get");
    }

    #[test]
    fn supported_actions() {
        assert!(is_supported_action("get"));
        assert!(is_supported_action("store"));
        assert!(is_supported_action("erase"));
        assert!(!is_supported_action("capability"));
        assert!(!is_supported_action("GET"));
    }

    #[test]
    fn build_request_puts_op_first() {
        let input = map(&[("protocol", "https"), ("op", "store"), ("host", "example.com")]);
        let request = build_request("get", &input);

        assert_eq!(
            encode_block(&request),
            "op=get\nprotocol=https\nhost=example.com\n\n"
        );
    }

    #[test]
    fn send_request_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.sock");
        let server = fake_relay(
            &path,
            map(&[("username", "alice"), ("password", "secret")]),
        );

        let request = map(&[("op", "get"), ("host", "example.com")]);
        let response = send_request(&path, &request).unwrap();

        assert_eq!(response, map(&[("username", "alice"), ("password", "secret")]));
        assert_eq!(server.join().unwrap(), request);
    }

    #[test]
    fn send_request_returns_error_reply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.sock");
        let server = fake_relay(&path, ErrorReply::UserDenied.to_response());

        let response = send_request(&path, &map(&[("op", "get")])).unwrap();
        assert_eq!(response.get(ErrorReply::KEY), Some("user denied"));
        server.join().unwrap();
    }

    #[test]
    fn send_request_without_relay_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = send_request(&dir.path().join("absent.sock"), &CredentialMap::new());
        assert!(result.is_err());
    }
}
