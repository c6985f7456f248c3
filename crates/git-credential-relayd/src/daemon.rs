//! Main relay orchestration.
//!
//! This module provides the `Relay` struct that coordinates:
//! - Socket listening for forwarded connections
//! - Peer identification
//! - Operator approval of `get` requests
//! - Delegation to the credential backend
//!
//! Connections are served strictly one at a time. Each one carries exactly
//! one request block and gets exactly one response block before it is closed.

use std::panic::AssertUnwindSafe;
use std::path::Path;

use anyhow::Context;
use futures::FutureExt;
use git_credential_relay_core::protocol::{read_block, write_block};
use git_credential_relay_core::{
    ConfirmRequest, CredentialDelegate, CredentialMap, CredentialTarget, ErrorReply, Operation,
    PeerInfo, SocketProvider, TrustGate,
};
use tokio::io::{AsyncBufRead, BufReader};
use tokio::net::unix::OwnedReadHalf;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::peer;

/// Identifies the process behind a connection.
pub type PeerResolver = fn(&UnixStream) -> PeerInfo;

/// The relay server.
pub struct Relay<G: TrustGate, D: CredentialDelegate, S: SocketProvider> {
    /// Asks the operator about `get` requests.
    gate: G,
    /// The credential backend.
    delegate: D,
    /// The socket provider.
    socket_provider: S,
    /// Peer lookup, run inside the per-connection error boundary.
    resolve_peer: PeerResolver,
}

impl<G: TrustGate, D: CredentialDelegate, S: SocketProvider> Relay<G, D, S> {
    /// Create a new relay.
    pub fn new(gate: G, delegate: D, socket_provider: S) -> Self {
        Self {
            gate,
            delegate,
            socket_provider,
            resolve_peer: peer::resolve,
        }
    }

    /// Replace how connecting peers are identified.
    pub fn with_peer_resolver(mut self, resolve_peer: PeerResolver) -> Self {
        self.resolve_peer = resolve_peer;
        self
    }

    /// Path of the relay socket, if the provider has one.
    pub fn socket_path(&self) -> Option<&Path> {
        self.socket_provider.socket_path()
    }

    /// Open the relay socket.
    ///
    /// This is the only fallible step of running the relay; hand the
    /// listener to [`Relay::accept_loop`] to serve it.
    pub async fn listen(&self) -> anyhow::Result<UnixListener> {
        let listener = self
            .socket_provider
            .listen()
            .await
            .context("Failed to open relay socket")?;
        info!(
            path = ?self.socket_provider.socket_path(),
            "Relay listening for connections"
        );
        Ok(listener)
    }

    /// Accept and serve connections on `listener`, one at a time, forever.
    pub async fn accept_loop(&self, listener: UnixListener) {
        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("Accepted connection");
                    self.handle_connection(stream).await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// Serve a single connection: one request in, one response out.
    async fn handle_connection(&self, stream: UnixStream) {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut peer = PeerInfo::unknown();

        let outcome = AssertUnwindSafe(self.serve(&mut reader, &mut peer))
            .catch_unwind()
            .await;

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!(peer = %peer, error = ?e, "Request failed");
                ErrorReply::Internal.to_response()
            }
            Err(_) => {
                error!(peer = %peer, "Request handler panicked");
                ErrorReply::Internal.to_response()
            }
        };

        if let Err(e) = write_block(&mut writer, &response).await {
            warn!(peer = %peer, error = %e, "Failed to send response");
        }
    }

    /// Identify the peer, then read its request block and handle it.
    ///
    /// `peer` is filled in as soon as it is known so failures can be logged
    /// against it.
    async fn serve(
        &self,
        reader: &mut BufReader<OwnedReadHalf>,
        peer: &mut PeerInfo,
    ) -> anyhow::Result<CredentialMap> {
        *peer = (self.resolve_peer)(reader.get_ref().as_ref());
        self.read_and_handle(reader, peer).await
    }

    /// Read the request block and handle it.
    async fn read_and_handle<R>(
        &self,
        reader: &mut R,
        peer: &PeerInfo,
    ) -> anyhow::Result<CredentialMap>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let mut request = read_block(reader).await.context("Failed to read request")?;
        let op = Operation::take_from(&mut request);
        debug!(peer = %peer, op = %op, "Received request");
        self.handle_request(op, request, peer).await
    }

    /// Dispatch a request (with `op` already removed) to its handler.
    pub async fn handle_request(
        &self,
        op: Operation,
        request: CredentialMap,
        peer: &PeerInfo,
    ) -> anyhow::Result<CredentialMap> {
        match op {
            Operation::Erase => {
                info!(peer = %peer, "Rejected erase request");
                Ok(ErrorReply::EraseDisabled.to_response())
            }
            Operation::Get => self.handle_get(request, peer).await,
            Operation::Store => self.handle_store(request, peer).await,
            Operation::Unknown(name) => {
                warn!(peer = %peer, op = %name, "Unknown operation");
                Ok(ErrorReply::UnknownOp(name).to_response())
            }
        }
    }

    /// Handle a `get` request.
    ///
    /// The credential backend is only consulted after the operator approves;
    /// its answer is passed back unchanged.
    async fn handle_get(
        &self,
        request: CredentialMap,
        peer: &PeerInfo,
    ) -> anyhow::Result<CredentialMap> {
        let target = CredentialTarget::from_request(&request);
        info!(peer = %peer, target = %target, "Credential requested");

        let approved = self
            .gate
            .confirm(ConfirmRequest::new(target.clone(), peer.clone()))
            .await
            .context("Failed to ask for approval")?;

        if !approved {
            info!(peer = %peer, target = %target, "Request denied");
            return Ok(ErrorReply::UserDenied.to_response());
        }

        let response = self
            .delegate
            .fill(request)
            .await
            .context("Credential fill failed")?;
        info!(peer = %peer, target = %target, "Request approved");
        Ok(response)
    }

    /// Handle a `store` request. Stores are not gated.
    async fn handle_store(
        &self,
        request: CredentialMap,
        peer: &PeerInfo,
    ) -> anyhow::Result<CredentialMap> {
        let target = CredentialTarget::from_request(&request);
        self.delegate
            .approve(request)
            .await
            .context("Credential approve failed")?;
        info!(peer = %peer, target = %target, "Stored credential");
        Ok(CredentialMap::new())
    }
}
