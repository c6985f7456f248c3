//! Wire protocol for relay requests and responses.
//!
//! Both directions use the same block format that `git credential` speaks:
//! one `key=value` pair per line, terminated by a blank line.
//!
//! ```text
//! protocol=https
//! host=example.com
//! username=alice
//!
//! ```
//!
//! Decoding is deliberately forgiving. Invalid UTF-8 is replaced, a line
//! without `=` becomes a key with an empty value, and end-of-stream ends the
//! block just like a blank line does.

use std::fmt;
use std::io::BufRead;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use zeroize::Zeroize;

/// An ordered `key=value` map, used for both requests and responses.
///
/// Keys are unique; inserting an existing key replaces its value in place so
/// the original position is kept for re-serialization. Values are wiped from
/// memory when the map is dropped.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialMap {
    entries: Vec<(String, String)>,
}

impl CredentialMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair, returning the previous value for the key if there was one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Look up the value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Remove a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        let (mut k, v) = self.entries.remove(index);
        k.zeroize();
        Some(v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl Zeroize for CredentialMap {
    fn zeroize(&mut self) {
        for (key, value) in self.entries.iter_mut() {
            key.zeroize();
            value.zeroize();
        }
        self.entries.clear();
    }
}

impl Drop for CredentialMap {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CredentialMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

// Values may be passwords, so only keys are shown.
impl fmt::Debug for CredentialMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, _)| (k, "[REDACTED]")))
            .finish()
    }
}

/// The fixed set of error replies the relay sends back to a peer.
///
/// Each reply is encoded as a block with a single `error` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorReply {
    /// The operator declined the request.
    UserDenied,

    /// The peer asked to erase a credential.
    EraseDisabled,

    /// The `op` key named something the relay does not understand.
    UnknownOp(String),

    /// Something failed while handling the request. The cause is only logged.
    Internal,
}

impl fmt::Display for ErrorReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorReply::UserDenied => write!(f, "user denied"),
            ErrorReply::EraseDisabled => write!(f, "erase disabled"),
            ErrorReply::UnknownOp(op) => write!(f, "unknown op: {}", op),
            ErrorReply::Internal => write!(f, "internal server error"),
        }
    }
}

impl ErrorReply {
    /// Key used for error messages in a response block.
    pub const KEY: &'static str = "error";

    /// Build the response block for this error.
    pub fn to_response(&self) -> CredentialMap {
        let mut response = CredentialMap::new();
        response.insert(Self::KEY, self.to_string());
        response
    }
}

/// Errors that can occur while reading or writing a block.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Failed to read/write to the stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Split a line at the first `=`.
///
/// A line without `=` is all key and no value.
pub fn parse_line(line: &str) -> (&str, &str) {
    line.split_once('=').unwrap_or((line, ""))
}

/// Encode a map as a blank-line terminated block.
pub fn encode_block(map: &CredentialMap) -> String {
    let mut out = String::new();
    for (key, value) in map.iter() {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Turn one raw line into a map entry. Returns `false` at the terminating blank line.
fn push_raw_line(map: &mut CredentialMap, raw: &mut Vec<u8>) -> bool {
    if raw.last() == Some(&b'\n') {
        raw.pop();
    }
    let mut line = String::from_utf8_lossy(raw).into_owned();
    raw.zeroize();
    if line.is_empty() {
        return false;
    }
    let (key, value) = parse_line(&line);
    map.insert(key, value);
    line.zeroize();
    true
}

/// Read one block from an async stream.
///
/// Stops at the first blank line or at end-of-stream. A stream that closes
/// before sending anything yields an empty map.
pub async fn read_block<R>(reader: &mut R) -> Result<CredentialMap, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut map = CredentialMap::new();
    let mut raw = Vec::new();
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw).await? == 0 {
            break;
        }
        if !push_raw_line(&mut map, &mut raw) {
            break;
        }
    }
    Ok(map)
}

/// Read one block from a blocking reader. Same rules as [`read_block`].
pub fn read_block_blocking<R: BufRead>(reader: &mut R) -> Result<CredentialMap, ProtocolError> {
    let mut map = CredentialMap::new();
    let mut raw = Vec::new();
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        if !push_raw_line(&mut map, &mut raw) {
            break;
        }
    }
    Ok(map)
}

/// Write one block, flush it, and shut down the write side of the stream.
///
/// After this the peer sees end-of-stream, so a response can't be followed
/// by anything else on the same connection.
pub async fn write_block<W>(writer: &mut W, map: &CredentialMap) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let mut block = encode_block(map);
    let result = writer.write_all(block.as_bytes()).await;
    block.zeroize();
    result?;
    writer.flush().await?;
    writer.shutdown().await?;
    Ok(())
}

/// Parse the stdout of a credential command.
///
/// Unlike [`read_block`] this reads the whole output: blank lines are skipped
/// rather than ending the parse, as are lines with an empty key. `\n`, `\r\n`
/// and a bare `\r` all end a line.
pub fn parse_output(output: &[u8]) -> CredentialMap {
    let text = String::from_utf8_lossy(output);
    let mut map = CredentialMap::new();
    for line in text.split(['\n', '\r']).filter(|line| !line.is_empty()) {
        let (key, value) = parse_line(line);
        if !key.is_empty() {
            map.insert(key, value);
        }
    }
    map
}
