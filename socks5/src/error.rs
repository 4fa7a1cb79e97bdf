use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::Reply;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while speaking SOCKS5 on either side of the proxy.
///
/// Every variant aborts only the connection it happened on; nothing is retried.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad version byte or malformed header.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The peer closed (or failed) before a fixed or length-prefixed field was complete.
    #[error("truncated read of {field}: {source}")]
    TruncatedRead {
        field: &'static str,
        source: io::Error,
    },

    #[error("unsupported method {0:#04x}, only no authentication is supported")]
    UnsupportedMethod(u8),

    #[error("unsupported command {0:#04x}")]
    UnsupportedCommand(u8),

    #[error("unsupported address type {0:#04x}")]
    UnsupportedAddressType(u8),

    /// The upstream target could not be reached.
    #[error("dial {target}: {source}")]
    Dial { target: String, source: io::Error },

    #[error("writing {context}: {source}")]
    Write {
        context: &'static str,
        source: io::Error,
    },

    /// The server answered CONNECT with a non-zero REP.
    #[error("connect rejected: {}", Reply::describe(*code))]
    ConnectRejected { code: u8 },

    #[error("{stage} timed out after {after:?}")]
    Timeout {
        stage: &'static str,
        after: Duration,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub(crate) fn truncated(field: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Error::TruncatedRead { field, source }
    }

    pub(crate) fn write(context: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Error::Write { context, source }
    }

    /// Whether the peer went away mid-exchange rather than sending something invalid.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Error::TruncatedRead { .. })
    }
}
