use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use log::debug;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::config::with_deadline;
use crate::error::{Error, Result};
use crate::server::ServerConfig;
use crate::{connect, handshake, relay};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    Authenticating,
    Connecting,
    Relaying,
    Closed,
    Failed,
}

impl SessionState {
    /// Whether the session has reached `Closed` or `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Accepted => "accepted",
            SessionState::Authenticating => "authenticating",
            SessionState::Connecting => "connecting",
            SessionState::Relaying => "relaying",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One accepted client connection, from handshake through relay.
pub struct ConnectionSession<S> {
    id: Uuid,
    stream: S,
    peer: String,
    config: Arc<ServerConfig>,
    state: SessionState,
}

impl<S> ConnectionSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(stream: S, peer: impl Into<String>, config: Arc<ServerConfig>) -> Self {
        Self {
            id: Uuid::new_v4(),
            stream,
            peer: peer.into(),
            config,
            state: SessionState::Accepted,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!("session {} [{}]: {} -> {}", self.id, self.peer, self.state, next);
        self.state = next;
    }

    /// Drives the session to `Closed`, or to `Failed` with the error that
    /// caused it. The client connection is closed either way.
    pub async fn run(self) -> Result<()> {
        let (state, result) = self.drive().await;
        debug_assert!(state.is_terminal());
        result
    }

    /// Like `run`, but also reports the final state.
    pub async fn drive(mut self) -> (SessionState, Result<()>) {
        self.transition(SessionState::Authenticating);
        let limit = self.config.timeouts.handshake;
        let negotiated =
            with_deadline(limit, "method negotiation", handshake::accept(&mut self.stream)).await;
        if let Err(e) = negotiated {
            return self.fail(e).await;
        }

        self.transition(SessionState::Connecting);
        let config = self.config.clone();
        let connected = connect::accept(&mut self.stream, &self.peer, &config).await;
        let upstream = match connected {
            Ok((upstream, _target)) => upstream,
            Err(e) => return self.fail(e).await,
        };

        self.transition(SessionState::Relaying);
        let id = self.id;
        let peer = self.peer.clone();
        relay::run(self.stream, upstream).await;

        debug!("session {} [{}]: {} -> {}", id, peer, SessionState::Relaying, SessionState::Closed);
        (SessionState::Closed, Ok(()))
    }

    async fn fail(mut self, e: Error) -> (SessionState, Result<()>) {
        self.transition(SessionState::Failed);
        let _ = self.stream.shutdown().await;
        (SessionState::Failed, Err(e))
    }
}
