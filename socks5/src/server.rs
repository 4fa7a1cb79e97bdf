use std::fmt::{self, Display, Formatter};
use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::net::{TcpListener, ToSocketAddrs};

use crate::config::Timeouts;
use crate::error::Result;
use crate::session::ConnectionSession;

/// Emitted once per successful upstream dial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectEvent {
    source: String,
    target: String,
}

impl ConnectEvent {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Remote address of the SOCKS client.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// `host:port` the client asked for.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Display for ConnectEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] connect to {}", self.source, self.target)
    }
}

/// Receives connect notifications. Called inline on the session task, so
/// implementations must return promptly.
pub trait ConnectObserver: Send + Sync {
    fn on_connect(&self, event: &ConnectEvent);
}

impl<F> ConnectObserver for F
where
    F: Fn(&ConnectEvent) + Send + Sync,
{
    fn on_connect(&self, event: &ConnectEvent) {
        self(event)
    }
}

#[derive(Clone, Default)]
pub struct ServerConfig {
    pub observer: Option<Arc<dyn ConnectObserver>>,
    pub timeouts: Timeouts,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: ConnectObserver + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("observer", &self.observer.is_some())
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

/// Accept loop: one task per client connection.
pub struct Server {
    listener: TcpListener,
    config: Arc<ServerConfig>,
}

impl Server {
    pub async fn bind(addr: impl ToSocketAddrs, config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::from_listener(listener, config))
    }

    pub fn from_listener(listener: TcpListener, config: ServerConfig) -> Self {
        Self {
            listener,
            config: Arc::new(config),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs until the process exits. Accept errors are logged and skipped.
    pub async fn serve(self) {
        if let Ok(addr) = self.listener.local_addr() {
            info!("SOCKS5 server listening on {}", addr);
        }

        loop {
            match self.listener.accept().await {
                Ok((socket, addr)) => {
                    info!("new connection from {}", addr);
                    let session =
                        ConnectionSession::new(socket, addr.to_string(), self.config.clone());

                    tokio::spawn(async move {
                        let id = session.id();
                        if let Err(e) = session.run().await {
                            error!("session {} from {} failed: {}", id, addr, e);
                        }
                    });
                }
                Err(e) => {
                    warn!("accept failed: {}", e);
                }
            }
        }
    }
}
