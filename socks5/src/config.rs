use std::future::Future;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 1080;

/// Optional deadlines. `None` means wait forever, which is the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    /// Bounds the TCP connect to the upstream target (server) or the proxy (client).
    pub dial: Option<Duration>,
    /// Bounds method negotiation plus the CONNECT exchange.
    pub handshake: Option<Duration>,
}

impl Timeouts {
    pub fn with_dial(mut self, limit: Duration) -> Self {
        self.dial = Some(limit);
        self
    }

    pub fn with_handshake(mut self, limit: Duration) -> Self {
        self.handshake = Some(limit);
        self
    }

    fn from_millis(dial_ms: Option<u64>, handshake_ms: Option<u64>) -> Self {
        Self {
            dial: dial_ms.map(Duration::from_millis),
            handshake: handshake_ms.map(Duration::from_millis),
        }
    }
}

/// Runs `fut`, failing with `Error::Timeout` if `limit` elapses first.
pub(crate) async fn with_deadline<F, T>(
    limit: Option<Duration>,
    stage: &'static str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| Error::Timeout { stage, after })?,
        None => fut.await,
    }
}

/// Server settings as read from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub dial_timeout_ms: Option<u64>,
    pub handshake_timeout_ms: Option<u64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            dial_timeout_ms: None,
            handshake_timeout_ms: None,
        }
    }
}

impl ServerSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::config(format!("server settings: {}", e)))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&read_settings(path.as_ref())?)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts::from_millis(self.dial_timeout_ms, self.handshake_timeout_ms)
    }
}

/// Client settings as read from a JSON file. `host`/`port` name the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub host: String,
    pub port: u16,
    pub dial_timeout_ms: Option<u64>,
    pub handshake_timeout_ms: Option<u64>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            dial_timeout_ms: None,
            handshake_timeout_ms: None,
        }
    }
}

impl ClientSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::config(format!("client settings: {}", e)))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&read_settings(path.as_ref())?)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts::from_millis(self.dial_timeout_ms, self.handshake_timeout_ms)
    }
}

fn read_settings(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("reading {}: {}", path.display(), e)))
}
