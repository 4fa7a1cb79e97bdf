use bytes::{Bytes, BytesMut};
use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::{ClientSettings, Timeouts, with_deadline};
use crate::error::{Error, Result};
use crate::{connect, handshake};

const RESPONSE_CAPACITY: usize = 512;

/// A client session against one SOCKS5 server.
///
/// The transport is dialed on the first `connect` and reused by later calls
/// on the same session. It is released by `close`, or when the session is
/// dropped.
#[derive(Debug)]
pub struct Client {
    server_addr: String,
    timeouts: Timeouts,
    conn: Option<TcpStream>,
}

impl Client {
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            timeouts: Timeouts::default(),
            conn: None,
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self::new(settings.server_addr()).with_timeouts(settings.timeouts())
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Tunnels `payload` to `host:port` and returns everything the target
    /// sends back until it closes the connection.
    ///
    /// If reading the response fails before the target closes, the error is
    /// returned and the bytes received so far are discarded.
    pub async fn connect(&mut self, host: &str, port: u16, payload: &[u8]) -> Result<Bytes> {
        let timeouts = self.timeouts;
        let conn = self.transport().await?;

        // 1. method negotiation
        with_deadline(timeouts.handshake, "method negotiation", handshake::negotiate(conn)).await?;

        // 2. CONNECT
        with_deadline(timeouts.handshake, "connect", connect::request(conn, host, port)).await?;
        debug!("tunnel to {}:{} established", host, port);

        // 3. payload, then read until the target closes
        conn.write_all(payload)
            .await
            .map_err(Error::write("payload"))?;

        let mut response = BytesMut::with_capacity(RESPONSE_CAPACITY);
        loop {
            match conn.read_buf(&mut response).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("response read failed after {} bytes: {}", response.len(), e);
                    return Err(e.into());
                }
            }
        }

        Ok(response.freeze())
    }

    /// Shuts the transport down, if one was opened.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut conn) = self.conn.take() {
            conn.shutdown().await?;
        }
        Ok(())
    }

    async fn transport(&mut self) -> Result<&mut TcpStream> {
        if self.conn.is_none() {
            let addr = self.server_addr.clone();
            let conn = with_deadline(self.timeouts.dial, "dial", async {
                Ok::<_, Error>(TcpStream::connect(&addr).await?)
            })
            .await?;
            debug!("connected to SOCKS5 server {}", addr);
            self.conn = Some(conn);
        }

        self.conn
            .as_mut()
            .ok_or_else(|| Error::protocol("transport missing after dial"))
    }
}
