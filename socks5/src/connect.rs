//! CONNECT request/reply, both directions.
//!
//! Request: VER | CMD | RSV | ATYP | DST.ADDR | DST.PORT
//! Reply:   VER | REP | RSV | ATYP | BND.ADDR | BND.PORT

use log::{debug, info};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::address::{TargetAddress, decode_address, encode_connect_request, read_field};
use crate::config::with_deadline;
use crate::error::{Error, Result};
use crate::protocol::{AddressType, CONNECT_SUCCESS_REPLY, Command, SOCKS_VERSION};
use crate::server::{ConnectEvent, ServerConfig};

/// Reads a CONNECT request and returns the requested target.
///
/// Any command but CONNECT, an IPv6 target, or a truncated request fails
/// without a reply; the caller closes the connection.
pub async fn read_request<S>(stream: &mut S) -> Result<TargetAddress>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    read_field(stream, &mut header, "request header").await?;

    let (version, cmd, _reserved, atyp) = (header[0], header[1], header[2], header[3]);
    if version != SOCKS_VERSION {
        return Err(Error::protocol(format!("invalid version: {}", version)));
    }

    match Command::from_u8(cmd) {
        Some(Command::Connect) => {}
        Some(other) => {
            debug!("{} is not supported", other);
            return Err(Error::UnsupportedCommand(cmd));
        }
        None => return Err(Error::UnsupportedCommand(cmd)),
    }

    decode_address(atyp, stream).await
}

/// Server side: dial the requested target, notify the observer and send
/// the success reply. Returns the live upstream connection.
pub async fn accept<S>(
    stream: &mut S,
    source: &str,
    config: &ServerConfig,
) -> Result<(TcpStream, TargetAddress)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let limit = config.timeouts.handshake;
    let target = with_deadline(limit, "connect request", read_request(stream)).await?;
    debug!("[{}] requested {}", source, target);

    let upstream = dial(&target, config).await?;

    if let Some(observer) = &config.observer {
        observer.on_connect(&ConnectEvent::new(source, target.to_string()));
    }

    if let Err(e) = stream.write_all(&CONNECT_SUCCESS_REPLY).await {
        drop(upstream);
        return Err(Error::write("connect reply")(e));
    }

    Ok((upstream, target))
}

async fn dial(target: &TargetAddress, config: &ServerConfig) -> Result<TcpStream> {
    let upstream = with_deadline(config.timeouts.dial, "dial", async {
        TcpStream::connect((target.host(), target.port()))
            .await
            .map_err(|source| Error::Dial {
                target: target.to_string(),
                source,
            })
    })
    .await?;

    info!("connected to {}", target);
    Ok(upstream)
}

/// Client side: ask the server to CONNECT to `host:port`.
///
/// Only `VER | REP` decide the outcome; on success the bound address that
/// follows is read and discarded so the stream is left at the payload.
pub async fn request<S>(stream: &mut S, host: &str, port: u16) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = encode_connect_request(host, port)?;
    stream
        .write_all(&request)
        .await
        .map_err(Error::write("connect request"))?;

    let mut reply = [0u8; 2];
    read_field(stream, &mut reply, "connect reply").await?;

    let rep = reply[1];
    if rep != 0x00 {
        return Err(Error::ConnectRejected { code: rep });
    }

    let mut tail = [0u8; 2];
    read_field(stream, &mut tail, "connect reply").await?;
    skip_bound_address(tail[1], stream).await?;
    debug!("tunnel to {}:{} accepted", host, port);

    Ok(())
}

/// Consumes `BND.ADDR | BND.PORT` without interpreting it. IPv6 is fine
/// here: the bound address is never used.
async fn skip_bound_address<S>(atyp: u8, stream: &mut S) -> Result<()>
where
    S: AsyncRead + Unpin,
{
    let addr_len = match AddressType::from_u8(atyp) {
        Some(AddressType::Ipv4) => 4,
        Some(AddressType::Ipv6) => 16,
        Some(AddressType::DomainName) => {
            let mut len = [0u8; 1];
            read_field(stream, &mut len, "bound address").await?;
            len[0] as usize
        }
        None => return Err(Error::protocol(format!("invalid bound address type: {}", atyp))),
    };

    let mut rest = vec![0u8; addr_len + 2];
    read_field(stream, &mut rest, "bound address").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, duplex};
    use tokio::net::TcpListener;

    fn ipv4_request(cmd: u8, octets: [u8; 4], port: u16) -> Vec<u8> {
        let mut buf = vec![5, cmd, 0, 1];
        buf.extend_from_slice(&octets);
        buf.extend_from_slice(&port.to_be_bytes());
        buf
    }

    #[tokio::test]
    async fn test_read_request_ipv4() {
        let mut input = ipv4_request(1, [93, 184, 216, 34], 80);
        let target = read_request(&mut input.as_slice()).await.unwrap();
        assert_eq!(target.to_string(), "93.184.216.34:80");

        input[0] = 4;
        let err = read_request(&mut input.as_slice()).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_read_request_rejects_bind_and_udp() {
        for cmd in [2u8, 3, 0x7f] {
            let input = ipv4_request(cmd, [127, 0, 0, 1], 80);
            let err = read_request(&mut input.as_slice()).await.unwrap_err();
            assert!(matches!(err, Error::UnsupportedCommand(c) if c == cmd));
        }
    }

    #[tokio::test]
    async fn test_read_request_truncated_header() {
        let mut input: &[u8] = &[5, 1];
        let err = read_request(&mut input).await.unwrap_err();
        assert!(err.is_truncated());
    }

    #[tokio::test]
    async fn test_accept_dials_and_notifies() {
        let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = target.local_addr().unwrap().port();

        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        let config = ServerConfig::new().with_observer(move |event: &ConnectEvent| {
            seen.lock().unwrap().push(event.clone());
        });

        let (mut client, mut server) = duplex(64);
        client
            .write_all(&ipv4_request(1, [127, 0, 0, 1], port))
            .await
            .unwrap();

        let (_upstream, addr) = accept(&mut server, "10.0.0.9:5000", &config).await.unwrap();
        assert_eq!(addr.port(), port);

        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [5, 0, 0, 1, 0, 0, 0, 0, 0, 0]);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source(), "10.0.0.9:5000");
        assert_eq!(events[0].target(), format!("127.0.0.1:{}", port));
    }

    #[tokio::test]
    async fn test_accept_dial_failure_sends_nothing() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let (mut client, mut server) = duplex(64);
        client
            .write_all(&ipv4_request(1, [127, 0, 0, 1], port))
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let config = ServerConfig::new().with_observer(move |_: &ConnectEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let err = accept(&mut server, "peer", &config).await.unwrap_err();
        assert!(matches!(err, Error::Dial { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        drop(server);
        let mut written = Vec::new();
        client.read_to_end(&mut written).await.unwrap();
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn test_request_success_consumes_reply() {
        let (mut client, mut server) = duplex(128);
        server
            .write_all(&[5, 0, 0, 1, 0, 0, 0, 0, 0, 0, b'h', b'i'])
            .await
            .unwrap();

        request(&mut client, "example.com", 80).await.unwrap();

        let mut rest = [0u8; 2];
        client.read_exact(&mut rest).await.unwrap();
        assert_eq!(&rest, b"hi");

        let mut sent = vec![0u8; 7 + "example.com".len()];
        server.read_exact(&mut sent).await.unwrap();
        assert_eq!(&sent[..5], &[5, 1, 0, 3, 11]);
        assert_eq!(&sent[5..16], b"example.com");
        assert_eq!(&sent[16..], &[0, 80]);
    }

    #[tokio::test]
    async fn test_request_success_with_ipv6_bound_address() {
        let (mut client, mut server) = duplex(128);
        let mut reply = vec![5, 0, 0, 4];
        reply.extend_from_slice(&[0u8; 16]);
        reply.extend_from_slice(&1080u16.to_be_bytes());
        reply.extend_from_slice(b"hi");
        server.write_all(&reply).await.unwrap();

        request(&mut client, "example.com", 80).await.unwrap();

        let mut rest = [0u8; 2];
        client.read_exact(&mut rest).await.unwrap();
        assert_eq!(&rest, b"hi");
    }

    #[tokio::test]
    async fn test_request_success_with_domain_bound_address() {
        let (mut client, mut server) = duplex(128);
        let mut reply = vec![5, 0, 0, 3, 9];
        reply.extend_from_slice(b"proxy.lan");
        reply.extend_from_slice(&[0x04, 0x38, b'h', b'i']);
        server.write_all(&reply).await.unwrap();

        request(&mut client, "example.com", 80).await.unwrap();

        let mut rest = [0u8; 2];
        client.read_exact(&mut rest).await.unwrap();
        assert_eq!(&rest, b"hi");
    }

    #[tokio::test]
    async fn test_request_bad_bound_address() {
        let (mut client, mut server) = duplex(128);
        server.write_all(&[5, 0, 0, 9, 0, 0]).await.unwrap();
        let err = request(&mut client, "example.com", 80).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));

        let (mut client, mut server) = duplex(128);
        server.write_all(&[5, 0, 0, 4, 0, 0, 0]).await.unwrap();
        server.shutdown().await.unwrap();
        let err = request(&mut client, "example.com", 80).await.unwrap_err();
        assert!(matches!(err, Error::TruncatedRead { field: "bound address", .. }));
    }

    #[tokio::test]
    async fn test_request_rejected() {
        let (mut client, mut server) = duplex(128);
        server.write_all(&[5, 5, 0, 1, 0, 0, 0, 0, 0, 0]).await.unwrap();

        let err = request(&mut client, "example.com", 80).await.unwrap_err();
        assert!(matches!(err, Error::ConnectRejected { code: 5 }));
    }

    #[tokio::test]
    async fn test_request_short_reply() {
        let (mut client, mut server) = duplex(128);
        server.write_all(&[5]).await.unwrap();
        server.shutdown().await.unwrap();

        let err = request(&mut client, "example.com", 80).await.unwrap_err();
        assert!(err.is_truncated());
    }
}
