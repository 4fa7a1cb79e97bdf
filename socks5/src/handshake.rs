//! Method negotiation, both directions.
//!
//! Request:  VER | NMETHODS | METHODS
//! Response: VER | METHOD

use log::debug;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::address::read_field;
use crate::error::{Error, Result};
use crate::protocol::{AuthMethod, NO_AUTHENTICATION, SOCKS_VERSION};

/// Methods the client advertises, in order of preference.
pub const CLIENT_METHODS: [AuthMethod; 2] = [AuthMethod::NoAuthentication, AuthMethod::GssApi];

/// Server side of method negotiation.
///
/// The offered methods are read and discarded: no authentication is always
/// selected, even when the client did not offer it.
pub async fn accept<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut header = [0u8; 2];
    read_field(stream, &mut header, "method negotiation header")
        .await
        .map_err(|e| Error::protocol(format!("reading header: {}", e)))?;

    let (version, nmethods) = (header[0], header[1]);
    if version != SOCKS_VERSION {
        return Err(Error::protocol(format!("invalid version: {}", version)));
    }

    let mut methods = vec![0u8; nmethods as usize];
    read_field(stream, &mut methods, "methods").await?;
    debug!(
        "client offered methods {:?}",
        methods.iter().map(|m| AuthMethod::from(*m)).collect::<Vec<_>>()
    );

    stream
        .write_all(&[SOCKS_VERSION, NO_AUTHENTICATION])
        .await
        .map_err(Error::write("method selection"))?;
    Ok(())
}

/// Client side of method negotiation.
pub async fn negotiate<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = Vec::with_capacity(2 + CLIENT_METHODS.len());
    request.push(SOCKS_VERSION);
    request.push(CLIENT_METHODS.len() as u8);
    request.extend(CLIENT_METHODS.iter().map(|m| u8::from(*m)));

    stream
        .write_all(&request)
        .await
        .map_err(Error::write("method negotiation"))?;

    let mut reply = [0u8; 2];
    read_field(stream, &mut reply, "method selection").await?;

    let (version, method) = (reply[0], reply[1]);
    if version != SOCKS_VERSION {
        return Err(Error::protocol(format!("unsupported SOCKS version {}", version)));
    }

    match AuthMethod::from(method) {
        AuthMethod::NoAuthentication => Ok(()),
        // username/password included: no sub-negotiation is implemented
        _ => Err(Error::UnsupportedMethod(method)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, duplex};

    #[tokio::test]
    async fn test_accept_selects_no_auth() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[5, 1, 0]).await.unwrap();

        accept(&mut server).await.unwrap();

        let mut reply = [0u8; 2];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [5, 0]);
    }

    #[tokio::test]
    async fn test_accept_ignores_offered_methods() {
        let (mut client, mut server) = duplex(64);
        // only username/password offered
        client.write_all(&[5, 1, 2]).await.unwrap();

        accept(&mut server).await.unwrap();

        let mut reply = [0u8; 2];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [5, 0]);
    }

    #[tokio::test]
    async fn test_accept_rejects_wrong_version() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[4, 1, 0]).await.unwrap();

        let err = accept(&mut server).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));

        drop(server);
        let mut written = Vec::new();
        client.read_to_end(&mut written).await.unwrap();
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn test_accept_short_header() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[5]).await.unwrap();
        drop(client);

        let err = accept(&mut server).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_accept_short_method_list() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[5, 3, 0]).await.unwrap();
        drop(client);

        let err = accept(&mut server).await.unwrap_err();
        assert!(err.is_truncated());
    }

    #[tokio::test]
    async fn test_negotiate_no_auth() {
        let (mut client, mut server) = duplex(64);
        server.write_all(&[5, 0]).await.unwrap();

        negotiate(&mut client).await.unwrap();

        let mut request = [0u8; 4];
        server.read_exact(&mut request).await.unwrap();
        assert_eq!(request, [5, 2, 0, 1]);
    }

    #[tokio::test]
    async fn test_negotiate_unsupported_method() {
        for method in [0x01u8, 0x02, 0xFF] {
            let (mut client, mut server) = duplex(64);
            server.write_all(&[5, method]).await.unwrap();

            let err = negotiate(&mut client).await.unwrap_err();
            assert!(matches!(err, Error::UnsupportedMethod(m) if m == method));
        }
    }

    #[tokio::test]
    async fn test_negotiate_wrong_version() {
        let (mut client, mut server) = duplex(64);
        server.write_all(&[4, 0]).await.unwrap();

        let err = negotiate(&mut client).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_negotiate_server_closed() {
        let (mut client, mut server) = duplex(64);
        server.write_all(&[5]).await.unwrap();
        server.shutdown().await.unwrap();

        let err = negotiate(&mut client).await.unwrap_err();
        assert!(err.is_truncated());
    }
}
