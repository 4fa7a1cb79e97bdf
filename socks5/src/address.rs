//! Target address fields: `ATYP | DST.ADDR | DST.PORT`.

use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};
use crate::protocol::{AddressType, CONNECT_COMMAND, MAX_DOMAIN_LEN, RESERVED, SOCKS_VERSION};

/// Host and port a client asked the proxy to reach.
///
/// `host` is either a dotted-quad IPv4 string or a domain name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAddress {
    host: String,
    port: u16,
}

impl TargetAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Display for TargetAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Reads exactly `buf.len()` bytes, reporting a short read as `TruncatedRead`.
pub(crate) async fn read_field<R>(reader: &mut R, buf: &mut [u8], field: &'static str) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    reader
        .read_exact(buf)
        .await
        .map_err(Error::truncated(field))?;
    Ok(())
}

/// Decodes `DST.ADDR | DST.PORT` for the given `ATYP` byte.
pub async fn decode_address<R>(atyp: u8, reader: &mut R) -> Result<TargetAddress>
where
    R: AsyncRead + Unpin,
{
    let host = match AddressType::from_u8(atyp) {
        Some(AddressType::Ipv4) => {
            let mut octets = [0u8; 4];
            read_field(reader, &mut octets, "IPv4 address").await?;
            Ipv4Addr::from(octets).to_string()
        }
        Some(AddressType::DomainName) => {
            let mut len = [0u8; 1];
            read_field(reader, &mut len, "domain length").await?;

            let mut domain = vec![0u8; len[0] as usize];
            read_field(reader, &mut domain, "domain name").await?;
            String::from_utf8(domain)
                .map_err(|e| Error::protocol(format!("invalid domain name: {}", e)))?
        }
        Some(AddressType::Ipv6) => return Err(Error::UnsupportedAddressType(atyp)),
        None => return Err(Error::protocol(format!("invalid address type: {}", atyp))),
    };

    let mut port = [0u8; 2];
    read_field(reader, &mut port, "port").await?;

    Ok(TargetAddress::new(host, u16::from_be_bytes(port)))
}

/// Builds a CONNECT request. The host always goes out as a domain name,
/// literal IPs included.
pub fn encode_connect_request(host: &str, port: u16) -> Result<Bytes> {
    if host.len() > MAX_DOMAIN_LEN {
        return Err(Error::protocol(format!(
            "host is {} bytes, at most {} fit in a request",
            host.len(),
            MAX_DOMAIN_LEN
        )));
    }

    let mut buf = BytesMut::with_capacity(7 + host.len());
    buf.put_u8(SOCKS_VERSION);
    buf.put_u8(CONNECT_COMMAND);
    buf.put_u8(RESERVED);
    buf.put_u8(AddressType::DomainName.as_u8());
    buf.put_u8(host.len() as u8);
    buf.put_slice(host.as_bytes());
    buf.put_u16(port);
    Ok(buf.freeze())
}
