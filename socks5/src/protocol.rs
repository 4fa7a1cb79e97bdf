//! SOCKS5 wire constants and the enumerations built on them (RFC 1928).

use std::fmt::{self, Display, Formatter};

pub const SOCKS_VERSION: u8 = 0x05;
pub const RESERVED: u8 = 0x00;

pub const NO_AUTHENTICATION: u8 = 0x00;
pub const GSSAPI: u8 = 0x01;
pub const USERNAME_PASSWORD: u8 = 0x02;
pub const NO_ACCEPTABLE_METHOD: u8 = 0xFF;

pub const CONNECT_COMMAND: u8 = 0x01;
pub const BIND_COMMAND: u8 = 0x02;
pub const UDP_ASSOCIATE_COMMAND: u8 = 0x03;

pub const IPV4_ADDRESS: u8 = 0x01;
pub const DOMAIN_NAME: u8 = 0x03;
pub const IPV6_ADDRESS: u8 = 0x04;

/// Longest host an FQDN field can carry: its length prefix is one byte.
pub const MAX_DOMAIN_LEN: usize = u8::MAX as usize;

/// The only CONNECT reply this server ever sends: success, bound to 0.0.0.0:0.
pub const CONNECT_SUCCESS_REPLY: [u8; 10] = [
    SOCKS_VERSION,
    0x00, // REP
    RESERVED,
    IPV4_ADDRESS,
    0x00, 0x00, 0x00, 0x00, // BND.ADDR
    0x00, 0x00, // BND.PORT
];

/// Authentication methods a client may offer during method negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    NoAuthentication,
    GssApi,
    UsernamePassword,
    NoAcceptableMethod,
    /// IANA assigned or private method codes.
    Other(u8),
}

impl From<u8> for AuthMethod {
    fn from(code: u8) -> Self {
        match code {
            NO_AUTHENTICATION => Self::NoAuthentication,
            GSSAPI => Self::GssApi,
            USERNAME_PASSWORD => Self::UsernamePassword,
            NO_ACCEPTABLE_METHOD => Self::NoAcceptableMethod,
            other => Self::Other(other),
        }
    }
}

impl From<AuthMethod> for u8 {
    fn from(method: AuthMethod) -> Self {
        match method {
            AuthMethod::NoAuthentication => NO_AUTHENTICATION,
            AuthMethod::GssApi => GSSAPI,
            AuthMethod::UsernamePassword => USERNAME_PASSWORD,
            AuthMethod::NoAcceptableMethod => NO_ACCEPTABLE_METHOD,
            AuthMethod::Other(code) => code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Bind,
    UdpAssociate,
}

impl Command {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            CONNECT_COMMAND => Some(Self::Connect),
            BIND_COMMAND => Some(Self::Bind),
            UDP_ASSOCIATE_COMMAND => Some(Self::UdpAssociate),
            _ => None,
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Command::Connect => write!(f, "CONNECT"),
            Command::Bind => write!(f, "BIND"),
            Command::UdpAssociate => write!(f, "UDP_ASSOCIATE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Ipv4,
    DomainName,
    Ipv6,
}

impl AddressType {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            IPV4_ADDRESS => Some(Self::Ipv4),
            DOMAIN_NAME => Some(Self::DomainName),
            IPV6_ADDRESS => Some(Self::Ipv6),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            AddressType::Ipv4 => IPV4_ADDRESS,
            AddressType::DomainName => DOMAIN_NAME,
            AddressType::Ipv6 => IPV6_ADDRESS,
        }
    }
}

/// CONNECT reply codes. The server only emits `Succeeded`; the rest are kept
/// so a client can say why a server rejected its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Succeeded = 0x00,
    GeneralFailure = 0x01,
    ConnectionNotAllowed = 0x02,
    NetworkUnreachable = 0x03,
    HostUnreachable = 0x04,
    ConnectionRefused = 0x05,
    TtlExpired = 0x06,
    CommandNotSupported = 0x07,
    AddressTypeNotSupported = 0x08,
}

impl Reply {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::Succeeded),
            0x01 => Some(Self::GeneralFailure),
            0x02 => Some(Self::ConnectionNotAllowed),
            0x03 => Some(Self::NetworkUnreachable),
            0x04 => Some(Self::HostUnreachable),
            0x05 => Some(Self::ConnectionRefused),
            0x06 => Some(Self::TtlExpired),
            0x07 => Some(Self::CommandNotSupported),
            0x08 => Some(Self::AddressTypeNotSupported),
            _ => None,
        }
    }

    pub fn describe(code: u8) -> String {
        match Self::from_u8(code) {
            Some(reply) => reply.to_string(),
            None => format!("unassigned reply {:#04x}", code),
        }
    }
}

impl Display for Reply {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::GeneralFailure => write!(f, "general failure"),
            Self::ConnectionNotAllowed => write!(f, "connection not allowed"),
            Self::NetworkUnreachable => write!(f, "network unreachable"),
            Self::HostUnreachable => write!(f, "host unreachable"),
            Self::ConnectionRefused => write!(f, "connection refused"),
            Self::TtlExpired => write!(f, "ttl expired"),
            Self::CommandNotSupported => write!(f, "command not supported"),
            Self::AddressTypeNotSupported => write!(f, "address type not supported"),
        }
    }
}
