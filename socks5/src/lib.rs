//! A minimal SOCKS5 proxy: CONNECT-only server with a matching client.
//!
//! Server flow per connection: method negotiation (`handshake::accept`),
//! CONNECT (`connect::accept`), then `relay::run` until either side closes.
//! Client flow: `handshake::negotiate`, `connect::request`, payload, read
//! until close; see [`Client::connect`].

pub mod address;
pub mod client;
pub mod config;
pub mod connect;
pub mod error;
pub mod handshake;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod session;

pub use address::TargetAddress;
pub use client::Client;
pub use config::{ClientSettings, ServerSettings, Timeouts};
pub use error::{Error, Result};
pub use server::{ConnectEvent, ConnectObserver, Server, ServerConfig};
pub use session::{ConnectionSession, SessionState};
