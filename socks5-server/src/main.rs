use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use socks5::{ConnectEvent, Server, ServerConfig, ServerSettings};

#[derive(Parser)]
#[command(name = "socks5-server")]
#[command(about = "SOCKS5 proxy server (CONNECT only, no authentication)")]
struct Args {
    /// Listen host
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// JSON settings file; command line values take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upstream dial timeout in milliseconds
    #[arg(long)]
    dial_timeout_ms: Option<u64>,

    /// Handshake timeout in milliseconds
    #[arg(long)]
    handshake_timeout_ms: Option<u64>,
}

impl Args {
    fn settings(&self) -> Result<ServerSettings> {
        let mut settings = match &self.config {
            Some(path) => ServerSettings::from_json_file(path)?,
            None => ServerSettings::default(),
        };

        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if self.dial_timeout_ms.is_some() {
            settings.dial_timeout_ms = self.dial_timeout_ms;
        }
        if self.handshake_timeout_ms.is_some() {
            settings.handshake_timeout_ms = self.handshake_timeout_ms;
        }

        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let settings = args.settings()?;

    let config = ServerConfig::new()
        .with_timeouts(settings.timeouts())
        .with_observer(|event: &ConnectEvent| info!("{}", event));

    let server = Server::bind(settings.listen_addr(), config).await?;
    info!("start socks5 server at: {} ...", server.local_addr()?);

    server.serve().await;
    Ok(())
}
