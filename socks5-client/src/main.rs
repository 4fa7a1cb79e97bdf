use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use socks5::{Client, ClientSettings};

#[derive(Parser)]
#[command(name = "socks5-client")]
#[command(about = "Send stdin through a SOCKS5 server and print the reply")]
struct Args {
    /// SOCKS5 server host
    #[arg(long, env = "SERVER_HOST")]
    server_host: Option<String>,

    /// SOCKS5 server port
    #[arg(long, env = "SERVER_PORT")]
    server_port: Option<u16>,

    /// Target host
    #[arg(long, env = "REQUEST_HOST")]
    host: String,

    /// Target port
    #[arg(long, env = "REQUEST_PORT")]
    port: u16,

    /// JSON settings file for the server side; command line values take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Args {
    fn settings(&self) -> Result<ClientSettings> {
        let mut settings = match &self.config {
            Some(path) => ClientSettings::from_json_file(path)?,
            None => ClientSettings::default(),
        };

        if let Some(host) = &self.server_host {
            settings.host = host.clone();
        }
        if let Some(port) = self.server_port {
            settings.port = port;
        }

        Ok(settings)
    }
}

// printf "GET /ip HTTP/1.1\r\nHost: httpbin.org\r\nConnection: close\r\n\r\n" \
//     | socks5-client --host httpbin.org --port 80
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let settings = args.settings()?;

    let mut payload = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut payload)
        .await
        .context("reading payload from stdin")?;

    let mut client = Client::from_settings(&settings);
    info!(
        "connecting to {}:{} via {}",
        args.host,
        args.port,
        client.server_addr()
    );

    let response = client
        .connect(&args.host, args.port, &payload)
        .await
        .with_context(|| format!("tunnel to {}:{}", args.host, args.port))?;
    client.close().await.ok();

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&response).await?;
    stdout.flush().await?;
    Ok(())
}
