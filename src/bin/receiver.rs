use std::io::{BufRead, BufReader};
use std::net::TcpListener;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "Listen on loopback and print forwarded tick lines")]
struct Args {
    /// TCP port to listen on
    #[arg(long, short = 'p', default_value_t = 9999)]
    port: u16,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let listener = TcpListener::bind(("127.0.0.1", args.port))
        .with_context(|| format!("bind 127.0.0.1:{}", args.port))?;
    info!(port = args.port, "waiting for exporter");

    for conn in listener.incoming() {
        let stream = conn.context("accept")?;
        info!("exporter connected");
        let mut lines = 0u64;
        for line in BufReader::new(stream).lines() {
            match line {
                Ok(line) => {
                    lines += 1;
                    println!("{line}");
                }
                Err(e) => {
                    info!(error = %e, "connection ended");
                    break;
                }
            }
        }
        info!(lines, "exporter disconnected");
    }
    Ok(())
}
