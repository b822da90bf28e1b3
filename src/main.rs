use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;

use tick_export::export::Exporter;
use tick_export::feed::ReplayFeed;

#[derive(Debug, Parser)]
#[command(version, about = "Tick forwarder: replay a capture into a file or TCP sink")]
struct Args {
    /// Capture file to replay (one JSON tick per line)
    #[arg(long, short = 'i', env = "TICKS_IN")]
    input: PathBuf,

    /// Symbol attached to every forwarded record
    #[arg(long, env = "SYMBOL")]
    symbol: String,

    /// Output file path; defaults to ticks_YYYY_MM_DD.jsonl
    #[arg(long, env = "OUT_FILE")]
    out: Option<PathBuf>,

    /// Max output file size in KB before rotation, 0 = unlimited
    #[arg(long, env = "MAX_KB", default_value_t = 1000)]
    max_kb: u64,

    /// Forward to a TCP listener on 127.0.0.1:PORT instead of a file
    #[arg(long, env = "TCP_PORT")]
    port: Option<u16>,

    /// Poll cadence in milliseconds
    #[arg(long, default_value_t = 250)]
    interval_ms: u64,

    /// Captured ticks revealed per poll
    #[arg(long, default_value_t = 16)]
    chunk: usize,
}

fn default_out_path() -> PathBuf {
    let date = time::OffsetDateTime::now_local()
        .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
        .date();
    PathBuf::from(format!(
        "ticks_{}_{:02}_{:02}.jsonl",
        date.year(),
        date.month() as u8,
        date.day()
    ))
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut feed = ReplayFeed::open(&args.input, &args.symbol, args.chunk)?;

    let mut exporter = match args.port {
        Some(port) => {
            info!(port, "forwarding to 127.0.0.1 socket");
            Exporter::to_socket(port)
        }
        None => {
            let out = args.out.clone().unwrap_or_else(default_out_path);
            info!(path = %out.display(), max_kb = args.max_kb, "forwarding to file");
            Exporter::to_file(out, args.max_kb)
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .context("install Ctrl-C handler")?;

    // Exit once the capture is fully revealed and the exporter has gone
    // idle for a few polls; the grace period lets an in-progress socket
    // connect finish instead of cutting the tail off.
    let mut idle = 0u32;
    while running.load(Ordering::SeqCst) {
        feed.advance();
        let sent = exporter.poll(&feed);
        if feed.exhausted() && sent == 0 {
            idle += 1;
            if idle >= 8 {
                break;
            }
        } else {
            idle = 0;
        }
        std::thread::sleep(Duration::from_millis(args.interval_ms));
    }

    info!(total = exporter.delivered(), "exporter stopped");
    Ok(())
}
