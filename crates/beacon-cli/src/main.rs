//! # beacon
//!
//! Fountain-code a file into a stream of self-describing packets, or rebuild
//! a file from any large-enough subset of them.
//!
//! ## Usage
//!
//! ```bash
//! # Twice as many packets as blocks
//! beacon encode photo.jpg photo.pkt --block-size 1024
//!
//! # Paced at 30 packets per second
//! beacon encode photo.jpg photo.pkt --packets 500 --fps 30
//!
//! # Rebuild
//! beacon decode photo.pkt photo.out.jpg
//! ```

mod commands;
mod framing;

use clap::{Parser, Subcommand};

use commands::{DecodeArgs, EncodeArgs};

/// Fountain-code files into lossy packet streams.
#[derive(Parser, Debug)]
#[command(
    name = "beacon",
    version,
    after_help = "Packet files hold one frame per packet: a 4-byte big-endian length, then\n\
                  the packet bytes. RUST_LOG sets the log filter (e.g. beacon_fountain=debug)."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a file into a framed packet stream.
    Encode(EncodeArgs),
    /// Rebuild a file from a framed packet stream.
    Decode(DecodeArgs),
}

fn main() -> anyhow::Result<()> {
    // ── Logging ─────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Encode(args) => {
            commands::encode(&args)?;
        }
        Command::Decode(args) => {
            commands::decode(&args)?;
        }
    }
    Ok(())
}
