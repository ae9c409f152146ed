use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use beacon_fountain::pacing::FramePacer;
use beacon_fountain::{Decoded, Decoder, Encoder, FountainConfig};
use clap::{ArgGroup, Args};

use crate::framing::{write_frame, FrameReader};

/// How many packets `encode` writes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PacketCount {
    /// `ceil(block_count × factor)`.
    Overhead(f64),
    Exact(u64),
}

impl Default for PacketCount {
    fn default() -> Self {
        PacketCount::Overhead(2.0)
    }
}

impl PacketCount {
    pub fn resolve(self, block_count: usize) -> u64 {
        match self {
            PacketCount::Overhead(factor) => (block_count as f64 * factor).ceil() as u64,
            PacketCount::Exact(n) => n,
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
#[command(group(ArgGroup::new("count").args(["overhead", "packets"])))]
pub struct EncodeArgs {
    /// File to encode.
    pub input: PathBuf,

    /// Packet file to write.
    pub output: PathBuf,

    /// TOML config file.
    #[arg(short, long, env = "BEACON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Source block size in bytes (default: 1024).
    #[arg(short, long)]
    pub block_size: Option<usize>,

    /// Packets per source block (default: 2.0).
    #[arg(long, value_parser = parse_overhead)]
    pub overhead: Option<f64>,

    /// Exact number of packets to write.
    #[arg(short = 'n', long)]
    pub packets: Option<u64>,

    /// Pace output at this many packets per second.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub fps: Option<u32>,

    /// Fixed PRNG seed for reproducible output.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl EncodeArgs {
    pub fn count(&self) -> PacketCount {
        match (self.packets, self.overhead) {
            (Some(n), _) => PacketCount::Exact(n),
            (None, Some(factor)) => PacketCount::Overhead(factor),
            (None, None) => PacketCount::default(),
        }
    }
}

fn parse_overhead(s: &str) -> Result<f64, String> {
    let factor: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if factor.is_finite() && factor > 0.0 {
        Ok(factor)
    } else {
        Err(format!("must be a positive number, got {factor}"))
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct DecodeArgs {
    /// Packet file to read.
    pub input: PathBuf,

    /// File to write the recovered message to.
    pub output: PathBuf,

    /// TOML config file.
    #[arg(short, long, env = "BEACON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the decode summary as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<FountainConfig> {
    let Some(path) = path else {
        return Ok(FountainConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    FountainConfig::from_toml_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))
}

// ─── Encode ─────────────────────────────────────────────────────────────────

pub fn encode(args: &EncodeArgs) -> anyhow::Result<u64> {
    let mut cfg = load_config(args.config.as_deref())?;
    if let Some(bs) = args.block_size {
        cfg.encoder.block_size = bs;
    }
    if args.seed.is_some() {
        cfg.encoder.seed = args.seed;
    }
    if args.fps.is_some() {
        cfg.encoder.fps = args.fps;
    }

    let data = std::fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let mut encoder = Encoder::new(data, &cfg.encoder)?;
    let count = args.count().resolve(encoder.block_count());

    tracing::info!(
        input = %args.input.display(),
        total_size = encoder.total_size(),
        block_size = encoder.block_size(),
        block_count = encoder.block_count(),
        packets = count,
        max_packet_size = encoder.max_packet_size(),
        fps = ?cfg.encoder.fps,
        "encoding"
    );

    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut out = BufWriter::new(file);

    match cfg.encoder.fps {
        Some(fps) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()?;
            runtime.block_on(write_paced(&mut encoder, &mut out, count, fps))?;
        }
        None => {
            for packet in encoder.packets().take(count as usize) {
                write_frame(&mut out, &packet?.encode())?;
            }
        }
    }
    out.flush()?;

    let stats = encoder.stats();
    tracing::info!(
        packets = stats.packets_emitted,
        bytes = stats.bytes_emitted,
        mean_degree = stats.mean_degree(),
        "encode finished"
    );
    Ok(stats.packets_emitted)
}

async fn write_paced<W: Write>(
    encoder: &mut Encoder,
    out: &mut W,
    count: u64,
    fps: u32,
) -> anyhow::Result<()> {
    let mut pacer = FramePacer::new(fps)?;
    pacer.start();
    for packet in encoder.packets().take(count as usize) {
        pacer.next_frame().await;
        write_frame(out, &packet?.encode())?;
        out.flush()?;
    }
    Ok(())
}

// ─── Decode ─────────────────────────────────────────────────────────────────

pub fn decode(args: &DecodeArgs) -> anyhow::Result<Decoded> {
    let cfg = load_config(args.config.as_deref())?;
    let file = File::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;

    let mut decoder = Decoder::with_config(cfg.decoder);
    let mut handle = decoder.decode();

    for (n, frame) in FrameReader::new(BufReader::new(file)).enumerate() {
        let frame = frame.with_context(|| format!("reading frame {n}"))?;
        match decoder.enqueue(&frame) {
            Ok(progress) if progress.done => break,
            Ok(progress) => {
                tracing::debug!(
                    frame = n,
                    received_blocks = progress.received_blocks,
                    total_blocks = progress.total_blocks,
                    fraction = progress.fraction(),
                    "frame accepted"
                );
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(frame = n, error = %e, "skipping frame");
            }
            Err(e) => return Err(e).context("decoding failed"),
        }
    }

    let progress = decoder.progress();
    let decoded = handle.try_result().ok_or_else(|| {
        anyhow::anyhow!(
            "stream ended before decoding completed ({}/{} blocks from {} packets)",
            progress.received_blocks,
            progress.total_blocks,
            progress.received_packets
        )
    })??;

    std::fs::write(&args.output, &decoded.data)
        .with_context(|| format!("writing {}", args.output.display()))?;
    tracing::info!(
        output = %args.output.display(),
        total_size = decoded.total_size,
        received_packets = decoded.received_packets,
        total_blocks = decoded.total_blocks,
        "decode finished"
    );
    if args.json {
        println!("{}", serde_json::to_string_pretty(&decoded)?);
    }
    Ok(decoded)
}
