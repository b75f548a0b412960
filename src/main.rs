use chrono::DateTime;
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use fkfs_recover::card::{Card, RecoverOptions};
use fkfs_recover::superblock::Superblock;
use fkfs_recover::Slot;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fkfs-recover", about = "Recover logged files from raw fkfs card images")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export every file found on the card
    Recover {
        /// Card device or image to read
        card: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        /// Output name prefix (default: current time, YYYYMMDD_HHMMSS)
        #[arg(short, long)]
        prefix: Option<String>,
    },
    /// Walk the card and report what would be recovered
    Scan {
        card: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show both header copies
    Info {
        card: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG overrides, e.g. RUST_LOG=debug to see skipped regions.
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    match Cli::parse().command {

        // ── Recover ──────────────────────────────────────────────────────────
        Commands::Recover { card, output_dir, prefix } => {
            std::fs::create_dir_all(&output_dir)?;
            let mut c = Card::open(&card)?;
            let recovery = c.recover(&RecoverOptions { output_dir, prefix })?;
            println!("{}", recovery.report.summary());
        }

        // ── Scan ─────────────────────────────────────────────────────────────
        Commands::Scan { card, json } => {
            let mut c = Card::open(&card)?;
            let recovery = c.scan()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&recovery)?);
            } else {
                println!("{}", recovery.report.summary());
                for f in &recovery.files {
                    println!("  {:<4} {:<14} {:>10} bytes", f.slot.to_string(), f.name, f.bytes);
                }
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { card } => {
            let c = Card::open(&card)?;
            println!("── fkfs card ────────────────────────────────────────────");
            println!("  Path           {}", card.display());
            for (i, sb) in c.copies().iter().enumerate() {
                let current = if i == c.current_index() { " (current)" } else { "" };
                println!("  Header copy {i}{current}");
                print_header(sb);
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn print_header(sb: &Superblock) {
    let created = DateTime::from_timestamp(sb.time as i64, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".into());
    let crc = if sb.checksum_matches() { "ok" } else { "MISMATCH" };
    println!("    Version      {}", sb.version);
    println!("    Generation   {}", sb.generation);
    println!("    Blocks       {}", sb.block);
    println!("    Offset       {}", sb.offset);
    println!("    Created      {}", created);
    println!("    Checksum     {:#06x} ({})", sb.crc, crc);
    println!("    {:<4} {:<12} {:>7} {:>10} {:>10} {:>10}", "Slot", "Name", "Version", "Start", "End", "Size");
    for slot in Slot::all() {
        let f = sb.file(slot);
        println!("    {:<4} {:<12} {:>7} {:>10} {:>10} {:>10}",
                 slot.to_string(), f.name(), f.version, f.start_block, f.end_block, f.size);
    }
}
