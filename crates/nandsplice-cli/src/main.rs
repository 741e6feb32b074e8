//! nandsplice - Reconstruct chunked files from raw flash memory dumps
//!
//! This tool scans a flash dump for blocks carrying chunk directories and
//! reassembles the chunks of every filesystem id into a region file.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use nandsplice_core::oob::{default_outputs, split_oob_file};
use nandsplice_core::{
    reconstruct_file, AssemblerConfig, NandLayout, Reconstruction, Region, RegionWriter,
    ScannerConfig,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, Level};
use tracing_subscriber::EnvFilter;

/// Reconstruct chunked files from raw flash memory dumps
#[derive(Parser, Debug)]
#[command(name = "nandsplice")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reassemble regions from a flash dump
    Assemble(AssembleArgs),
    /// Split an interleaved NAND dump into data and OOB files
    SplitOob(SplitOobArgs),
}

#[derive(Args, Debug)]
struct AssembleArgs {
    /// Path to the flash dump
    input: PathBuf,

    /// Output directory for region files [default: <INPUT>_output]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Name region files by detected content type instead of .bin
    #[arg(short = 'e', long)]
    add_extension: bool,

    /// Strip the 4-byte device header from every region (V601N dumps)
    #[arg(short, long)]
    strip_header: bool,

    /// Log every descriptor belonging to this filesystem id
    #[arg(long, value_name = "ID")]
    trace_fs: Option<u16>,

    /// Dry run - don't write files, just show what would be written
    #[arg(long)]
    dry_run: bool,

    /// Only list reconstructed regions without writing them
    #[arg(long)]
    list_only: bool,

    /// Overwrite existing files
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct SplitOobArgs {
    /// Path to the interleaved dump
    input: PathBuf,

    /// Page layout index (run without it to list the candidates)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..NandLayout::KNOWN.len() as i64))]
    layout: Option<u8>,

    /// Output path for page data [default: <STEM>_separated_<SIZE>.bin]
    #[arg(long)]
    output_data: Option<PathBuf>,

    /// Output path for spare-area bytes [default: <STEM>_separated_<SIZE>.oob]
    #[arg(long)]
    output_oob: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let tracing_fs = matches!(cli.command, Command::Assemble(AssembleArgs { trace_fs: Some(_), .. }));
    let level = match cli.verbose {
        // Descriptor traces are logged at INFO
        0 if tracing_fs => Level::INFO,
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match cli.command {
        Command::Assemble(ref args) => assemble(args),
        Command::SplitOob(ref args) => split(args),
    }
}

/// Default output directory: `<input>_output` beside the input
fn default_output_dir(input: &Path) -> PathBuf {
    let mut name = input
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "dump".into());
    name.push("_output");
    input.with_file_name(name)
}

/// Short content digest (first 8 hex chars of blake3)
fn content_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex()[..8].to_string()
}

fn assemble(args: &AssembleArgs) -> Result<()> {
    if !args.input.is_file() {
        bail!("Input file does not exist: {}", args.input.display());
    }

    let scanner = ScannerConfig::new().trace_filesystem(args.trace_fs);
    let assembler = AssemblerConfig::new().strip_header(args.strip_header);
    let result = reconstruct_file(&args.input, scanner, assembler)
        .with_context(|| format!("Failed to reconstruct {}", args.input.display()))?;

    print_scan_summary(&result);

    if args.list_only {
        for region in &result.regions {
            println!("{}", list_line(region));
        }
        return Ok(());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_dir(&args.input));
    let writer = RegionWriter::new(output)
        .classify(args.add_extension)
        .force(args.force);

    if args.dry_run {
        for region in &result.regions {
            println!("Would write: {} ({} bytes)", writer.path_for(region).display(), region.len());
        }
        return Ok(());
    }

    writer
        .prepare()
        .with_context(|| format!("Failed to prepare {}", writer.dir().display()))?;

    let mut written = 0;
    for region in &result.regions {
        match writer.write(region) {
            Ok(path) => {
                println!("fs {}: {}", region.filesystem_id, path.display());
                written += 1;
            }
            Err(e) => error!("Failed to write fs {}: {}", region.filesystem_id, e),
        }
    }

    info!(
        "Summary: {} region(s) reconstructed, {} written to {}",
        result.regions.len(),
        written,
        writer.dir().display()
    );

    if written < result.regions.len() {
        bail!(
            "{} of {} region(s) could not be written",
            result.regions.len() - written,
            result.regions.len()
        );
    }

    Ok(())
}

fn list_line(region: &Region) -> String {
    format!(
        "{:05} {:>10} {}",
        region.filesystem_id,
        region.len(),
        content_hash(region.as_bytes())
    )
}

fn print_scan_summary(result: &Reconstruction) {
    let stats = &result.stats;
    info!(
        "Scanned {} bytes: {} block(s), {} with directories, {} malformed",
        stats.bytes_read, stats.blocks_read, stats.directory_blocks, stats.malformed_blocks
    );
    debug!(
        "{} chunk record(s) produced {} region(s)",
        result.records,
        result.regions.len()
    );
}

fn split(args: &SplitOobArgs) -> Result<()> {
    let size = fs::metadata(&args.input)
        .with_context(|| format!("Failed to read input file: {}", args.input.display()))?
        .len();

    let Some(index) = args.layout else {
        println!("Input: {} ({} bytes)", args.input.display(), size);
        for (i, layout) in NandLayout::KNOWN.iter().enumerate() {
            println!("{}: {}, divisible = {}", i, layout, layout.divides(size));
        }
        bail!("No layout selected (use --layout <N>)");
    };

    let layout = NandLayout::KNOWN[index as usize];
    let (default_data, default_oob) = default_outputs(&args.input, layout);
    let data_path = args.output_data.clone().unwrap_or(default_data);
    let oob_path = args.output_oob.clone().unwrap_or(default_oob);

    if !layout.divides(size) {
        info!("Input size {} is not a multiple of the {} byte page", size, layout.page_size());
    }

    let stats = split_oob_file(&args.input, layout, &data_path, &oob_path)
        .with_context(|| format!("Failed to split {}", args.input.display()))?;

    println!(
        "Wrote {} ({} bytes) and {} ({} bytes) from {} page(s)",
        data_path.display(),
        stats.data_bytes,
        oob_path.display(),
        stats.oob_bytes,
        stats.pages
    );
    Ok(())
}
