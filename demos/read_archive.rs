//! Example: Read a JPK archive
//!
//! Prints the segments of a force curve and the calibrated values of the
//! requested channels, or one pixel of a force map.
//!
//! Usage:
//!   cargo run --release --example read_archive -- \
//!       --file curve.jpk-force \
//!       --channels height,vDeflection
//!
//! One pixel of a map, raw digital values, CSV output:
//!   cargo run --release --example read_archive -- \
//!       --file scan.jpk-force-map --pixel 3,7 --raw \
//!       --csv-output pixel.csv

use clap::Parser;
use jpk::{
    ArchiveFile, ArchiveMap, ConversionMode, InfoKey, LoadOptions, PixelPosition,
    WarningCollector,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the archive
    #[arg(short, long)]
    file: String,

    /// Comma-separated channel names (`t` is the time base)
    #[arg(short, long, default_value = "t,height,vDeflection", value_delimiter = ',')]
    channels: Vec<String>,

    /// Keep raw digital values
    #[arg(long)]
    raw: bool,

    /// Conversion steps: `auto`, `default`, or a comma-separated step list
    #[arg(long, default_value = "auto")]
    conversions: String,

    /// Treat the file as a map and read this pixel (`i,j` or a flat index)
    #[arg(long)]
    pixel: Option<String>,

    /// Log every shared-header merge
    #[arg(long)]
    trace_links: bool,

    /// CSV output file path (optional)
    #[arg(long)]
    csv_output: Option<String>,
}

fn conversion_mode(text: &str) -> ConversionMode {
    match text {
        "auto" => ConversionMode::Auto,
        "default" => ConversionMode::DefaultTable,
        steps => ConversionMode::Explicit(steps.split(',').map(str::to_string).collect()),
    }
}

fn pixel_position(text: &str) -> Result<PixelPosition, Box<dyn std::error::Error>> {
    Ok(match text.split_once(',') {
        Some((i, j)) => PixelPosition::Grid(i.trim().parse()?, j.trim().parse()?),
        None => PixelPosition::Flat(text.trim().parse()?),
    })
}

fn print_segments(archive: &ArchiveFile) {
    println!("SEGMENT\tTYPE\tNUM POINTS\tDURATION");
    for segment in archive.segments() {
        let info = |key| segment.info(key).unwrap_or_else(|_| "?".to_string());
        println!(
            "{}\t{}\t{}\t\t{}",
            segment.index(),
            info(InfoKey::Type),
            info(InfoKey::NumPoints),
            info(InfoKey::Duration)
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mode = conversion_mode(&args.conversions);
    let options = LoadOptions::new()
        .with_conversion_mode(mode.clone())
        .with_link_tracing(args.trace_links);

    info!("=== JPK Archive Reader ===");
    info!("File: {}", args.file);

    let mut warnings = WarningCollector::new();
    let map;
    let single;
    let archive = match &args.pixel {
        Some(pixel) => {
            map = ArchiveMap::open_with(&args.file, &options, &mut warnings)?;
            info!("Map pattern: {}, {} pixel(s)", map.pattern(), map.len());
            map.pixel_with(pixel_position(pixel)?, &mut warnings)?
        }
        None => {
            single = ArchiveFile::open_with(&args.file, &options, &mut warnings)?;
            &single
        }
    };

    info!("Archive kind: {:?}", archive.archive_kind());
    if let Some(date) = archive.parameters().timestamp() {
        info!("Recorded: {}", date);
    }
    print_segments(archive);

    let names: Vec<&str> = args.channels.iter().map(String::as_str).collect();
    let table = archive.concatenate_channels_with(&names, !args.raw, &mode, &mut warnings)?;

    let header: Vec<String> = table
        .names()
        .map(|name| format!("{} [{}]", name, table.unit(name).unwrap_or("?")))
        .collect();
    info!("Columns: {}", header.join(", "));
    info!("Rows: {}", table.len());

    if let Some(path) = &args.csv_output {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "{}", header.join(","))?;
        for row in 0..table.len() {
            let values: Vec<String> = table
                .names()
                .map(|name| table.column(name).map_or(String::new(), |c| c[row].to_string()))
                .collect();
            writeln!(out, "{}", values.join(","))?;
        }
        out.flush()?;
        info!("Wrote {}", path);
    }

    if !warnings.is_empty() {
        info!("{} warning(s) while reading", warnings.warnings().len());
    }

    Ok(())
}
