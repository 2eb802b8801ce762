// ==============================================================================
// main.rs - Feature Table Converter Entry Point
// ==============================================================================
// Description: Command line front end for GFF3 -> feature table conversion
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use feature_table::processor::{output_file_name, report_title};
use feature_table::{
    ConversionOptions, FeatureTableProcessor, ProductMap, RepeatMergePolicy, RepeatNotePolicy,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// GFF3 annotation file (plain or gzip)
    #[arg(short, long)]
    input: PathBuf,

    /// Gene -> product map (.json object or two-column TSV)
    #[arg(short, long, env = "FEATURE_TABLE_PRODUCTS", default_value = "gene_product_map.json")]
    products: PathBuf,

    /// Directory for {name}_formatted.txt
    #[arg(short, long, default_value = "outputs")]
    output_dir: PathBuf,

    /// Merge target for adjacent repeat_region rows (corrected or compatible)
    #[arg(long, default_value = "corrected")]
    repeat_merge: RepeatMergePolicy,

    /// Labels past "inverted repeat B" (strict or alphabetic)
    #[arg(long, default_value = "strict")]
    repeat_notes: RepeatNotePolicy,

    /// Print the feature table instead of writing a file
    #[arg(long)]
    stdout: bool,
}

fn main() -> Result<()> {
    // Initialize tracing (stderr, so --stdout output stays clean)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feature_table=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let products = ProductMap::load(&args.products)
        .with_context(|| format!("Failed to load product map {}", args.products.display()))?;

    let options = ConversionOptions {
        repeat_merge: args.repeat_merge,
        repeat_notes: args.repeat_notes,
    };
    info!("Conversion options: {:?}", options);

    let processor = FeatureTableProcessor::new(args.output_dir, Arc::new(products), options);

    if args.stdout {
        let data = std::fs::read(&args.input)
            .with_context(|| format!("Failed to read {}", args.input.display()))?;
        let output_name = output_file_name(&args.input);
        let conversion = processor.convert_bytes(&data, report_title(&output_name))?;
        println!("{}", conversion.text);
        return Ok(());
    }

    let processed = processor.process_file(&args.input)?;
    info!(
        "Wrote {} (sha256 of input {})",
        processed.output_path.display(),
        &processed.input_sha256[..16]
    );

    Ok(())
}
