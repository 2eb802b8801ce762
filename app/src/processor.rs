// ==============================================================================
// processor.rs - Core Conversion Pipeline
// ==============================================================================
// Description: GFF3 -> feature table pipeline (parse, orient, group, render)
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::grouping::{group_features, GroupingError, GroupingStats, RepeatMergePolicy};
use crate::orientation::normalize_all;
use crate::output::{FeatureTableWriter, FormatError, RepeatNotePolicy};
use crate::parsers::{Gff3ParseError, Gff3Parser, ParseStats};
use crate::product_map::ProductMap;

/// Suffix appended to the input stem to name the output file
pub const OUTPUT_SUFFIX: &str = "_formatted.txt";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Policies for the two legacy ambiguities in repeat_region handling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    pub repeat_merge: RepeatMergePolicy,
    pub repeat_notes: RepeatNotePolicy,
}

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error(transparent)]
    Parse(#[from] Gff3ParseError),

    #[error(transparent)]
    Grouping(#[from] GroupingError),

    #[error(transparent)]
    Format(#[from] FormatError),
}

impl ConversionError {
    /// Stable name of the failure class, used in logs and API responses
    pub fn kind(&self) -> &'static str {
        match self {
            ConversionError::Parse(Gff3ParseError::MalformedRecord { .. }) => "MalformedRecord",
            ConversionError::Parse(Gff3ParseError::IoError(_)) => "Io",
            ConversionError::Grouping(GroupingError::CompatMergeWithoutRrna { .. }) => {
                "CompatMergeWithoutRrna"
            }
            ConversionError::Format(FormatError::MissingProduct { .. }) => "MissingProduct",
            ConversionError::Format(FormatError::UnboundedRepeatRegion { .. }) => {
                "UnboundedRepeatRegion"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    pub parse: ParseStats,
    pub grouping: GroupingStats,
}

/// Rendered document plus the counters gathered on the way
#[derive(Debug, Clone)]
pub struct Conversion {
    pub text: String,
    pub stats: ConversionStats,
}

/// Run the whole pipeline over an in-memory reader
pub fn convert_reader<R: BufRead>(
    reader: R,
    title: &str,
    products: &ProductMap,
    options: ConversionOptions,
) -> Result<Conversion, ConversionError> {
    let parsed = Gff3Parser::new().parse_reader(reader)?;
    let features = normalize_all(parsed.features);
    let grouping = group_features(features, options.repeat_merge)?;

    debug!(
        "Grouped {} genes ({} spans, {} merged, {} orphans)",
        grouping.stats.genes, grouping.stats.spans, grouping.stats.merged, grouping.stats.orphans
    );

    let text = FeatureTableWriter::new(products, options.repeat_notes).render(title, &grouping.records)?;

    Ok(Conversion {
        text,
        stats: ConversionStats {
            parse: parsed.stats,
            grouping: grouping.stats,
        },
    })
}

pub fn convert_str(
    input: &str,
    title: &str,
    products: &ProductMap,
    options: ConversionOptions,
) -> Result<Conversion, ConversionError> {
    convert_reader(Cursor::new(input), title, products, options)
}

/// `{stem}_formatted.txt`, ignoring directories and a trailing `.gz`
pub fn output_file_name(input: &Path) -> String {
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let without_gz = file_name.strip_suffix(".gz").unwrap_or(&file_name);
    let stem = Path::new(without_gz)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{}{}", stem, OUTPUT_SUFFIX)
}

/// Report title: the output name up to its first underscore
pub fn report_title(output_name: &str) -> &str {
    output_name.split('_').next().unwrap_or(output_name)
}

/// Summary of a converted file
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedFile {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub output_name: String,
    pub title: String,
    pub input_sha256: String,
    pub stats: ConversionStats,
    pub converted_at: chrono::DateTime<chrono::Utc>,
}

/// File-level driver: read input, convert, write `{stem}_formatted.txt`
pub struct FeatureTableProcessor {
    output_dir: PathBuf,
    products: Arc<ProductMap>,
    options: ConversionOptions,
}

impl FeatureTableProcessor {
    pub fn new(output_dir: PathBuf, products: Arc<ProductMap>, options: ConversionOptions) -> Self {
        Self {
            output_dir,
            products,
            options,
        }
    }

    pub fn options(&self) -> ConversionOptions {
        self.options
    }

    /// Convert a file held in memory (plain or gzip) without touching disk
    pub fn convert_bytes(&self, data: &[u8], title: &str) -> Result<Conversion, ConversionError> {
        if data.starts_with(&GZIP_MAGIC) {
            let decoder = flate2::read::MultiGzDecoder::new(data);
            convert_reader(BufReader::new(decoder), title, &self.products, self.options)
        } else {
            convert_reader(data, title, &self.products, self.options)
        }
    }

    /// Convert `input` and write the result under the output directory
    ///
    /// Nothing is written when conversion fails.
    pub fn process_file(&self, input: &Path) -> Result<ProcessedFile> {
        info!("Converting {}", input.display());

        let mut data = Vec::new();
        std::fs::File::open(input)
            .with_context(|| format!("Failed to open {}", input.display()))?
            .read_to_end(&mut data)
            .with_context(|| format!("Failed to read {}", input.display()))?;

        let input_sha256 = format!("{:x}", Sha256::digest(&data));
        let output_name = output_file_name(input);
        let title = report_title(&output_name).to_string();

        let conversion = self
            .convert_bytes(&data, &title)
            .with_context(|| format!("Failed to convert {}", input.display()))?;

        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create {}", self.output_dir.display()))?;
        let output_path = self.output_dir.join(&output_name);
        std::fs::write(&output_path, &conversion.text)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;

        info!(
            "Formatted output saved to {} ({} genes, {} orphans dropped)",
            output_path.display(),
            conversion.stats.grouping.genes,
            conversion.stats.grouping.orphans
        );

        Ok(ProcessedFile {
            input_path: input.to_path_buf(),
            output_path,
            output_name,
            title,
            input_sha256,
            stats: conversion.stats,
            converted_at: chrono::Utc::now(),
        })
    }
}
