// ==============================================================================
// parsers/gff3.rs - GFF3 Annotation Parser
// ==============================================================================
// Description: Parser for GFF3 feature rows feeding the feature table pipeline
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Format: Tab-delimited text, 9 columns, '#' comments, no header row
// Example:
//   ##gff-version 3
//   NC_000932.1    RefSeq    region    1       154478    .    +    .    ID=NC_000932.1:1..154478
//   NC_000932.1    RefSeq    gene      54775   56205     .    -    .    ID=gene-rbcL;Name=rbcL
//   NC_000932.1    RefSeq    CDS       54775   56205     .    -    0    ID=cds-rbcL;Parent=gene-rbcL
// ==============================================================================

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Feature, FeatureKind, Strand};

/// Row types dropped before anything else looks at them
const FILTERED_TYPES: [&str; 3] = ["region", "source", "intron"];

const COLUMN_COUNT: usize = 9;

/// Errors that can occur during GFF3 parsing
#[derive(Error, Debug)]
pub enum Gff3ParseError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed record at line {line}: {details}")]
    MalformedRecord { line: usize, details: String },
}

/// Row counters reported alongside the parsed features
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ParseStats {
    /// Non-comment, non-blank lines seen
    pub data_lines: usize,
    /// Rows returned as features
    pub kept: usize,
    /// `region` / `source` / `intron` rows
    pub filtered: usize,
    /// Well-formed rows of a type the report does not use (mRNA, exon, ...)
    pub ignored: usize,
}

/// Result of parsing one GFF3 document
#[derive(Debug, Clone, Default)]
pub struct Gff3Parse {
    /// Retained rows in file order
    pub features: Vec<Feature>,
    pub stats: ParseStats,
}

/// Parser for GFF3 annotation files
#[derive(Debug, Clone, Default)]
pub struct Gff3Parser;

impl Gff3Parser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a GFF3 file from disk
    pub fn parse(&self, path: impl AsRef<Path>) -> Result<Gff3Parse, Gff3ParseError> {
        let file = File::open(path.as_ref())?;
        self.parse_reader(BufReader::new(file))
    }

    /// Parse GFF3 rows from any buffered reader
    ///
    /// Blank lines and lines starting with `#` are skipped. A `##FASTA`
    /// pragma ends the annotation section. Row order is preserved: the
    /// grouping engine attaches sub-features to the gene that precedes them.
    pub fn parse_reader<R: BufRead>(&self, mut reader: R) -> Result<Gff3Parse, Gff3ParseError> {
        let mut parsed = Gff3Parse::default();
        let mut buf = Vec::new();
        let mut line_number = 0;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line_number += 1;

            let line = std::str::from_utf8(&buf)
                .map_err(|e| malformed(line_number, format!("invalid UTF-8: {}", e)))?;
            let trimmed = line.trim();

            if trimmed.starts_with("##FASTA") {
                debug!("FASTA section starts at line {}, stopping", line_number);
                break;
            }
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            parsed.stats.data_lines += 1;

            match self.parse_line(line, line_number)? {
                ParsedLine::Feature(feature) => {
                    parsed.stats.kept += 1;
                    parsed.features.push(feature);
                }
                ParsedLine::Filtered => parsed.stats.filtered += 1,
                ParsedLine::Ignored => parsed.stats.ignored += 1,
            }
        }

        info!(
            "Parsed GFF3: {} data lines, {} kept, {} filtered, {} ignored",
            parsed.stats.data_lines, parsed.stats.kept, parsed.stats.filtered, parsed.stats.ignored
        );

        Ok(parsed)
    }

    /// Parse a single row
    fn parse_line(&self, line: &str, line_number: usize) -> Result<ParsedLine, Gff3ParseError> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();

        if fields.len() != COLUMN_COUNT {
            return Err(malformed(
                line_number,
                format!("Expected {} tab-delimited fields, found {}", COLUMN_COUNT, fields.len()),
            ));
        }

        // seqid, source, score and phase are not used
        let ty = fields[2].trim();
        let start = parse_coordinate(fields[3], "start", line_number)?;
        let end = parse_coordinate(fields[4], "end", line_number)?;
        let strand_str = fields[6].trim();
        let attributes = fields[8];

        if FILTERED_TYPES.contains(&ty) {
            return Ok(ParsedLine::Filtered);
        }

        let strand = Strand::from_gff(strand_str).ok_or_else(|| {
            malformed(line_number, format!("Invalid strand '{}'", strand_str))
        })?;

        let Some(kind) = FeatureKind::from_gff_type(ty) else {
            debug!("Line {}: ignoring feature type '{}'", line_number, ty);
            return Ok(ParsedLine::Ignored);
        };

        let name = attribute_name(attributes);
        if kind == FeatureKind::Gene && name.is_none() {
            return Err(malformed(line_number, "gene row has no Name attribute".to_string()));
        }

        Ok(ParsedLine::Feature(Feature {
            kind,
            start,
            end,
            strand,
            name,
            line: line_number,
        }))
    }
}

enum ParsedLine {
    Feature(Feature),
    Filtered,
    Ignored,
}

fn malformed(line: usize, details: String) -> Gff3ParseError {
    Gff3ParseError::MalformedRecord { line, details }
}

fn parse_coordinate(value: &str, column: &str, line_number: usize) -> Result<u64, Gff3ParseError> {
    let value = value.trim();
    value.parse::<u64>().map_err(|_| {
        malformed(line_number, format!("Invalid {} coordinate '{}'", column, value))
    })
}

/// Value of the first `Name=` attribute, up to the next `;`
pub fn attribute_name(attributes: &str) -> Option<String> {
    attributes
        .split(';')
        .filter_map(|pair| pair.trim().strip_prefix("Name="))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}
