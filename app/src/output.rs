// ==============================================================================
// output.rs - Feature Table Output Generation
// ==============================================================================
// Description: Renders grouped gene records as a five-column feature table
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Layout (tabs shown as \t):
//   >feature\tNC_000932
//   54775\t56205\tgene
//   \t\t\tgene\trbcL
//   54775\t56205\tCDS
//   \t\t\tproduct\tribulose bisphosphate carboxylase large chain
//   \t\t\tcodon_start\t1
//   \t\t\ttransl_table\t11
// ==============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::{FeatureKind, GeneRecord, SubFeatureSpan};
use crate::product_map::ProductMap;

const QUALIFIER_INDENT: &str = "\t\t\t";
const CODON_START: u8 = 1;
/// Bacterial, archaeal and plant plastid code
const TRANSL_TABLE: u8 = 11;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("No product description for gene '{gene}'")]
    MissingProduct { gene: String },

    #[error("repeat_region #{ordinal} in gene '{gene}' has no inverted repeat label")]
    UnboundedRepeatRegion { gene: String, ordinal: usize },
}

/// Labelling of repeat_region spans past the A/B pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatNotePolicy {
    /// Only `inverted repeat A` and `B`; a third span is an error
    #[default]
    Strict,
    /// Continue with C, D, ... Z
    Alphabetic,
}

impl RepeatNotePolicy {
    fn max_labels(&self) -> usize {
        match self {
            RepeatNotePolicy::Strict => 2,
            RepeatNotePolicy::Alphabetic => 26,
        }
    }
}

impl std::str::FromStr for RepeatNotePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(RepeatNotePolicy::Strict),
            "alphabetic" => Ok(RepeatNotePolicy::Alphabetic),
            other => Err(format!("unknown repeat note policy '{}'", other)),
        }
    }
}

/// Feature table renderer
///
/// Repeat-region notes are numbered across the whole document, so the
/// ordinal lives on the writer and is reset by every [`render`](Self::render).
pub struct FeatureTableWriter<'a> {
    products: &'a ProductMap,
    repeat_notes: RepeatNotePolicy,
    repeat_ordinal: usize,
}

impl<'a> FeatureTableWriter<'a> {
    pub fn new(products: &'a ProductMap, repeat_notes: RepeatNotePolicy) -> Self {
        Self {
            products,
            repeat_notes,
            repeat_ordinal: 0,
        }
    }

    /// Render one document: header line then one block per gene
    pub fn render(&mut self, title: &str, records: &[GeneRecord]) -> Result<String, FormatError> {
        self.repeat_ordinal = 0;

        let mut lines = Vec::new();
        for record in records {
            self.render_record(record, &mut lines)?;
        }

        debug!(
            "Rendered {} genes into {} lines ({} repeat regions)",
            records.len(),
            lines.len(),
            self.repeat_ordinal
        );

        Ok(format!(">feature\t{}\n{}", title, lines.join("\n")))
    }

    fn render_record(&mut self, record: &GeneRecord, lines: &mut Vec<String>) -> Result<(), FormatError> {
        lines.push(format!("{}\t{}\tgene", record.start, record.end));
        lines.push(qualifier("gene", &record.gene_name));

        if !record.cds.is_empty() {
            push_spans(FeatureKind::Cds, &record.cds, lines);
            let product = self.products.lookup(&record.gene_name)?;
            lines.push(qualifier("product", product));
            lines.push(qualifier("codon_start", CODON_START));
            lines.push(qualifier("transl_table", TRANSL_TABLE));
        }

        for (kind, spans) in [(FeatureKind::Trna, &record.trna), (FeatureKind::Rrna, &record.rrna)] {
            if spans.is_empty() {
                continue;
            }
            push_spans(kind, spans, lines);
            let product = self.products.lookup(&record.gene_name)?;
            lines.push(qualifier("product", product));
        }

        for span in &record.repeat_region {
            self.repeat_ordinal += 1;
            let label = self.repeat_label(&record.gene_name)?;
            lines.push(format!("{}\t{}\t{}", span.start, span.end, FeatureKind::RepeatRegion.label()));
            lines.push(qualifier("note", format!("inverted repeat {}", label)));
        }

        Ok(())
    }

    fn repeat_label(&self, gene: &str) -> Result<char, FormatError> {
        let ordinal = self.repeat_ordinal;
        if ordinal == 0 || ordinal > self.repeat_notes.max_labels() {
            return Err(FormatError::UnboundedRepeatRegion {
                gene: gene.to_string(),
                ordinal,
            });
        }
        // ordinal is 1..=26 here
        Ok(char::from(b'A' + (ordinal - 1) as u8))
    }
}

/// First span carries the feature label, the rest are continuation lines
fn push_spans(kind: FeatureKind, spans: &[SubFeatureSpan], lines: &mut Vec<String>) {
    for (idx, span) in spans.iter().enumerate() {
        if idx == 0 {
            lines.push(format!("{}\t{}\t{}", span.start, span.end, kind.label()));
        } else {
            lines.push(format!("{}\t{}", span.start, span.end));
        }
    }
}

fn qualifier(key: &str, value: impl std::fmt::Display) -> String {
    format!("{}{}\t{}", QUALIFIER_INDENT, key, value)
}
