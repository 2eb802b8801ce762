// ==============================================================================
// models.rs - Annotation Data Models
// ==============================================================================
// Description: Feature, span and gene record types shared by the pipeline
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};

/// Feature types that survive parsing and reach the grouping engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    Gene,
    Cds,
    Trna,
    Rrna,
    RepeatRegion,
}

impl FeatureKind {
    /// Map a GFF3 type column to a kind, `None` for types the report does not use
    pub fn from_gff_type(ty: &str) -> Option<Self> {
        match ty {
            "gene" => Some(FeatureKind::Gene),
            "CDS" => Some(FeatureKind::Cds),
            "tRNA" => Some(FeatureKind::Trna),
            "rRNA" => Some(FeatureKind::Rrna),
            "repeat_region" => Some(FeatureKind::RepeatRegion),
            _ => None,
        }
    }

    /// Literal type string used in both GFF3 and the feature table
    pub fn label(&self) -> &'static str {
        match self {
            FeatureKind::Gene => "gene",
            FeatureKind::Cds => "CDS",
            FeatureKind::Trna => "tRNA",
            FeatureKind::Rrna => "rRNA",
            FeatureKind::RepeatRegion => "repeat_region",
        }
    }

    pub fn is_sub_feature(&self) -> bool {
        !matches!(self, FeatureKind::Gene)
    }
}

/// Strand column of a GFF3 row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strand {
    /// `+`
    Forward,
    /// `-`
    Reverse,
    /// `.` (unstranded) or `?` (unknown); treated like forward
    Unknown,
}

impl Strand {
    pub fn from_gff(value: &str) -> Option<Self> {
        match value {
            "+" => Some(Strand::Forward),
            "-" => Some(Strand::Reverse),
            "." | "?" => Some(Strand::Unknown),
            _ => None,
        }
    }
}

/// One retained GFF3 row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub kind: FeatureKind,
    /// 1-based start; after orientation this is the 5' boundary
    pub start: u64,
    /// 1-based inclusive end; after orientation this is the 3' boundary
    pub end: u64,
    pub strand: Strand,
    /// Value of the `Name=` attribute (always present for genes)
    pub name: Option<String>,
    /// Physical line in the input (1-based), kept for diagnostics
    pub line: usize,
}

/// Merged contiguous interval of a single kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubFeatureSpan {
    pub kind: FeatureKind,
    pub start: u64,
    pub end: u64,
}

impl SubFeatureSpan {
    /// True when `start` begins exactly one base after this span ends
    pub fn is_adjacent_to(&self, start: u64) -> bool {
        self.end.checked_add(1) == Some(start)
    }
}

/// A gene with the sub-features that followed it in the input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneRecord {
    pub gene_name: String,
    pub start: u64,
    pub end: u64,
    pub cds: Vec<SubFeatureSpan>,
    pub trna: Vec<SubFeatureSpan>,
    pub rrna: Vec<SubFeatureSpan>,
    pub repeat_region: Vec<SubFeatureSpan>,
}

impl GeneRecord {
    pub fn new(gene_name: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            gene_name: gene_name.into(),
            start,
            end,
            cds: Vec::new(),
            trna: Vec::new(),
            rrna: Vec::new(),
            repeat_region: Vec::new(),
        }
    }

    /// Span list for a sub-feature kind (empty for `Gene`)
    pub fn spans(&self, kind: FeatureKind) -> &[SubFeatureSpan] {
        match kind {
            FeatureKind::Gene => &[],
            FeatureKind::Cds => &self.cds,
            FeatureKind::Trna => &self.trna,
            FeatureKind::Rrna => &self.rrna,
            FeatureKind::RepeatRegion => &self.repeat_region,
        }
    }

    /// Mutable span list; `None` for `Gene`
    pub fn spans_mut(&mut self, kind: FeatureKind) -> Option<&mut Vec<SubFeatureSpan>> {
        match kind {
            FeatureKind::Gene => None,
            FeatureKind::Cds => Some(&mut self.cds),
            FeatureKind::Trna => Some(&mut self.trna),
            FeatureKind::Rrna => Some(&mut self.rrna),
            FeatureKind::RepeatRegion => Some(&mut self.repeat_region),
        }
    }

    /// Whether the gene needs a product qualifier (any CDS or RNA span)
    pub fn needs_product(&self) -> bool {
        !(self.cds.is_empty() && self.trna.is_empty() && self.rrna.is_empty())
    }

    pub fn span_count(&self) -> usize {
        self.cds.len() + self.trna.len() + self.rrna.len() + self.repeat_region.len()
    }
}
