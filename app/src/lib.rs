// ==============================================================================
// lib.rs - Feature Table Library
// ==============================================================================
// Description: Library interface for GFF3 -> feature table conversion
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

pub mod parsers;
pub mod models;
pub mod orientation;
pub mod grouping;
pub mod product_map;
pub mod output;
pub mod processor;

pub use grouping::{GeneGrouper, Grouping, GroupingError, RepeatMergePolicy};
pub use models::{Feature, FeatureKind, GeneRecord, Strand, SubFeatureSpan};
pub use output::{FeatureTableWriter, FormatError, RepeatNotePolicy};
pub use processor::{
    convert_reader, convert_str, Conversion, ConversionError, ConversionOptions,
    FeatureTableProcessor, ProcessedFile,
};
pub use product_map::{ProductMap, ProductMapError};
