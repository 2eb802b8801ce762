// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for genome annotation file formats
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

pub mod gff3;

pub use gff3::{Gff3Parse, Gff3ParseError, Gff3Parser, ParseStats};
