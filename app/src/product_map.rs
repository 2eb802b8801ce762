// ==============================================================================
// product_map.rs - Gene -> Product Lookup Table
// ==============================================================================
// Description: Read-only gene name to product description mapping
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Formats:
//   *.json  {"rbcL": "ribulose-1,5-bisphosphate carboxylase/oxygenase large subunit", ...}
//   other   headerless TSV, one "gene<TAB>product" pair per line, '#' comments
// ==============================================================================

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::output::FormatError;

#[derive(Error, Debug)]
pub enum ProductMapError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid JSON product map: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid tab-separated product map: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Empty gene name in product map entry {entry}")]
    EmptyGeneName { entry: usize },
}

/// Loaded once, then shared read-only between conversions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductMap {
    products: HashMap<String, String>,
}

impl ProductMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            products: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into().trim().to_string()))
                .collect(),
        }
    }

    /// Load from disk, choosing the format by file extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProductMapError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let map = if is_json {
            Self::from_json_reader(reader)?
        } else {
            Self::from_tsv_reader(reader)?
        };

        info!("Loaded {} product descriptions from {}", map.len(), path.display());
        Ok(map)
    }

    /// Parse a flat JSON object of gene -> product
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, ProductMapError> {
        let raw: HashMap<String, String> = serde_json::from_reader(reader)?;

        let mut products = HashMap::with_capacity(raw.len());
        for (entry, (gene, product)) in raw.into_iter().enumerate() {
            let gene = gene.trim();
            if gene.is_empty() {
                return Err(ProductMapError::EmptyGeneName { entry: entry + 1 });
            }
            products.insert(gene.to_string(), product.trim().to_string());
        }

        Ok(Self { products })
    }

    /// Parse a headerless two-column tab-separated table
    pub fn from_tsv_reader<R: Read>(reader: R) -> Result<Self, ProductMapError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .quoting(false)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut products = HashMap::new();
        for (idx, row) in csv_reader.deserialize::<(String, String)>().enumerate() {
            let (gene, product) = row?;
            if gene.is_empty() {
                return Err(ProductMapError::EmptyGeneName { entry: idx + 1 });
            }
            if let Some(previous) = products.insert(gene.clone(), product) {
                warn!("Duplicate product entry for '{}', replacing '{}'", gene, previous);
            }
        }

        Ok(Self { products })
    }

    pub fn get(&self, gene: &str) -> Option<&str> {
        self.products.get(gene).map(String::as_str)
    }

    /// Lookup that treats a miss as a formatting failure
    pub fn lookup(&self, gene: &str) -> Result<&str, FormatError> {
        self.get(gene).ok_or_else(|| FormatError::MissingProduct {
            gene: gene.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
