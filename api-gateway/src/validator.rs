// ==============================================================================
// validator.rs - File Upload Validation (API Gateway)
// ==============================================================================
// Description: Validates uploaded GFF3 files at API layer before writing to disk
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// Security: Allowlist-only file types, magic number verification, size limits
// ==============================================================================

use anyhow::Result;
use axum::body::Bytes;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use tracing::{debug, info};

/// Largest accepted upload (also the request body limit)
pub const MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024; // 100 MB

const GFF3_COLUMNS: usize = 9;

#[derive(Debug)]
pub struct ValidatedFile {
    pub safe_name: String,
    pub extension: String,
    pub size: usize,
    pub hash_sha256: String,
}

pub struct FileValidator {
    allowed_types: HashMap<String, Vec<u8>>,
}

impl FileValidator {
    pub fn new() -> Self {
        let mut allowed_types = HashMap::new();

        // Plain text annotations (no specific magic number)
        allowed_types.insert("gff".to_string(), vec![]);
        allowed_types.insert("gff3".to_string(), vec![]);
        allowed_types.insert("txt".to_string(), vec![]);

        // Gzip compressed annotations
        allowed_types.insert("gff.gz".to_string(), vec![0x1f, 0x8b, 0x08]);
        allowed_types.insert("gff3.gz".to_string(), vec![0x1f, 0x8b, 0x08]);

        Self { allowed_types }
    }

    /// Validate file upload from multipart form data
    pub fn validate_upload(&self, filename: &str, file_data: &Bytes) -> Result<ValidatedFile> {
        info!("Validating file: {}", filename);

        // 1. Size check (BEFORE any processing)
        let size = file_data.len();
        if size > MAX_UPLOAD_SIZE {
            anyhow::bail!("File too large: {} bytes (max: {} bytes)", size, MAX_UPLOAD_SIZE);
        }
        debug!("Size check passed: {} bytes", size);

        // 2. Filename sanitization
        let safe_name = self.sanitize_filename(filename)?;
        debug!("Sanitized filename: {}", safe_name);

        // 3. Extension check (allowlist)
        let ext = self.get_extension(&safe_name)?;
        let Some(expected_magic) = self.allowed_types.get(&ext) else {
            anyhow::bail!("Invalid file type: .{}", ext);
        };
        debug!("Extension check passed: .{}", ext);

        // 4. Magic number verification
        if !expected_magic.is_empty() {
            if !self.verify_magic_number(expected_magic, file_data) {
                anyhow::bail!("Magic number mismatch for .{} file", ext);
            }
            debug!("Magic number check passed");
        }

        // 5. Content validation (first feature row must have 9 columns)
        if ext.ends_with(".gz") {
            self.validate_gff3_format(flate2::read::MultiGzDecoder::new(&file_data[..]))?;
        } else {
            self.validate_gff3_format(&file_data[..])?;
        }
        debug!("Content validation passed");

        // 6. Compute SHA-256 hash
        let hash = self.compute_sha256(file_data);
        debug!("SHA-256: {}", hash);

        Ok(ValidatedFile {
            safe_name,
            extension: ext,
            size,
            hash_sha256: hash,
        })
    }

    /// Check a name requested through `/download/{filename}`
    pub fn is_safe_download_name(&self, name: &str) -> bool {
        matches!(self.sanitize_filename(name), Ok(safe) if safe == name) && !name.contains("..")
    }

    fn sanitize_filename(&self, name: &str) -> Result<String> {
        // Remove path separators, null bytes, control characters
        let safe = name
            .replace(['/', '\\', '\0'], "_")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.' || *c == '-')
            .collect::<String>();

        // Limit length to 255 characters
        let truncated: String = safe.chars().take(255).collect();

        // Must not be empty after sanitization
        if truncated.is_empty() {
            anyhow::bail!("Invalid filename after sanitization");
        }

        // Must not start with . (hidden file)
        if truncated.starts_with('.') {
            anyhow::bail!("Filename cannot start with '.'");
        }

        Ok(truncated)
    }

    fn get_extension(&self, filename: &str) -> Result<String> {
        let lower = filename.to_lowercase();

        // Handle compound extensions like .gff3.gz
        for compound in ["gff3.gz", "gff.gz"] {
            if lower.ends_with(&format!(".{}", compound)) {
                return Ok(compound.to_string());
            }
        }

        // Single extension
        match lower.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => Ok(ext.to_string()),
            _ => anyhow::bail!("No file extension found"),
        }
    }

    fn verify_magic_number(&self, expected: &[u8], actual: &[u8]) -> bool {
        expected.len() <= actual.len()
            && expected.iter().zip(actual.iter()).all(|(e, a)| e == a)
    }

    fn validate_gff3_format<R: Read>(&self, data: R) -> Result<()> {
        let reader = BufReader::new(data);

        // Only check the first 100 lines
        for line in reader.lines().take(100) {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let columns = line.split('\t').count();
            if columns != GFF3_COLUMNS {
                anyhow::bail!(
                    "Invalid GFF3 format: expected {} tab-separated columns, found {}",
                    GFF3_COLUMNS,
                    columns
                );
            }
            return Ok(());
        }

        anyhow::bail!("File contains no feature rows")
    }

    fn compute_sha256(&self, data: &Bytes) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    }
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new()
    }
}
