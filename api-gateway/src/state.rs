// ==============================================================================
// state.rs - Application State Management
// ==============================================================================
// Description: Gateway configuration and shared state (dirs, product map)
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use feature_table::{ConversionOptions, FeatureTableProcessor, ProductMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Gateway settings, read from the environment
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub static_dir: PathBuf,
    pub product_map_path: PathBuf,
    pub cors_origins: Vec<String>,
    pub options: ConversionOptions,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("FEATURE_TABLE_PORT") {
            Ok(value) => value
                .parse()
                .with_context(|| format!("Invalid FEATURE_TABLE_PORT '{}'", value))?,
            Err(_) => 8099,
        };

        let repeat_merge = match std::env::var("REPEAT_MERGE_POLICY") {
            Ok(value) => value.parse().map_err(anyhow::Error::msg)?,
            Err(_) => Default::default(),
        };
        let repeat_notes = match std::env::var("REPEAT_NOTE_POLICY") {
            Ok(value) => value.parse().map_err(anyhow::Error::msg)?,
            Err(_) => Default::default(),
        };

        // Origins are configured via CORS_ALLOWED_ORIGINS env var (comma-separated)
        let cors_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            port,
            upload_dir: env_path("UPLOAD_DIR", "uploads"),
            output_dir: env_path("OUTPUT_DIR", "outputs"),
            static_dir: env_path("STATIC_DIR", "static"),
            product_map_path: env_path("PRODUCT_MAP_PATH", "gene_product_map.json"),
            cors_origins,
            options: ConversionOptions {
                repeat_merge,
                repeat_notes,
            },
        })
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    PathBuf::from(std::env::var(key).unwrap_or_else(|_| default.to_string()))
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    static_dir: PathBuf,
    product_count: usize,
    processor: Arc<FeatureTableProcessor>,
}

impl AppState {
    /// Create directories and load the product map
    ///
    /// The product map is loaded once here and never changes afterwards.
    pub async fn new(config: &GatewayConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.upload_dir)
            .await
            .context("Failed to create upload directory")?;
        tokio::fs::create_dir_all(&config.output_dir)
            .await
            .context("Failed to create output directory")?;

        let product_map_path = config.product_map_path.clone();
        let products = tokio::task::spawn_blocking(move || ProductMap::load(&product_map_path))
            .await
            .context("Product map loader panicked")?
            .with_context(|| {
                format!("Failed to load product map {}", config.product_map_path.display())
            })?;

        info!(
            "Loaded {} gene products; uploads -> {}, outputs -> {}",
            products.len(),
            config.upload_dir.display(),
            config.output_dir.display()
        );

        let product_count = products.len();
        let processor = FeatureTableProcessor::new(
            config.output_dir.clone(),
            Arc::new(products),
            config.options,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                upload_dir: config.upload_dir.clone(),
                output_dir: config.output_dir.clone(),
                static_dir: config.static_dir.clone(),
                product_count,
                processor: Arc::new(processor),
            }),
        })
    }

    /// Get upload directory
    pub fn upload_dir(&self) -> &Path {
        &self.inner.upload_dir
    }

    /// Get output directory
    pub fn output_dir(&self) -> &Path {
        &self.inner.output_dir
    }

    pub fn static_dir(&self) -> &Path {
        &self.inner.static_dir
    }

    pub fn product_count(&self) -> usize {
        self.inner.product_count
    }

    /// Shared converter (cloned into blocking tasks)
    pub fn processor(&self) -> Arc<FeatureTableProcessor> {
        Arc::clone(&self.inner.processor)
    }
}
