// ==============================================================================
// handlers.rs - API Request Handlers
// ==============================================================================
// Description: HTTP request handlers for GFF3 upload and feature table download
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use feature_table::ConversionError;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{models::*, state::AppState, validator::FileValidator};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Root endpoint - API information
pub async fn root() -> Json<ApiInfoResponse> {
    Json(ApiInfoResponse {
        service: "Feature Table API Gateway",
        version: VERSION,
        endpoints: vec![
            "/health - Health check",
            "/upload - Upload a GFF3 file, returns the feature table name (POST)",
            "/download/{filename} - Download a converted feature table (GET)",
        ],
    })
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: VERSION,
        products_loaded: state.product_count(),
        timestamp: Utc::now(),
    })
}

/// Upload endpoint: store the GFF3 file, convert it, return the output name
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    info!("Received upload request");

    let mut upload: Option<(String, axum::body::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                if filename.is_empty() {
                    return Err(AppError::BadRequest("No selected file".to_string()));
                }
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?;
                upload = Some((filename, data));
            }
            _ => {
                warn!("Unknown multipart field: {}", name);
            }
        }
    }

    let (filename, data) = upload.ok_or_else(|| AppError::BadRequest("No file part".to_string()))?;

    // SECURITY: Validate file before writing to disk
    let validated = FileValidator::new()
        .validate_upload(&filename, &data)
        .map_err(|e| AppError::BadRequest(format!("Invalid GFF3 file: {}", e)))?;

    info!(
        "Upload validated: {} (uploaded as {}, .{}, {} bytes, SHA256: {})",
        validated.safe_name,
        filename,
        validated.extension,
        validated.size,
        &validated.hash_sha256[..16]
    );

    // Per-upload directory so concurrent uploads of the same name don't collide
    let upload_dir = state.upload_dir().join(Uuid::new_v4().to_string());
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create upload directory: {}", e)))?;

    let file_path = upload_dir.join(&validated.safe_name);
    let mut file = tokio::fs::File::create(&file_path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create file: {}", e)))?;
    file.write_all(&data)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to write file: {}", e)))?;
    file.flush()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to write file: {}", e)))?;

    // Conversion is CPU-bound and synchronous
    let processor = state.processor();
    let processed = tokio::task::spawn_blocking(move || processor.process_file(&file_path))
        .await
        .map_err(|e| AppError::Internal(format!("Conversion task failed: {}", e)))?
        .map_err(|e| match e.downcast_ref::<ConversionError>() {
            Some(conversion) => AppError::Conversion {
                kind: conversion.kind(),
                message: conversion.to_string(),
            },
            None => AppError::Internal(format!("{:#}", e)),
        })?;

    info!(
        "Converted {} -> {} ({} genes)",
        validated.safe_name, processed.output_name, processed.stats.grouping.genes
    );

    Ok(Json(UploadResponse {
        formatted_output_path: processed.output_name,
    }))
}

/// Download endpoint: stream a converted file as an attachment
pub async fn download_file(
    Path(filename): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    if !FileValidator::new().is_safe_download_name(&filename) {
        return Err(AppError::BadRequest("Invalid file name".to_string()));
    }

    let file_path = state.output_dir().join(&filename);

    let file = match tokio::fs::File::open(&file_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AppError::NotFound),
        Err(e) => return Err(AppError::Internal(format!("Failed to open file: {}", e))),
    };

    // Get file metadata for Content-Length
    let file_size = file
        .metadata()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to get file metadata: {}", e)))?
        .len();

    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file_size));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
            .map_err(|e| AppError::Internal(format!("Invalid header value: {}", e)))?,
    );

    info!("Serving download: {} ({} bytes)", filename, file_size);

    Ok((headers, body).into_response())
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    NotFound,
    BadRequest(String),
    /// The upload was readable but could not be converted
    Conversion { kind: &'static str, message: String },
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, ErrorResponse::new("Resource not found")),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg)),
            AppError::Conversion { kind, message } => {
                warn!("Conversion failed ({}): {}", kind, message);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorResponse::with_details(kind, message),
                )
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
