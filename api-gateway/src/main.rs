// ==============================================================================
// main.rs - Feature Table API Gateway Entry Point
// ==============================================================================
// Description: Axum web server for GFF3 upload and feature table download
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, Level};

mod handlers;
mod models;
mod state;
mod validator;

use state::{AppState, GatewayConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing (LOG_FORMAT=json for structured logs)
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(false)
            .compact()
            .init();
    }

    info!("Starting Feature Table API Gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = GatewayConfig::from_env().context("Invalid gateway configuration")?;
    info!("Conversion options: {:?}", config.options);

    // Initialize application state (loads the product map once)
    let state = AppState::new(&config)
        .await
        .context("Failed to initialize application state")?;

    // Build router with all endpoints
    let app = build_router(state, &config.cors_origins);

    // Bind server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("API Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server
    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let allowed_origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_credentials(false)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        // Browsers need this to read the attachment name
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    // Static front end (upload form) for everything not routed below
    let static_files = ServeDir::new(state.static_dir());

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/upload", post(handlers::upload_file))
        .route("/download/{filename}", get(handlers::download_file))
        .fallback_service(static_files)
        .layer(
            ServiceBuilder::new()
                // Request tracing
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                // Request body size limit (multipart overhead on top of the file)
                .layer(DefaultBodyLimit::max(validator::MAX_UPLOAD_SIZE + 1024 * 1024)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use feature_table::ConversionOptions;
    use models::{ErrorResponse, UploadResponse};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "feature-table-test-boundary";

    const SAMPLE: &str = "\
##gff-version 3
chr\tRefSeq\tgene\t1\t500\t.\t+\t.\tID=gene-abc;Name=abc
chr\tRefSeq\tCDS\t1\t100\t.\t+\t0\tParent=gene-abc
chr\tRefSeq\tCDS\t101\t200\t.\t+\t0\tParent=gene-abc
";

    async fn test_state(dir: &TempDir) -> AppState {
        let products = dir.path().join("products.json");
        std::fs::write(&products, r#"{"abc": "ABC transporter"}"#).unwrap();

        let config = GatewayConfig {
            port: 0,
            upload_dir: dir.path().join("uploads"),
            output_dir: dir.path().join("outputs"),
            static_dir: dir.path().join("static"),
            product_map_path: products,
            cors_origins: vec!["http://localhost:3000".to_string()],
            options: ConversionOptions::default(),
        };
        AppState::new(&config).await.unwrap()
    }

    fn multipart_request(filename: &str, contents: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
             Content-Type: text/plain\r\n\r\n{c}\r\n--{b}--\r\n",
            b = BOUNDARY,
            f = filename,
            c = contents
        );
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_products() {
        let dir = TempDir::new().unwrap();
        let app = build_router(test_state(&dir).await, &[]);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["products_loaded"], 1);
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let dir = TempDir::new().unwrap();
        let app = build_router(test_state(&dir).await, &[]);

        let response = app
            .clone()
            .oneshot(multipart_request("plastome.gff3", SAMPLE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let upload: UploadResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(upload.formatted_output_path, "plastome_formatted.txt");

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/download/{}", upload.formatted_output_path))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"plastome_formatted.txt\""
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(
            text,
            ">feature\tplastome\n1\t500\tgene\n\t\t\tgene\tabc\n1\t200\tCDS\n\
             \t\t\tproduct\tABC transporter\n\t\t\tcodon_start\t1\n\t\t\ttransl_table\t11"
        );
    }

    #[tokio::test]
    async fn test_upload_missing_product_is_unprocessable() {
        let dir = TempDir::new().unwrap();
        let app = build_router(test_state(&dir).await, &[]);

        let input = "chr\t.\tgene\t1\t90\t.\t+\t.\tName=matK\nchr\t.\tCDS\t1\t90\t.\t+\t0\t.\n";
        let response = app.oneshot(multipart_request("matk.gff3", input)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error, "MissingProduct");
        assert!(!dir.path().join("outputs").join("matk_formatted.txt").exists());
    }

    #[tokio::test]
    async fn test_upload_without_file_part() {
        let dir = TempDir::new().unwrap();
        let app = build_router(test_state(&dir).await, &[]);

        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{b}--\r\n",
            b = BOUNDARY
        );
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error, "No file part");
    }

    #[tokio::test]
    async fn test_upload_rejects_non_gff3() {
        let dir = TempDir::new().unwrap();
        let app = build_router(test_state(&dir).await, &[]);

        let response = app
            .oneshot(multipart_request("genome.txt", "rs1\t1\t100\tAA\n"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_missing_file() {
        let dir = TempDir::new().unwrap();
        let app = build_router(test_state(&dir).await, &[]);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/download/nothing_formatted.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_download_rejects_hidden_names() {
        let dir = TempDir::new().unwrap();
        let app = build_router(test_state(&dir).await, &[]);

        let response = app
            .oneshot(Request::builder().uri("/download/.env").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_product_map_fails_startup() {
        let dir = TempDir::new().unwrap();
        let config = GatewayConfig {
            port: 0,
            upload_dir: dir.path().join("uploads"),
            output_dir: dir.path().join("outputs"),
            static_dir: dir.path().join("static"),
            product_map_path: dir.path().join("missing.json"),
            cors_origins: Vec::new(),
            options: ConversionOptions::default(),
        };
        assert!(AppState::new(&config).await.is_err());
    }
}
