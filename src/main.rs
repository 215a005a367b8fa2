use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use receipt_scanner::ocr::AzureExtractor;
use receipt_scanner::storage::FileStore;
use receipt_scanner::{db, routes, AppState};

use routes::receipts::MAX_UPLOAD_BYTES;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    // Initialize Tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG")
                .unwrap_or_else(|_| "receipt_scanner=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting receipt scanner API...");

    // Database Setup
    tracing::info!("Initializing database connection pool...");
    let db_pool = db::init_pool().await?;
    db::migrate(&db_pool).await?;
    tracing::info!("Database ready");

    // Uploaded-file storage + public links
    let uploads_dir = env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string());
    let base_url = env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let files = Arc::new(FileStore::new(&uploads_dir, base_url)?);

    // Document-analysis provider
    let ocr_endpoint = env::var("AZURE_FORM_RECOGNIZER_ENDPOINT")
        .expect("AZURE_FORM_RECOGNIZER_ENDPOINT must be set");
    let ocr_api_key = env::var("AZURE_FORM_RECOGNIZER_API_KEY")
        .expect("AZURE_FORM_RECOGNIZER_API_KEY must be set");
    tracing::info!("Using document analysis endpoint: {}", ocr_endpoint);
    let ocr = Arc::new(AzureExtractor::new(ocr_endpoint, ocr_api_key));

    let state = AppState {
        db: db_pool,
        files,
        ocr,
    };

    // CORS: allow-list of origins, Content-Disposition exposed for downloads
    let cors = {
        let origins = env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|v| {
                v.split(',')
                    .filter_map(|s| {
                        let trimmed = s.trim();
                        if trimmed.is_empty() {
                            return None;
                        }
                        match trimmed.parse::<HeaderValue>() {
                            Ok(value) => Some(value),
                            Err(_) => {
                                tracing::warn!("Ignoring invalid ALLOWED_ORIGINS entry: {}", trimmed);
                                None
                            }
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| vec![HeaderValue::from_static("http://localhost:3000")]);

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .expose_headers([header::CONTENT_DISPOSITION])
    };

    let debug_endpoints = env::var("OCR_DEBUG_ENDPOINTS")
        .map(|v| v.eq_ignore_ascii_case("1") || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    // Router Setup
    let mut app = Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/receipt",
            get(routes::receipts::list_receipts).post(routes::receipts::create_receipt),
        )
        .route(
            "/api/receipt/{id}",
            get(routes::receipts::get_receipt)
                .put(routes::receipts::update_receipt)
                .delete(routes::receipts::delete_receipt),
        )
        .route("/api/receipt/parse", post(routes::receipts::parse_receipt));

    if debug_endpoints {
        tracing::warn!("Diagnostic OCR endpoint enabled; error bodies carry full detail");
        app = app.route("/api/receipt/test-ocr", post(routes::receipts::test_ocr));
    }

    let app = app
        .nest_service("/uploads", ServeDir::new(&uploads_dir))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}

async fn health_check() -> &'static str {
    "OK"
}
