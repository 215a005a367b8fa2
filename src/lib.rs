use std::sync::Arc;

pub mod db;
pub mod ocr;
pub mod routes;
pub mod service;
pub mod storage;

use db::DbPool;
use ocr::ReceiptExtractor;
use storage::FileStore;

/// Shared per-process collaborators, constructor-injected into the handlers
/// through axum state.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub files: Arc<FileStore>,
    pub ocr: Arc<dyn ReceiptExtractor>,
}
