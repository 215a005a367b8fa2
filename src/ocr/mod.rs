use async_trait::async_trait;
use thiserror::Error;

use crate::db::models::Receipt;

pub mod azure;

pub use azure::AzureExtractor;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("document stream cannot be empty")]
    EmptyDocument,
    #[error("no receipt found in the document")]
    NoReceiptFound,
    #[error("document analysis failed: {0}")]
    Provider(String),
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Capability boundary around the external document-analysis provider so the
/// HTTP layer can be exercised against a mock. Returns an unsaved receipt:
/// no id, no stored-file reference.
#[async_trait]
pub trait ReceiptExtractor: Send + Sync {
    async fn extract(&self, document: &[u8]) -> Result<Receipt, ExtractError>;
}
