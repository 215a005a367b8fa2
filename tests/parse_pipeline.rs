use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use receipt_scanner::db::models::Receipt;
use receipt_scanner::ocr::{ExtractError, ReceiptExtractor};
use receipt_scanner::storage::FileStore;
use receipt_scanner::{db, service};

struct FixedExtractor {
    calls: AtomicUsize,
}

#[async_trait]
impl ReceiptExtractor for FixedExtractor {
    async fn extract(&self, document: &[u8]) -> Result<Receipt, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if document.is_empty() {
            return Err(ExtractError::EmptyDocument);
        }
        Ok(Receipt {
            vendor_name: "Corner Cafe".to_string(),
            total_amount: 18.20,
            tax_amount: 1.20,
            ..Receipt::default()
        })
    }
}

struct FailingExtractor {
    calls: AtomicUsize,
}

#[async_trait]
impl ReceiptExtractor for FailingExtractor {
    async fn extract(&self, _document: &[u8]) -> Result<Receipt, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ExtractError::Provider("rate limited".to_string()))
    }
}

async fn test_pool() -> db::DbPool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect in-memory sqlite");
    db::migrate(&pool).await.expect("apply schema");
    pool
}

#[tokio::test]
async fn parse_flow_extracts_then_stores_the_upload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = FileStore::new(dir.path(), "http://localhost:8080").expect("store");
    let extractor: Arc<dyn ReceiptExtractor> = Arc::new(FixedExtractor {
        calls: AtomicUsize::new(0),
    });

    // The parse endpoint's pipeline: extract, save, attach the public URL.
    let document = b"fake scanned bytes".to_vec();
    let mut receipt = extractor.extract(&document).await.expect("extract");
    let stored_name = files.save(&document, "lunch.png").await.expect("save");
    receipt.image_path = files.file_url(&stored_name);

    assert_eq!(receipt.vendor_name, "Corner Cafe");
    assert_eq!(receipt.id, 0, "parse returns an unsaved receipt");
    assert!(receipt.image_path.ends_with(&stored_name));
    assert!(stored_name.ends_with(".png"));

    let on_disk = tokio::fs::read(dir.path().join(&stored_name)).await.expect("read back");
    assert_eq!(on_disk, document);
}

#[tokio::test]
async fn empty_document_is_an_input_error() {
    let extractor = FixedExtractor {
        calls: AtomicUsize::new(0),
    };
    let outcome = extractor.extract(&[]).await;
    assert!(matches!(outcome, Err(ExtractError::EmptyDocument)));
}

#[tokio::test]
async fn provider_failures_surface_without_retry() {
    let extractor = FailingExtractor {
        calls: AtomicUsize::new(0),
    };

    let outcome = extractor.extract(b"bytes").await;
    assert!(matches!(outcome, Err(ExtractError::Provider(_))));
    assert_eq!(
        extractor.calls.load(Ordering::SeqCst),
        1,
        "a failed extraction is attempted exactly once"
    );
}

#[tokio::test]
async fn deleting_a_receipt_also_removes_its_backing_file() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let files = FileStore::new(dir.path(), "http://localhost:8080").expect("store");

    let stored_name = files.save(b"scan", "receipt.pdf").await.expect("save");
    let receipt = Receipt {
        vendor_name: "Acme".to_string(),
        image_path: files.file_url(&stored_name),
        ..Receipt::default()
    };
    let created = service::create_receipt(&pool, receipt).await.expect("create");

    // The delete endpoint derives the stored name from the last path
    // segment of image_path, removes the file, then removes the record.
    let stored = service::get_receipt(&pool, created.id)
        .await
        .expect("get")
        .expect("receipt present");
    let file_name = stored.image_path.rsplit('/').next().unwrap_or_default();
    assert_eq!(file_name, stored_name);

    files.delete(file_name).await.expect("file delete");
    assert!(service::delete_receipt(&pool, created.id).await.expect("record delete"));

    assert!(!dir.path().join(&stored_name).exists());
    assert!(service::get_receipt(&pool, created.id).await.expect("get").is_none());

    // A second pass over the same name stays silent: the file is already
    // gone and that is not an error.
    files.delete(&stored_name).await.expect("idempotent file delete");
}

#[tokio::test]
async fn receipt_without_stored_file_deletes_cleanly() {
    let pool = test_pool().await;
    let created = service::create_receipt(
        &pool,
        Receipt {
            vendor_name: "No Upload".to_string(),
            ..Receipt::default()
        },
    )
    .await
    .expect("create");

    let stored = service::get_receipt(&pool, created.id)
        .await
        .expect("get")
        .expect("receipt present");
    let file_name = stored.image_path.rsplit('/').next().unwrap_or_default();
    assert!(file_name.is_empty(), "no parseable stored name is a no-op");

    assert!(service::delete_receipt(&pool, created.id).await.expect("delete"));
}
