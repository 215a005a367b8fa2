//! Thin orchestration over the receipt repository: stamps server-side
//! creation timestamps and guards the path-id/body-id contract on update.

use chrono::Utc;

use crate::db::models::Receipt;
use crate::db::{self, DbPool};

pub async fn list_receipts(pool: &DbPool) -> anyhow::Result<Vec<Receipt>> {
    db::receipts::list_receipts(pool).await
}

pub async fn get_receipt(pool: &DbPool, id: i64) -> anyhow::Result<Option<Receipt>> {
    db::receipts::get_receipt(pool, id).await
}

/// Creation time is always the current server time; any caller-supplied
/// value is ignored.
pub async fn create_receipt(pool: &DbPool, mut receipt: Receipt) -> anyhow::Result<Receipt> {
    receipt.created_at = Utc::now();
    db::receipts::create_receipt(pool, &receipt).await
}

/// Returns `None` when the path id and the record's embedded id disagree;
/// the store is left untouched in that case.
pub async fn update_receipt(
    pool: &DbPool,
    id: i64,
    receipt: Receipt,
) -> anyhow::Result<Option<Receipt>> {
    if id != receipt.id {
        return Ok(None);
    }
    db::receipts::update_receipt(pool, &receipt).await
}

pub async fn delete_receipt(pool: &DbPool, id: i64) -> anyhow::Result<bool> {
    db::receipts::delete_receipt(pool, id).await
}
