use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, Sqlite, Transaction};

use super::models::{Receipt, ReceiptItem};
use super::DbPool;

/// Monetary values are persisted as integer cents so two-decimal amounts
/// round-trip exactly.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

#[derive(FromRow)]
struct ReceiptRow {
    id: i64,
    vendor_name: String,
    receipt_date: Option<NaiveDate>,
    total_cents: i64,
    tax_cents: i64,
    tip_cents: Option<i64>,
    image_path: String,
    created_at: DateTime<Utc>,
}

impl ReceiptRow {
    fn into_receipt(self, items: Vec<ReceiptItem>) -> Receipt {
        Receipt {
            id: self.id,
            vendor_name: self.vendor_name,
            receipt_date: self.receipt_date,
            total_amount: from_cents(self.total_cents),
            tax_amount: from_cents(self.tax_cents),
            tip_amount: self.tip_cents.map(from_cents),
            items,
            image_path: self.image_path,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ItemRow {
    receipt_id: i64,
    name: String,
    quantity: i64,
    unit_price_cents: i64,
    total_cents: i64,
}

impl ItemRow {
    fn into_item(self) -> ReceiptItem {
        ReceiptItem {
            name: self.name,
            quantity: self.quantity as i32,
            unit_price: from_cents(self.unit_price_cents),
            total: from_cents(self.total_cents),
        }
    }
}

/// Re-reads a receipt through the cents conversion so the value handed back to
/// callers matches what a later `get_receipt` returns.
fn persisted_copy(receipt: &Receipt, id: i64, created_at: DateTime<Utc>) -> Receipt {
    Receipt {
        id,
        vendor_name: receipt.vendor_name.clone(),
        receipt_date: receipt.receipt_date,
        total_amount: from_cents(to_cents(receipt.total_amount)),
        tax_amount: from_cents(to_cents(receipt.tax_amount)),
        tip_amount: receipt.tip_amount.map(|t| from_cents(to_cents(t))),
        items: receipt
            .items
            .iter()
            .map(|item| ReceiptItem {
                name: item.name.clone(),
                quantity: item.quantity,
                unit_price: from_cents(to_cents(item.unit_price)),
                total: from_cents(to_cents(item.total)),
            })
            .collect(),
        image_path: receipt.image_path.clone(),
        created_at,
    }
}

async fn insert_items(
    tx: &mut Transaction<'_, Sqlite>,
    receipt_id: i64,
    items: &[ReceiptItem],
) -> anyhow::Result<()> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO receipt_items (receipt_id, position, name, quantity, unit_price_cents, total_cents)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(receipt_id)
        .bind(position as i64)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(to_cents(item.unit_price))
        .bind(to_cents(item.total))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn load_items(pool: &DbPool, receipt_id: i64) -> anyhow::Result<Vec<ReceiptItem>> {
    let rows: Vec<ItemRow> = sqlx::query_as(
        "SELECT receipt_id, name, quantity, unit_price_cents, total_cents
         FROM receipt_items WHERE receipt_id = ? ORDER BY position",
    )
    .bind(receipt_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ItemRow::into_item).collect())
}

/// All receipts, newest creation time first, items eagerly loaded in
/// submission order.
pub async fn list_receipts(pool: &DbPool) -> anyhow::Result<Vec<Receipt>> {
    let receipt_rows: Vec<ReceiptRow> = sqlx::query_as(
        "SELECT id, vendor_name, receipt_date, total_cents, tax_cents, tip_cents, image_path, created_at
         FROM receipts ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;

    let item_rows: Vec<ItemRow> = sqlx::query_as(
        "SELECT receipt_id, name, quantity, unit_price_cents, total_cents
         FROM receipt_items ORDER BY receipt_id, position",
    )
    .fetch_all(pool)
    .await?;

    let mut items_by_receipt: HashMap<i64, Vec<ReceiptItem>> = HashMap::new();
    for row in item_rows {
        items_by_receipt
            .entry(row.receipt_id)
            .or_default()
            .push(row.into_item());
    }

    Ok(receipt_rows
        .into_iter()
        .map(|row| {
            let items = items_by_receipt.remove(&row.id).unwrap_or_default();
            row.into_receipt(items)
        })
        .collect())
}

pub async fn get_receipt(pool: &DbPool, id: i64) -> anyhow::Result<Option<Receipt>> {
    let row: Option<ReceiptRow> = sqlx::query_as(
        "SELECT id, vendor_name, receipt_date, total_cents, tax_cents, tip_cents, image_path, created_at
         FROM receipts WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let items = load_items(pool, row.id).await?;
    Ok(Some(row.into_receipt(items)))
}

/// Inserts the receipt and its items in one transaction and returns the
/// persisted record with its assigned id.
pub async fn create_receipt(pool: &DbPool, receipt: &Receipt) -> anyhow::Result<Receipt> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO receipts (vendor_name, receipt_date, total_cents, tax_cents, tip_cents, image_path, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&receipt.vendor_name)
    .bind(receipt.receipt_date)
    .bind(to_cents(receipt.total_amount))
    .bind(to_cents(receipt.tax_amount))
    .bind(receipt.tip_amount.map(to_cents))
    .bind(&receipt.image_path)
    .bind(receipt.created_at)
    .execute(&mut *tx)
    .await?;

    let id = result.last_insert_rowid();
    insert_items(&mut tx, id, &receipt.items).await?;
    tx.commit().await?;

    Ok(persisted_copy(receipt, id, receipt.created_at))
}

/// Replaces every scalar field of the stored record (creation time excepted)
/// and wholesale-replaces the item collection. Returns `None` when the id is
/// unknown.
pub async fn update_receipt(pool: &DbPool, receipt: &Receipt) -> anyhow::Result<Option<Receipt>> {
    let mut tx = pool.begin().await?;

    let existing: Option<(DateTime<Utc>,)> =
        sqlx::query_as("SELECT created_at FROM receipts WHERE id = ?")
            .bind(receipt.id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some((created_at,)) = existing else {
        return Ok(None);
    };

    sqlx::query(
        "UPDATE receipts SET vendor_name = ?, receipt_date = ?, total_cents = ?, tax_cents = ?, tip_cents = ?, image_path = ?
         WHERE id = ?",
    )
    .bind(&receipt.vendor_name)
    .bind(receipt.receipt_date)
    .bind(to_cents(receipt.total_amount))
    .bind(to_cents(receipt.tax_amount))
    .bind(receipt.tip_amount.map(to_cents))
    .bind(&receipt.image_path)
    .bind(receipt.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM receipt_items WHERE receipt_id = ?")
        .bind(receipt.id)
        .execute(&mut *tx)
        .await?;
    insert_items(&mut tx, receipt.id, &receipt.items).await?;

    tx.commit().await?;

    Ok(Some(persisted_copy(receipt, receipt.id, created_at)))
}

pub async fn delete_receipt(pool: &DbPool, id: i64) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM receipt_items WHERE receipt_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM receipts WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}
