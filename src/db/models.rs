use serde::{Deserialize, Serialize};
use chrono::{NaiveDate, DateTime, Utc};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ReceiptItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub unit_price: f64,
    #[serde(default)]
    pub total: f64,
}

/// One scanned purchase document. `id` and `created_at` are assigned
/// server-side at persistence time; callers cannot change either afterwards.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Receipt {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub vendor_name: String,
    #[serde(default)]
    pub receipt_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub tax_amount: f64,
    #[serde(default)]
    pub tip_amount: Option<f64>,
    #[serde(default)]
    pub items: Vec<ReceiptItem>,
    #[serde(default)]
    pub image_path: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Default for Receipt {
    fn default() -> Self {
        Receipt {
            id: 0,
            vendor_name: String::new(),
            receipt_date: None,
            total_amount: 0.0,
            tax_amount: 0.0,
            tip_amount: None,
            items: Vec::new(),
            image_path: String::new(),
            created_at: Utc::now(),
        }
    }
}
