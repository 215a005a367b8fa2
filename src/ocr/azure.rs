//! Azure Document Intelligence client for the `prebuilt-receipt` model.
//!
//! The analyze call is asynchronous on the provider side: the submit request
//! answers 202 with an Operation-Location, which is polled until the
//! operation reaches a terminal status. Callers see a single blocking
//! `extract`; no polling is exposed.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::{ExtractError, ReceiptExtractor};
use crate::db::models::{Receipt, ReceiptItem};

const MODEL_ID: &str = "prebuilt-receipt";
const API_VERSION: &str = "2024-11-30";
const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct AzureExtractor {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl AzureExtractor {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        AzureExtractor {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn analyze(&self, document: &[u8]) -> Result<AnalyzeResult, ExtractError> {
        let url = format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            self.endpoint, MODEL_ID, API_VERSION
        );
        let body = json!({
            "base64Source": base64::engine::general_purpose::STANDARD.encode(document),
        });

        let response = self
            .http
            .post(&url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(ExtractError::Provider(format!(
                "analyze request rejected ({}): {}",
                status, detail
            )));
        }

        let operation_url = response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                ExtractError::Provider("analyze response missing Operation-Location".to_string())
            })?;

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            let operation: AnalyzeOperation = self
                .http
                .get(&operation_url)
                .header("Ocp-Apim-Subscription-Key", &self.api_key)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            match operation.status.as_str() {
                "notStarted" | "running" => continue,
                "succeeded" => {
                    return operation.analyze_result.ok_or_else(|| {
                        ExtractError::Provider(
                            "succeeded operation carried no analyzeResult".to_string(),
                        )
                    });
                }
                other => {
                    let detail = operation
                        .error
                        .map(|e| e.message)
                        .unwrap_or_default();
                    return Err(ExtractError::Provider(format!(
                        "analysis ended with status {}: {}",
                        other, detail
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl ReceiptExtractor for AzureExtractor {
    async fn extract(&self, document: &[u8]) -> Result<Receipt, ExtractError> {
        if document.is_empty() {
            return Err(ExtractError::EmptyDocument);
        }

        let result = self.analyze(document).await?;
        map_receipt(&result)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    error: Option<OperationError>,
    analyze_result: Option<AnalyzeResult>,
}

#[derive(Deserialize)]
struct OperationError {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize, Default)]
struct AnalyzeResult {
    #[serde(default)]
    documents: Vec<AnalyzedDocument>,
}

#[derive(Deserialize)]
struct AnalyzedDocument {
    #[serde(default)]
    fields: HashMap<String, Field>,
}

/// One recognized field. The provider tags each value with its kind; only
/// the kinds the receipt model emits are modeled here.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Field {
    value_string: Option<String>,
    value_date: Option<String>,
    value_number: Option<f64>,
    value_currency: Option<CurrencyValue>,
    value_array: Option<Vec<Field>>,
    value_object: Option<HashMap<String, Field>>,
}

#[derive(Deserialize)]
struct CurrencyValue {
    amount: f64,
}

fn currency_amount(fields: &HashMap<String, Field>, name: &str) -> Option<f64> {
    fields
        .get(name)
        .and_then(|f| f.value_currency.as_ref())
        .map(|c| c.amount)
}

/// Copies recognized fields into the domain shape with null-safe defaults:
/// missing merchant name becomes an empty string, missing date stays absent,
/// missing amounts become zero, a missing tip stays unset. Values are
/// trusted as returned; no currency or locale conversion.
fn map_receipt(result: &AnalyzeResult) -> Result<Receipt, ExtractError> {
    let document = result.documents.first().ok_or(ExtractError::NoReceiptFound)?;
    let fields = &document.fields;

    let mut items = Vec::new();
    if let Some(entries) = fields.get("Items").and_then(|f| f.value_array.as_ref()) {
        for entry in entries {
            let Some(item_fields) = entry.value_object.as_ref() else {
                continue;
            };
            items.push(ReceiptItem {
                name: item_fields
                    .get("Description")
                    .and_then(|f| f.value_string.clone())
                    .unwrap_or_default(),
                quantity: item_fields
                    .get("Quantity")
                    .and_then(|f| f.value_number)
                    .unwrap_or(1.0) as i32,
                unit_price: currency_amount(item_fields, "Price").unwrap_or(0.0),
                total: currency_amount(item_fields, "TotalPrice").unwrap_or(0.0),
            });
        }
    }

    Ok(Receipt {
        vendor_name: fields
            .get("MerchantName")
            .and_then(|f| f.value_string.clone())
            .unwrap_or_default(),
        receipt_date: fields
            .get("TransactionDate")
            .and_then(|f| f.value_date.as_deref())
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        total_amount: currency_amount(fields, "Total").unwrap_or(0.0),
        tax_amount: currency_amount(fields, "TotalTax").unwrap_or(0.0),
        tip_amount: currency_amount(fields, "Tip"),
        items,
        ..Receipt::default()
    })
}

#[cfg(test)]
mod tests {
    use super::{map_receipt, AnalyzeResult};
    use crate::ocr::ExtractError;
    use chrono::NaiveDate;

    fn parse(json: &str) -> AnalyzeResult {
        serde_json::from_str(json).expect("fixture parses")
    }

    #[test]
    fn maps_all_recognized_fields() {
        let result = parse(
            r#"{
                "documents": [{
                    "fields": {
                        "MerchantName": { "valueString": "Contoso Diner" },
                        "TransactionDate": { "valueDate": "2025-06-14" },
                        "Total": { "valueCurrency": { "amount": 42.75 } },
                        "TotalTax": { "valueCurrency": { "amount": 3.21 } },
                        "Tip": { "valueCurrency": { "amount": 6.00 } },
                        "Items": {
                            "valueArray": [
                                {
                                    "valueObject": {
                                        "Description": { "valueString": "Burger" },
                                        "Quantity": { "valueNumber": 2 },
                                        "Price": { "valueCurrency": { "amount": 11.50 } },
                                        "TotalPrice": { "valueCurrency": { "amount": 23.00 } }
                                    }
                                },
                                {
                                    "valueObject": {
                                        "Description": { "valueString": "Fries" },
                                        "TotalPrice": { "valueCurrency": { "amount": 4.25 } }
                                    }
                                }
                            ]
                        }
                    }
                }]
            }"#,
        );

        let receipt = map_receipt(&result).expect("maps");
        assert_eq!(receipt.vendor_name, "Contoso Diner");
        assert_eq!(
            receipt.receipt_date,
            NaiveDate::from_ymd_opt(2025, 6, 14)
        );
        assert_eq!(receipt.total_amount, 42.75);
        assert_eq!(receipt.tax_amount, 3.21);
        assert_eq!(receipt.tip_amount, Some(6.00));

        assert_eq!(receipt.items.len(), 2);
        assert_eq!(receipt.items[0].name, "Burger");
        assert_eq!(receipt.items[0].quantity, 2);
        assert_eq!(receipt.items[0].unit_price, 11.50);
        assert_eq!(receipt.items[0].total, 23.00);
        // Quantity and Price fall back to their defaults when undetected.
        assert_eq!(receipt.items[1].quantity, 1);
        assert_eq!(receipt.items[1].unit_price, 0.0);
        assert_eq!(receipt.items[1].total, 4.25);
    }

    #[test]
    fn missing_fields_fall_back_to_null_safe_defaults() {
        let result = parse(r#"{ "documents": [{ "fields": {} }] }"#);

        let receipt = map_receipt(&result).expect("maps");
        assert_eq!(receipt.vendor_name, "");
        assert_eq!(receipt.receipt_date, None);
        assert_eq!(receipt.total_amount, 0.0);
        assert_eq!(receipt.tax_amount, 0.0);
        assert_eq!(receipt.tip_amount, None);
        assert!(receipt.items.is_empty());
    }

    #[test]
    fn unparseable_date_stays_absent() {
        let result = parse(
            r#"{
                "documents": [{
                    "fields": {
                        "TransactionDate": { "valueDate": "June 14th" }
                    }
                }]
            }"#,
        );

        let receipt = map_receipt(&result).expect("maps");
        assert_eq!(receipt.receipt_date, None);
    }

    #[test]
    fn zero_documents_is_not_found() {
        let result = parse(r#"{ "documents": [] }"#);
        assert!(matches!(
            map_receipt(&result),
            Err(ExtractError::NoReceiptFound)
        ));
    }
}
