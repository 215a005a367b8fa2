use axum::{
    extract::{Json, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json as AxumJson},
};
use serde_json::json;

use crate::db::models::Receipt;
use crate::service;
use crate::AppState;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "application/pdf"];

struct Upload {
    data: Vec<u8>,
    content_type: Option<String>,
    file_name: String,
}

async fn read_upload(multipart: &mut Multipart) -> anyhow::Result<Option<Upload>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| anyhow::anyhow!("reading multipart body: {}", e))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| anyhow::anyhow!("reading file field: {}", e))?
            .to_vec();
        return Ok(Some(Upload {
            data,
            content_type,
            file_name,
        }));
    }
    Ok(None)
}

fn validate_upload(upload: &Upload) -> Result<(), &'static str> {
    if upload.data.is_empty() {
        return Err("No file uploaded");
    }
    let declared = upload
        .content_type
        .as_deref()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !ALLOWED_CONTENT_TYPES.contains(&declared.as_str()) {
        return Err("Invalid file type. Only JPEG, PNG and PDF files are allowed.");
    }
    Ok(())
}

pub async fn list_receipts(State(state): State<AppState>) -> impl IntoResponse {
    match service::list_receipts(&state.db).await {
        Ok(receipts) => AxumJson(receipts).into_response(),
        Err(e) => {
            tracing::error!("List receipts failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn get_receipt(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match service::get_receipt(&state.db, id).await {
        Ok(Some(receipt)) => AxumJson(receipt).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!("Get receipt {} failed: {}", id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn create_receipt(
    State(state): State<AppState>,
    Json(receipt): Json<Receipt>,
) -> impl IntoResponse {
    match service::create_receipt(&state.db, receipt).await {
        Ok(created) => {
            let location = format!("/api/receipt/{}", created.id);
            (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                AxumJson(created),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Create receipt failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn update_receipt(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(receipt): Json<Receipt>,
) -> impl IntoResponse {
    match service::update_receipt(&state.db, id, receipt).await {
        Ok(Some(updated)) => AxumJson(updated).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!("Update receipt {} failed: {}", id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

/// Removing a receipt also removes its backing upload, with the stored name
/// taken from the last path segment of `image_path`. A receipt without a
/// parseable name skips the file step.
pub async fn delete_receipt(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let receipt = match service::get_receipt(&state.db, id).await {
        Ok(Some(receipt)) => receipt,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!("Get receipt {} failed: {}", id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let file_name = receipt.image_path.rsplit('/').next().unwrap_or_default();
    if !file_name.is_empty() {
        if let Err(e) = state.files.delete(file_name).await {
            tracing::error!("Deleting stored file {} failed: {}", file_name, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Storage Error").into_response();
        }
    }

    match service::delete_receipt(&state.db, id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!("Delete receipt {} failed: {}", id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

/// Upload a document, run it through the extractor, store the file and
/// return the unsaved receipt. Persisting the record is a separate,
/// explicit create call.
pub async fn parse_receipt(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let upload = match read_upload(&mut multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return (StatusCode::BAD_REQUEST, "No file uploaded").into_response(),
        Err(e) => {
            tracing::error!("Upload read failed: {}", e);
            return (StatusCode::BAD_REQUEST, "No file uploaded").into_response();
        }
    };
    if let Err(message) = validate_upload(&upload) {
        return (StatusCode::BAD_REQUEST, message).into_response();
    }

    let mut receipt = match state.ocr.extract(&upload.data).await {
        Ok(receipt) => receipt,
        Err(e) => {
            tracing::error!("Error processing receipt: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error processing receipt. Please try again.",
            )
                .into_response();
        }
    };

    match state.files.save(&upload.data, &upload.file_name).await {
        Ok(stored_name) => receipt.image_path = state.files.file_url(&stored_name),
        Err(e) => {
            tracing::error!("Error saving uploaded file: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error processing receipt. Please try again.",
            )
                .into_response();
        }
    }

    AxumJson(receipt).into_response()
}

/// Diagnostic OCR-only endpoint: no persistence, no file kept, and failures
/// echo full error detail back to the caller. Only registered when debug
/// endpoints are enabled.
pub async fn test_ocr(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let upload = match read_upload(&mut multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return (StatusCode::BAD_REQUEST, "No file uploaded").into_response(),
        Err(e) => {
            tracing::error!("Upload read failed: {}", e);
            return (StatusCode::BAD_REQUEST, "No file uploaded").into_response();
        }
    };
    if let Err(message) = validate_upload(&upload) {
        return (StatusCode::BAD_REQUEST, message).into_response();
    }

    match state.ocr.extract(&upload.data).await {
        Ok(receipt) => AxumJson(receipt).into_response(),
        Err(e) => {
            tracing::error!("Error processing receipt in test endpoint: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                AxumJson(json!({
                    "error": e.to_string(),
                    "details": format!("{:?}", e),
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_upload, Upload};

    fn upload(data: &[u8], content_type: Option<&str>) -> Upload {
        Upload {
            data: data.to_vec(),
            content_type: content_type.map(str::to_string),
            file_name: "receipt.png".to_string(),
        }
    }

    #[test]
    fn accepts_the_three_allowed_content_types() {
        for ct in ["image/jpeg", "image/png", "application/pdf"] {
            assert!(validate_upload(&upload(b"bytes", Some(ct))).is_ok());
        }
    }

    #[test]
    fn content_type_match_is_case_insensitive() {
        assert!(validate_upload(&upload(b"bytes", Some("IMAGE/JPEG"))).is_ok());
        assert!(validate_upload(&upload(b"bytes", Some("Application/Pdf"))).is_ok());
    }

    #[test]
    fn rejects_disallowed_and_missing_content_types() {
        assert!(validate_upload(&upload(b"bytes", Some("image/gif"))).is_err());
        assert!(validate_upload(&upload(b"bytes", Some("text/plain"))).is_err());
        assert!(validate_upload(&upload(b"bytes", None)).is_err());
    }

    #[test]
    fn rejects_empty_files_before_type_checks() {
        let err = validate_upload(&upload(b"", Some("image/png"))).unwrap_err();
        assert_eq!(err, "No file uploaded");
    }
}
