//! Files attached to employees and resources, stored in S3 and listed in the
//! owner's `documents` JSON column.

use aws_sdk_s3::primitives::ByteStream;
use axum::{
    extract::Multipart,
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::skill::{DocumentKind, DocumentRef};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOwner {
    Employee,
    Resource,
}

impl DocumentOwner {
    fn table(&self) -> &'static str {
        match self {
            DocumentOwner::Employee => "employees",
            DocumentOwner::Resource => "resources",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentOwner::Employee => "employee",
            DocumentOwner::Resource => "resource",
        }
    }
}

/// A file pulled out of a multipart form, not yet stored.
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub kind: DocumentKind,
    pub data: Bytes,
}

/// Reads the `file` part (and optional `kind`) from a multipart form.
pub async fn read_upload(mut multipart: Multipart) -> Result<UploadedFile, AppError> {
    let mut file: Option<(String, String, Bytes)> = None;
    let mut kind = DocumentKind::Other;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
                file = Some((file_name, content_type, data));
            }
            Some("kind") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read kind: {e}")))?;
                kind = text.trim().parse().map_err(AppError::Validation)?;
            }
            _ => {}
        }
    }

    let (file_name, content_type, data) =
        file.ok_or_else(|| AppError::Validation("A 'file' field is required".to_string()))?;
    if data.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }
    if data.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::Validation(format!(
            "Uploaded file exceeds {} MB",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }

    Ok(UploadedFile {
        file_name,
        content_type,
        kind,
        data,
    })
}

/// Keeps ASCII letters, digits, dot, dash and underscore; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.chars().take(120).collect()
    }
}

pub fn storage_key(
    company_id: Uuid,
    owner: DocumentOwner,
    owner_id: Uuid,
    doc_id: Uuid,
    file_name: &str,
) -> String {
    format!(
        "companies/{company_id}/{}s/{owner_id}/{doc_id}-{}",
        owner.label(),
        sanitize_file_name(file_name)
    )
}

pub async fn put_object(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    content_type: &str,
    data: Bytes,
) -> Result<(), AppError> {
    s3.put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(data))
        .content_type(content_type)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("Upload of {key} failed: {e}")))?;
    info!("Stored s3://{bucket}/{key}");
    Ok(())
}

pub async fn get_object(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
) -> Result<Bytes, AppError> {
    let object = s3
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("Download of {key} failed: {e}")))?;
    let data = object
        .body
        .collect()
        .await
        .map_err(|e| AppError::S3(format!("Reading {key} failed: {e}")))?;
    Ok(data.into_bytes())
}

pub async fn delete_object(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
) -> Result<(), AppError> {
    s3.delete_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("Delete of {key} failed: {e}")))?;
    Ok(())
}

pub async fn load_documents(
    pool: &PgPool,
    owner: DocumentOwner,
    company_id: Uuid,
    owner_id: Uuid,
) -> sqlx::Result<Option<Vec<DocumentRef>>> {
    let query = format!(
        "SELECT documents FROM {} WHERE id = $1 AND company_id = $2",
        owner.table()
    );
    let row: Option<Json<Vec<DocumentRef>>> = sqlx::query_scalar(&query)
        .bind(owner_id)
        .bind(company_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|Json(docs)| docs))
}

pub async fn save_documents(
    pool: &PgPool,
    target: &DocumentTarget,
    documents: &[DocumentRef],
) -> sqlx::Result<()> {
    let query = format!(
        "UPDATE {} SET documents = $1, updated_by = $2, updated_at = NOW() WHERE id = $3 AND company_id = $4",
        target.owner.table()
    );
    sqlx::query(&query)
        .bind(Json(documents))
        .bind(target.actor)
        .bind(target.owner_id)
        .bind(target.company_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// The record a document belongs to and who is changing it.
#[derive(Debug, Clone, Copy)]
pub struct DocumentTarget {
    pub owner: DocumentOwner,
    pub company_id: Uuid,
    pub owner_id: Uuid,
    pub actor: Uuid,
}

impl DocumentTarget {
    fn not_found(&self) -> AppError {
        AppError::NotFound(format!("{} {} not found", self.owner.label(), self.owner_id))
    }
}

/// Deletes a stored object whose record is already gone or was never written.
/// A failure leaves an orphaned object behind and is only logged.
pub async fn discard_object(s3: &aws_sdk_s3::Client, bucket: &str, key: &str) -> bool {
    match delete_object(s3, bucket, key).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Orphaned s3://{bucket}/{key}: {e}");
            false
        }
    }
}

/// Stores an upload and appends it to the owner's document list.
pub async fn attach(
    pool: &PgPool,
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    target: DocumentTarget,
    upload: UploadedFile,
) -> Result<DocumentRef, AppError> {
    let mut documents = load_documents(pool, target.owner, target.company_id, target.owner_id)
        .await?
        .ok_or_else(|| target.not_found())?;

    let doc_id = Uuid::new_v4();
    let key = storage_key(
        target.company_id,
        target.owner,
        target.owner_id,
        doc_id,
        &upload.file_name,
    );
    let size_bytes = upload.data.len() as i64;
    put_object(s3, bucket, &key, &upload.content_type, upload.data).await?;

    let document = DocumentRef {
        id: doc_id,
        name: upload.file_name,
        kind: upload.kind,
        content_type: upload.content_type,
        size_bytes,
        storage_key: key,
        uploaded_at: Utc::now(),
        uploaded_by: Some(target.actor),
    };
    documents.push(document.clone());
    if let Err(e) = save_documents(pool, &target, &documents).await {
        discard_object(s3, bucket, &document.storage_key).await;
        return Err(e.into());
    }
    Ok(document)
}

/// Removes a document from the owner's list, then deletes the stored object.
/// Once the list is saved the removal stands even if the object delete fails.
pub async fn detach(
    pool: &PgPool,
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    target: DocumentTarget,
    doc_id: Uuid,
) -> Result<DocumentRef, AppError> {
    let mut documents = load_documents(pool, target.owner, target.company_id, target.owner_id)
        .await?
        .ok_or_else(|| target.not_found())?;
    let index = documents
        .iter()
        .position(|d| d.id == doc_id)
        .ok_or_else(|| AppError::NotFound(format!("Document {doc_id} not found")))?;
    let removed = documents.remove(index);
    save_documents(pool, &target, &documents).await?;
    discard_object(s3, bucket, &removed.storage_key).await;
    Ok(removed)
}

pub async fn find_document(
    pool: &PgPool,
    owner: DocumentOwner,
    company_id: Uuid,
    owner_id: Uuid,
    doc_id: Uuid,
) -> Result<DocumentRef, AppError> {
    load_documents(pool, owner, company_id, owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {owner_id} not found", owner.label())))?
        .into_iter()
        .find(|d| d.id == doc_id)
        .ok_or_else(|| AppError::NotFound(format!("Document {doc_id} not found")))
}

/// Builds a download response with an attachment disposition.
pub fn file_response(content_type: &str, file_name: &str, data: Bytes) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", sanitize_file_name(file_name)),
            ),
        ],
        data,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name_strips_paths_and_symbols() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\CV final.pdf"), "CV_final.pdf");
        assert_eq!(sanitize_file_name("résumé.pdf"), "r_sum_.pdf");
        assert_eq!(sanitize_file_name("..."), "file");
    }

    #[test]
    fn test_storage_key_layout() {
        let company = Uuid::nil();
        let owner = Uuid::nil();
        let doc = Uuid::nil();
        let key = storage_key(company, DocumentOwner::Resource, owner, doc, "cv.pdf");
        assert_eq!(
            key,
            format!("companies/{company}/resources/{owner}/{doc}-cv.pdf")
        );
    }

    #[tokio::test]
    async fn test_discard_object_swallows_storage_failures() {
        use aws_sdk_s3::config::{retry::RetryConfig, BehaviorVersion, Credentials, Region};

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("key", "secret", None, None, "test"))
            .endpoint_url("http://127.0.0.1:9")
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .build();
        let s3 = aws_sdk_s3::Client::from_conf(config);

        assert!(!discard_object(&s3, "bucket", "companies/x/resources/y/z-cv.pdf").await);
    }

    #[tokio::test]
    async fn test_file_response_sets_headers() {
        let response = file_response("application/pdf", "Q3 report.pdf", Bytes::from_static(b"%PDF"));
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Q3_report.pdf\""
        );
    }
}
