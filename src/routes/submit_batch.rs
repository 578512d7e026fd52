use std::path::Path;

use actix_multipart::form::{tempfile::TempFile, MultipartForm};
use actix_web::{
    http::{header::ContentType, StatusCode},
    web::Data,
    HttpResponse, ResponseError,
};
use anyhow::Context;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    adapters::pdftoppm_rasterizer::PdftoppmRasterizer,
    configuration::StorageSettings,
    domain::entities::batch_job::BatchFile,
    helper::error_chain_fmt,
    repositories::{
        batch_job_store::BatchJobStore,
        page_delivery_webhook_repository::PageDeliveryWebhookRepository,
    },
    use_cases::process_batch::process_batch,
};

#[derive(Debug, MultipartForm)]
pub struct UploadForm {
    #[multipart(rename = "files")]
    pub files: Vec<TempFile>,
}

/// Accepts a batch of PDF uploads, registers it as a job and kicks off its
/// drain loop in the background. The response returns immediately with the
/// job identifier; progress is observed through `/job-status/{job_id}`.
#[tracing::instrument(
    name = "Submitting upload batch",
    skip(form, job_store, rasterizer, delivery, storage)
)]
pub async fn submit_batch(
    MultipartForm(form): MultipartForm<UploadForm>,
    job_store: Data<BatchJobStore>,
    rasterizer: Data<PdftoppmRasterizer>,
    delivery: Data<PageDeliveryWebhookRepository>,
    storage: Data<StorageSettings>,
) -> Result<HttpResponse, SubmitBatchError> {
    if form.files.is_empty() {
        return Err(SubmitBatchError::NoFilesSubmitted);
    }

    let mut batch_files = Vec::with_capacity(form.files.len());
    for file in form.files {
        let original_name = file
            .file_name
            .clone()
            .unwrap_or_else(|| "document.pdf".to_string());

        // Move the upload out of the request's temp file into the uploads
        // directory, under a collision-free name; the original name only
        // survives on the batch descriptor.
        let stored_path =
            Path::new(&storage.uploads_dir).join(format!("{}.pdf", Uuid::new_v4()));
        file.file
            .persist(&stored_path)
            .with_context(|| format!("Failed to persist uploaded file {}", original_name))?;

        batch_files.push(BatchFile {
            original_name,
            path: stored_path,
        });
    }

    let (job_id, total) = job_store.submit(batch_files);
    info!(%job_id, total, "Registered upload batch");

    tokio::spawn(process_batch(
        job_id.clone(),
        job_store.into_inner(),
        rasterizer.into_inner(),
        delivery.into_inner(),
    ));

    Ok(HttpResponse::Ok().json(json!({ "jobId": job_id, "total": total })))
}

#[derive(thiserror::Error)]
pub enum SubmitBatchError {
    #[error("No files were attached to the upload")]
    NoFilesSubmitted,
    #[error(transparent)]
    InternalError(#[from] anyhow::Error),
}

impl std::fmt::Debug for SubmitBatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for SubmitBatchError {
    fn status_code(&self) -> StatusCode {
        match self {
            SubmitBatchError::NoFilesSubmitted => StatusCode::BAD_REQUEST,
            SubmitBatchError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[tracing::instrument(name = "Response error from submit_batch handler", skip(self), fields(error = %self))]
    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(json!({ "error": self.to_string() }))
    }
}
