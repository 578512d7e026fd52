use actix_web::{
    http::{header::ContentType, StatusCode},
    web::{Data, Path},
    HttpResponse, ResponseError,
};
use serde_json::json;

use crate::{helper::error_chain_fmt, repositories::batch_job_store::BatchJobStore};

/// Progress polling: how many of the batch's files are done.
///
/// A count stalling below `total` is the only trace a skipped file leaves
/// to the outside; there is no per-file error surface.
#[tracing::instrument(name = "Polling job status", skip(job_store))]
pub async fn job_status(
    path: Path<String>,
    job_store: Data<BatchJobStore>,
) -> Result<HttpResponse, JobStatusError> {
    let job_id = path.into_inner();

    let progress = job_store
        .status(&job_id)
        .ok_or(JobStatusError::UnknownJob(job_id))?;

    Ok(HttpResponse::Ok().json(json!({
        "total": progress.total,
        "completed": progress.completed,
    })))
}

#[derive(thiserror::Error)]
pub enum JobStatusError {
    #[error("Unknown job: {0}")]
    UnknownJob(String),
}

impl std::fmt::Debug for JobStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for JobStatusError {
    fn status_code(&self) -> StatusCode {
        match self {
            JobStatusError::UnknownJob(_) => StatusCode::NOT_FOUND,
        }
    }

    #[tracing::instrument(name = "Response error from job_status handler", skip(self), fields(error = %self))]
    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(json!({ "error": self.to_string() }))
    }
}
