use actix_web::{
    web::{Bytes, Data, Path},
    HttpResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::repositories::batch_job_store::BatchJobStore;

#[derive(Debug, Deserialize)]
pub struct CompletionSignal {
    #[serde(rename = "jobId")]
    pub job_id: String,
}

/// Inbound completion signal from the remote processing pipeline.
///
/// The caller is an automation flow that cannot act on errors, so the
/// response is `{"status": "OK"}` no matter what: unknown job identifiers
/// and unreadable bodies are logged and swallowed. A recognized signal
/// advances the job's `completed` counter through the same serialized
/// store path the drain loop uses.
#[tracing::instrument(name = "Handling completion webhook", skip(job_store, body))]
pub async fn completion_webhook(
    path: Path<String>,
    body: Bytes,
    job_store: Data<BatchJobStore>,
) -> HttpResponse {
    let callback_path = path.into_inner();

    match serde_json::from_slice::<CompletionSignal>(&body) {
        Ok(signal) => {
            if job_store.record_external_completion(&signal.job_id) {
                info!(
                    job_id = %signal.job_id,
                    callback_path,
                    "Recorded external completion signal"
                );
            } else {
                warn!(
                    job_id = %signal.job_id,
                    callback_path,
                    "Completion signal for unknown job"
                );
            }
        }
        Err(error) => {
            warn!(?error, callback_path, "Could not parse completion signal body");
        }
    }

    HttpResponse::Ok().json(json!({ "status": "OK" }))
}
