use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::{
    adapters::pdftoppm_rasterizer::{PdftoppmRasterizer, RasterizeError},
    domain::entities::batch_job::BatchFile,
    helper::error_chain_fmt,
    repositories::{
        batch_job_store::BatchJobStore,
        page_delivery_webhook_repository::{DeliveryError, PageDeliveryWebhookRepository},
    },
};

#[derive(thiserror::Error)]
pub enum ProcessBatchError {
    #[error(transparent)]
    RasterizeError(#[from] RasterizeError),
    #[error(transparent)]
    DeliveryError(#[from] DeliveryError),
}

impl std::fmt::Debug for ProcessBatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Drains one batch job's queue to exhaustion, one file at a time.
///
/// This is the only place that advances a batch through its lifecycle:
/// rasterize, deliver, count, clean up. A failure on one file is logged
/// and the file permanently skipped; the loop continues with the next.
/// The guard at the top makes re-triggering a no-op while a drain is
/// active, so a double submission can never run two loops over the same
/// queue.
#[tracing::instrument(name = "Processing batch job", skip(store, rasterizer, delivery))]
pub async fn process_batch(
    job_id: String,
    store: Arc<BatchJobStore>,
    rasterizer: Arc<PdftoppmRasterizer>,
    delivery: Arc<PageDeliveryWebhookRepository>,
) {
    if !store.try_begin_processing(&job_id) {
        info!("Batch job already has an active drain loop");
        return;
    }

    while let Some(file) = store.front_file(&job_id) {
        match convert_and_deliver(&job_id, &file, &rasterizer, &delivery).await {
            Ok(images) => {
                store.complete_front(&job_id);
                remove_artifacts(&file.path, &images).await;
            }
            Err(error) => {
                error!(
                    ?error,
                    file = %file.original_name,
                    "Failed to process batch file, skipping"
                );
                store.skip_front(&job_id);
            }
        }
    }

    store.finish_processing(&job_id);
    info!("Batch job queue drained");
}

/// One file's trip through the pipeline: page images out, delivered, paths
/// returned for cleanup.
async fn convert_and_deliver(
    job_id: &str,
    file: &BatchFile,
    rasterizer: &PdftoppmRasterizer,
    delivery: &PageDeliveryWebhookRepository,
) -> Result<Vec<PathBuf>, ProcessBatchError> {
    let prefix = output_prefix(&file.original_name);
    let images = rasterizer.rasterize(&file.path, &prefix).await?;
    delivery.deliver(job_id, &images).await?;
    Ok(images)
}

/// Best-effort removal of the source PDF and its page images once they
/// have been delivered. Failures are logged, never propagated.
async fn remove_artifacts(pdf_path: &Path, images: &[PathBuf]) {
    for path in std::iter::once(pdf_path).chain(images.iter().map(PathBuf::as_path)) {
        if let Err(error) = tokio::fs::remove_file(path).await {
            warn!(?error, path = %path.display(), "Failed to remove processed artifact");
        }
    }
}

/// Naming prefix for one file's page images: upload timestamp plus the
/// sanitized original name, so images of concurrently processed batches
/// cannot collide in the shared image directory.
fn output_prefix(original_name: &str) -> String {
    let stem = if original_name.to_ascii_lowercase().ends_with(".pdf") {
        &original_name[..original_name.len() - 4]
    } else {
        original_name
    };

    let stem: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!("{}-{}", Utc::now().timestamp_millis(), stem)
}
