use std::path::PathBuf;

use reqwest::multipart::{Form, Part};

use crate::{configuration::DeliverySettings, helper::error_chain_fmt};

/// Ships the page images of one processed PDF to the remote processing
/// webhook as a single multipart POST.
///
/// The client is built once and reused: it accepts the endpoint's
/// self-signed certificate chain (a trust relaxation scoped to this one
/// known internal endpoint) and imposes no body-size ceiling, since a
/// multi-page scan can run large. Retrying is the caller's decision; one
/// call maps to exactly one POST.
pub struct PageDeliveryWebhookRepository {
    client: reqwest::Client,
    webhook_url: String,
}

#[derive(thiserror::Error)]
pub enum DeliveryError {
    #[error("Failed to deliver page images to the processing webhook")]
    DeliveryFailed(#[from] reqwest::Error),
    #[error("Failed to read produced page image {path}")]
    ImageRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl std::fmt::Debug for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl PageDeliveryWebhookRepository {
    pub fn new(settings: &DeliverySettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            // The endpoint sits behind a certificate chain we do not verify
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            client,
            webhook_url: settings.webhook_url.clone(),
        })
    }

    /// Posts `jobId` plus one `file` part per image. Any transport error
    /// or non-success status is a `DeliveryFailed`.
    #[tracing::instrument(
        name = "Delivering page images to webhook",
        skip(self, images),
        fields(nb_images = images.len())
    )]
    pub async fn deliver(&self, job_id: &str, images: &[PathBuf]) -> Result<(), DeliveryError> {
        let mut form = Form::new().text("jobId", job_id.to_owned());

        for image in images {
            let bytes = tokio::fs::read(image)
                .await
                .map_err(|source| DeliveryError::ImageRead {
                    path: image.display().to_string(),
                    source,
                })?;

            let file_name = image
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "page.jpg".to_string());

            let part = Part::bytes(bytes)
                .file_name(file_name)
                .mime_str("image/jpeg")?;
            form = form.part("file", part);
        }

        self.client
            .post(&self.webhook_url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
