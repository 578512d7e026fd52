use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

use crate::{configuration::RasterizerSettings, helper::error_chain_fmt};

/// Boundary to the external page-rasterization tool (`pdftoppm`).
///
/// The tool is handed the source PDF and an output prefix under
/// `image_dir`; it writes one `{prefix}-{page}.jpg` per page. The adapter
/// discovers the produced files by prefix afterwards, since the exact
/// suffix scheme varies with page count and tool version.
pub struct PdftoppmRasterizer {
    settings: RasterizerSettings,
}

#[derive(thiserror::Error)]
pub enum RasterizeError {
    #[error("Rasterization tool failed: {0}")]
    ConversionFailed(String),
    #[error("Rasterization produced no image for prefix {0}")]
    NoOutputProduced(String),
}

impl std::fmt::Debug for RasterizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl PdftoppmRasterizer {
    pub fn new(settings: RasterizerSettings) -> Self {
        Self { settings }
    }

    /// Converts `pdf_path` into page images named after `prefix`.
    ///
    /// Returns the produced image paths in page order. The source PDF is
    /// left in place; cleaning up is the caller's concern.
    #[tracing::instrument(name = "Rasterizing PDF", skip(self))]
    pub async fn rasterize(
        &self,
        pdf_path: &Path,
        prefix: &str,
    ) -> Result<Vec<PathBuf>, RasterizeError> {
        let output_prefix = Path::new(&self.settings.image_dir).join(prefix);

        let mut command = Command::new(&self.settings.command);
        command.arg("-jpeg");
        if self.settings.first_page_only {
            command.args(["-f", "1", "-l", "1"]);
        }
        command.arg(pdf_path).arg(&output_prefix);

        let output = command.output().await.map_err(|error| {
            RasterizeError::ConversionFailed(format!(
                "failed to run {}: {}",
                self.settings.command, error
            ))
        })?;

        if !output.status.success() {
            return Err(RasterizeError::ConversionFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let images = self.collect_produced_images(prefix).await?;
        debug!(nb_images = images.len(), "Rasterization produced images");

        Ok(images)
    }

    async fn collect_produced_images(&self, prefix: &str) -> Result<Vec<PathBuf>, RasterizeError> {
        let mut images = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.settings.image_dir)
            .await
            .map_err(|error| {
                RasterizeError::ConversionFailed(format!(
                    "failed to scan image directory {}: {}",
                    self.settings.image_dir, error
                ))
            })?;

        while let Some(entry) = entries.next_entry().await.map_err(|error| {
            RasterizeError::ConversionFailed(format!(
                "failed to scan image directory {}: {}",
                self.settings.image_dir, error
            ))
        })? {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(prefix) && file_name.to_ascii_lowercase().ends_with(".jpg") {
                images.push(entry.path());
            }
        }

        if images.is_empty() {
            // The tool exited cleanly but nothing matched: naming mismatch
            // or tool version skew.
            return Err(RasterizeError::NoOutputProduced(prefix.to_string()));
        }

        // read_dir order is platform-dependent; page order comes from the
        // `-{page}` suffix.
        images.sort();

        Ok(images)
    }
}
