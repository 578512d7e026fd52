use std::path::Path;

use actix_web::{
    http::{header::ContentType, StatusCode},
    web::Data,
    HttpResponse, ResponseError,
};
use anyhow::Context;
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    configuration::StorageSettings,
    domain::{
        entities::invoice::InvoicePayload,
        services::{
            classify_invoices::{classify, primary_entity},
            render_invoices_xml::{render_invoices_xml, ExportInvoice},
        },
    },
    helper::error_chain_fmt,
    repositories::invoice_sqlite_repository::InvoiceSqliteRepository,
};

/// Renders every stored invoice into the XML export document, hands it to
/// the requester as a download and purges the table.
///
/// The purge only happens after the document is fully rendered and its
/// copy written under the exports directory; any failure before that
/// leaves the store untouched, so a retried export re-reads the same
/// records (at-least-once hand-off).
#[tracing::instrument(name = "Exporting invoices", skip(pool, invoice_repository, storage))]
pub async fn export_invoices(
    pool: Data<SqlitePool>,
    invoice_repository: Data<InvoiceSqliteRepository>,
    storage: Data<StorageSettings>,
) -> Result<HttpResponse, ExportInvoicesError> {
    let records = invoice_repository
        .fetch_all_ordered(pool.get_ref())
        .await
        .context("Failed to read invoice records")?;

    if records.is_empty() {
        return Err(ExportInvoicesError::NoRecordsToExport);
    }

    let payloads: Vec<InvoicePayload> = records
        .iter()
        .map(|record| InvoicePayload::parse(&record.json_data))
        .collect();
    let primary = primary_entity(&payloads);

    let invoices: Vec<ExportInvoice> = records
        .iter()
        .zip(payloads)
        .map(|(record, payload)| ExportInvoice {
            id: record.id,
            kind: classify(&payload, primary.as_deref()),
            payload,
        })
        .collect();

    let document =
        render_invoices_xml(&invoices).context("Failed to render the export document")?;

    let file_name = format!("faktury_export_{}.xml", Utc::now().timestamp_millis());
    let export_path = Path::new(&storage.exports_dir).join(&file_name);
    tokio::fs::write(&export_path, &document)
        .await
        .with_context(|| format!("Failed to write export file {}", export_path.display()))?;

    let purged = invoice_repository
        .delete_all(pool.get_ref())
        .await
        .context("Failed to purge exported invoice records")?;
    info!(
        purged,
        file_name,
        primary_entity = primary.as_deref().unwrap_or(""),
        "Export rendered, store purged"
    );

    Ok(HttpResponse::Ok()
        .content_type("application/xml")
        .insert_header((
            "Content-Disposition",
            format!(r#"attachment; filename="{}""#, file_name),
        ))
        .body(document))
}

#[derive(thiserror::Error)]
pub enum ExportInvoicesError {
    #[error("No invoices to export")]
    NoRecordsToExport,
    #[error("Failed to export invoices")]
    InternalError(#[source] anyhow::Error),
}

impl From<anyhow::Error> for ExportInvoicesError {
    fn from(error: anyhow::Error) -> Self {
        Self::InternalError(error)
    }
}

impl std::fmt::Debug for ExportInvoicesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for ExportInvoicesError {
    fn status_code(&self) -> StatusCode {
        match self {
            ExportInvoicesError::NoRecordsToExport => StatusCode::NOT_FOUND,
            ExportInvoicesError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[tracing::instrument(name = "Response error from export_invoices handler", skip(self), fields(error = ?self))]
    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(json!({ "error": self.to_string() }))
    }
}
