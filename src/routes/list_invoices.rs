use actix_web::{
    http::{header::ContentType, StatusCode},
    web::Data,
    HttpResponse, ResponseError,
};
use anyhow::Context;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    domain::entities::invoice::{InvoicePayload, InvoiceSummary},
    helper::error_chain_fmt,
    repositories::invoice_sqlite_repository::InvoiceSqliteRepository,
};

/// Lists every stored invoice, newest first, with the display fields
/// extracted defensively: a record whose payload does not parse still
/// shows up, with empty strings and zeroes.
#[tracing::instrument(name = "Listing invoices", skip(pool, invoice_repository))]
pub async fn list_invoices(
    pool: Data<SqlitePool>,
    invoice_repository: Data<InvoiceSqliteRepository>,
) -> Result<HttpResponse, ListInvoicesError> {
    let records = invoice_repository
        .fetch_all_ordered(pool.get_ref())
        .await
        .context("Failed to read invoice records")?;

    let summaries: Vec<InvoiceSummary> = records
        .iter()
        .map(|record| {
            let payload = InvoicePayload::parse(&record.json_data);
            InvoiceSummary {
                id: record.id,
                sprzedawca: payload.sprzedawca.nazwa,
                nabywca: payload.nabywca.nazwa,
                wartosc_brutto: payload.suma_brutto,
                numer_faktury: payload.numer_faktury,
            }
        })
        .rev()
        .collect();

    Ok(HttpResponse::Ok().json(summaries))
}

#[derive(thiserror::Error)]
pub enum ListInvoicesError {
    #[error("Failed to read invoices")]
    InternalError(#[source] anyhow::Error),
}

impl From<anyhow::Error> for ListInvoicesError {
    fn from(error: anyhow::Error) -> Self {
        Self::InternalError(error)
    }
}

impl std::fmt::Debug for ListInvoicesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for ListInvoicesError {
    fn status_code(&self) -> StatusCode {
        match self {
            ListInvoicesError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[tracing::instrument(name = "Response error from list_invoices handler", skip(self), fields(error = ?self))]
    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        // The underlying cause stays in the server-side logs
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(json!({ "error": self.to_string() }))
    }
}
