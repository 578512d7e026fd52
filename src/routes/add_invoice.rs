use actix_web::{
    http::{header::ContentType, StatusCode},
    web::{Data, Json},
    HttpResponse, ResponseError,
};
use anyhow::Context;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    helper::error_chain_fmt, repositories::invoice_sqlite_repository::InvoiceSqliteRepository,
};

/// Stores one invoice payload as delivered by the OCR pipeline.
///
/// The document is persisted verbatim; no schema is enforced on the way
/// in, the read side extracts fields defensively instead.
#[tracing::instrument(name = "Adding invoice record", skip(pool, invoice_repository, body))]
pub async fn add_invoice(
    pool: Data<SqlitePool>,
    invoice_repository: Data<InvoiceSqliteRepository>,
    body: Json<serde_json::Value>,
) -> Result<HttpResponse, AddInvoiceError> {
    let json_data = body.into_inner().to_string();

    invoice_repository
        .add_invoice(pool.get_ref(), &json_data)
        .await
        .context("Failed to store invoice record")?;

    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

#[derive(thiserror::Error)]
pub enum AddInvoiceError {
    #[error("Failed to store invoice")]
    InternalError(#[source] anyhow::Error),
}

impl From<anyhow::Error> for AddInvoiceError {
    fn from(error: anyhow::Error) -> Self {
        Self::InternalError(error)
    }
}

impl std::fmt::Debug for AddInvoiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for AddInvoiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AddInvoiceError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[tracing::instrument(name = "Response error from add_invoice handler", skip(self), fields(error = ?self))]
    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(json!({ "error": self.to_string() }))
    }
}
