use sqlx::SqliteExecutor;

use crate::helper::error_chain_fmt;

/// One raw row of the `faktury` table.
#[derive(Debug, sqlx::FromRow)]
pub struct InvoiceRecord {
    pub id: i64,
    pub json_data: String,
}

pub struct InvoiceSqliteRepository {}

impl Default for InvoiceSqliteRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceSqliteRepository {
    pub fn new() -> Self {
        Self {}
    }

    /// Reads every record, ordered by ascending identifier.
    #[tracing::instrument(name = "Fetching all invoice records", skip(self, db_executor))]
    pub async fn fetch_all_ordered(
        &self,
        db_executor: impl SqliteExecutor<'_>,
    ) -> Result<Vec<InvoiceRecord>, InvoiceSqliteRepositoryError> {
        let records = sqlx::query_as::<_, InvoiceRecord>(
            "SELECT id, json_data FROM faktury ORDER BY id ASC",
        )
        .fetch_all(db_executor)
        .await?;

        Ok(records)
    }

    /// Stores one invoice payload verbatim.
    #[tracing::instrument(name = "Saving new invoice record", skip(self, db_executor, json_data))]
    pub async fn add_invoice(
        &self,
        db_executor: impl SqliteExecutor<'_>,
        json_data: &str,
    ) -> Result<(), InvoiceSqliteRepositoryError> {
        sqlx::query("INSERT INTO faktury (json_data) VALUES (?1)")
            .bind(json_data)
            .execute(db_executor)
            .await?;

        Ok(())
    }

    /// Unconditionally purges the table; returns how many records went.
    #[tracing::instrument(name = "Purging all invoice records", skip(self, db_executor))]
    pub async fn delete_all(
        &self,
        db_executor: impl SqliteExecutor<'_>,
    ) -> Result<u64, InvoiceSqliteRepositoryError> {
        let result = sqlx::query("DELETE FROM faktury").execute(db_executor).await?;

        Ok(result.rows_affected())
    }
}

#[derive(thiserror::Error)]
pub enum InvoiceSqliteRepositoryError {
    #[error(transparent)]
    DBError(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl std::fmt::Debug for InvoiceSqliteRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
