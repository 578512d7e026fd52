pub mod batch_job_store;
pub mod invoice_sqlite_repository;
pub mod page_delivery_webhook_repository;
