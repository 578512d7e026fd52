pub mod batch_job;
pub mod invoice;
