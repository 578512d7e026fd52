pub mod process_batch;
