mod helpers;

mod health_check;
mod submit_batch;
