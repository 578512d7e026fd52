use std::time::Duration;

use reqwest::multipart::Form;
use serde_json::json;
use tokio::time::sleep;

use crate::helpers::{
    install_stub_rasterizer, spawn_app, spawn_app_with, STUB_RASTERIZER_FAILING,
    STUB_RASTERIZER_ONE_PAGE, STUB_RASTERIZER_STALLING,
};

#[tokio::test]
async fn upload_returns_a_400_when_no_files_are_attached() {
    // Arrange
    let app = spawn_app().await;

    // Creates a multipart form without any file field
    let form = Form::new();

    // Act
    let response = reqwest::Client::new()
        .post(&format!("{}/upload", &app.address))
        .multipart(form)
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert_eq!(400, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn polling_an_unknown_job_returns_a_404() {
    let app = spawn_app().await;

    let response = app.get_job_status("b9e77e25-b806-44a7-a2b1-c4aafb1b69b2").await;

    assert_eq!(404, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn a_fresh_batch_reports_zero_completed_and_the_submitted_total() {
    // A stalling rasterizer keeps the first file in flight while we poll
    let app = spawn_app_with(|c, root| {
        c.rasterizer.command = install_stub_rasterizer(root, STUB_RASTERIZER_STALLING);
    })
    .await;

    let submitted = app.upload_pdfs(&["a.pdf", "b.pdf"]).await;
    let job_id = submitted["jobId"].as_str().expect("no jobId in response");
    assert_eq!(submitted["total"], json!(2));

    let status: serde_json::Value = app.get_job_status(job_id).await.json().await.unwrap();
    assert_eq!(status["total"], json!(2));
    assert_eq!(status["completed"], json!(0));
}

#[tokio::test]
async fn a_successful_batch_completes_every_file_and_cleans_up_its_artifacts() {
    // Arrange: a second app instance plays the remote processing webhook;
    // its inbound completion endpoint answers 200 to any POST.
    let receiver = spawn_app().await;
    let webhook_url = format!("{}/webhook/sink", receiver.address);

    let app = spawn_app_with(move |c, root| {
        c.rasterizer.command = install_stub_rasterizer(root, STUB_RASTERIZER_ONE_PAGE);
        c.delivery.webhook_url = webhook_url;
    })
    .await;

    // Act
    let submitted = app.upload_pdfs(&["a.pdf", "b.pdf", "c.pdf"]).await;
    let job_id = submitted["jobId"].as_str().expect("no jobId in response");

    // Assert
    app.wait_for_completed(job_id, 3, Duration::from_secs(5)).await;

    // All temporary artifacts are gone: source PDFs and page images
    assert!(app.files_in(&app.uploads_dir).is_empty());
    assert!(app.files_in(&app.image_dir).is_empty());
}

#[tokio::test]
async fn failed_files_are_skipped_and_never_counted_as_completed() {
    let app = spawn_app_with(|c, root| {
        c.rasterizer.command = install_stub_rasterizer(root, STUB_RASTERIZER_FAILING);
    })
    .await;

    let submitted = app.upload_pdfs(&["a.pdf", "b.pdf"]).await;
    let job_id = submitted["jobId"].as_str().expect("no jobId in response");

    // Gives the drain loop ample time to run through both files
    sleep(Duration::from_secs(1)).await;

    let status: serde_json::Value = app.get_job_status(job_id).await.json().await.unwrap();
    assert_eq!(status["total"], json!(2));
    assert_eq!(status["completed"], json!(0));

    // Skipped files are not cleaned up
    assert_eq!(app.files_in(&app.uploads_dir).len(), 2);
}

#[tokio::test]
async fn the_completion_webhook_advances_the_counter_and_clamps_at_total() {
    let app = spawn_app_with(|c, root| {
        c.rasterizer.command = install_stub_rasterizer(root, STUB_RASTERIZER_STALLING);
    })
    .await;

    let submitted = app.upload_pdfs(&["a.pdf", "b.pdf"]).await;
    let job_id = submitted["jobId"].as_str().expect("no jobId in response");

    let client = reqwest::Client::new();
    for _ in 0..5 {
        let response = client
            .post(&format!("{}/webhook/fakturownica", &app.address))
            .json(&json!({ "jobId": job_id }))
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(200, response.status().as_u16());
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], json!("OK"));
    }

    // Five signals against a batch of two: the counter clamps at total
    let status: serde_json::Value = app.get_job_status(job_id).await.json().await.unwrap();
    assert_eq!(status["completed"], json!(2));
}

#[tokio::test]
async fn the_completion_webhook_answers_ok_even_for_unknown_jobs() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .post(&format!("{}/webhook/fakturownica", &app.address))
        .json(&json!({ "jobId": "no-such-job" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], json!("OK"));
}
