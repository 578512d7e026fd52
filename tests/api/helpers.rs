use std::{
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    time::Duration,
};

use invoice_ingestion_service::{
    configuration::{get_configuration, Settings},
    startup::{get_connection_pool, Application},
    telemetry::{get_tracing_subscriber, init_tracing_subscriber},
};
use once_cell::sync::Lazy;
use reqwest::multipart::{Form, Part};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::time::sleep;

// Ensures that the `tracing` stack is only initialized once using `once_cell`
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber =
            get_tracing_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_tracing_subscriber(subscriber);
    } else {
        let subscriber =
            get_tracing_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_tracing_subscriber(subscriber);
    };
});

pub struct TestApp {
    pub address: String,
    pub port: u16,
    /// Database connection used to assert checks thanks to db queries
    pub db_pool: SqlitePool,
    pub uploads_dir: PathBuf,
    pub image_dir: PathBuf,
    pub exports_dir: PathBuf,
    /// Keeps the per-test working directory alive until the test ends
    _workdir: TempDir,
}

impl TestApp {
    /// Uploads one fake PDF per name through the multipart endpoint and
    /// returns the parsed response body.
    pub async fn upload_pdfs(&self, names: &[&str]) -> serde_json::Value {
        let mut form = Form::new();
        for name in names {
            let part = Part::bytes(b"%PDF-1.4 stub content".to_vec())
                .file_name(name.to_string())
                .mime_str("application/pdf")
                .unwrap();
            form = form.part("files", part);
        }

        let response = reqwest::Client::new()
            .post(&format!("{}/upload", &self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(200, response.status().as_u16());

        response.json().await.expect("Upload response was not JSON")
    }

    pub async fn get_job_status(&self, job_id: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(&format!("{}/job-status/{}", &self.address, job_id))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Polls the status endpoint until `completed` reaches the expected
    /// count. Panics with the last observed status after `timeout`.
    pub async fn wait_for_completed(&self, job_id: &str, expected: u64, timeout: Duration) {
        let poll_step = Duration::from_millis(50);
        let mut waited = Duration::ZERO;
        let mut last_status = serde_json::Value::Null;

        while waited < timeout {
            let response = self.get_job_status(job_id).await;
            assert_eq!(200, response.status().as_u16());

            last_status = response.json().await.expect("Status response was not JSON");
            if last_status["completed"].as_u64() == Some(expected) {
                return;
            }

            sleep(poll_step).await;
            waited += poll_step;
        }

        panic!(
            "Job {} did not reach completed == {} within {:?}, last status: {}",
            job_id, expected, timeout, last_status
        );
    }

    pub async fn add_invoice(&self, payload: serde_json::Value) {
        let response = reqwest::Client::new()
            .post(&format!("{}/invoices", &self.address))
            .json(&payload)
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(200, response.status().as_u16());
    }

    pub fn files_in(&self, dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .expect("Failed to read directory")
            .map(|entry| entry.expect("Failed to read directory entry").path())
            .collect()
    }
}

/// Launches the server as a background task with fully isolated state:
/// its own working directory, sqlite database, uploads/images/exports
/// directories and a random OS port.
///
/// When a tokio runtime is shut down all tasks spawned on it are dropped.
/// tokio::test spins up a new runtime at the beginning of each test case
/// and they shut down at the end of each test case, so nothing leaks
/// between runs.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_, _| {}).await
}

/// `customize` receives the settings and the test's working directory, so
/// a test can drop a stub rasterizer script in place and point the
/// configuration at it.
pub async fn spawn_app_with(customize: impl FnOnce(&mut Settings, &Path)) -> TestApp {
    // The first time `initialize` is invoked the code in `TRACING` is executed.
    // All other invocations will instead skip execution.
    Lazy::force(&TRACING);

    let workdir = TempDir::new().expect("Failed to create test working directory");
    let root = workdir.path();

    // Randomizes configuration to ensure test isolation
    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration.");
        // Uses a random OS port: port 0 is special-cased at the OS level:
        // trying to bind port 0 will trigger an OS scan for an available port
        // which will then be bound to the application.
        c.application.port = 0;
        c.database.path = root.join("faktury.db").display().to_string();
        c.storage.uploads_dir = root.join("uploads").display().to_string();
        c.storage.exports_dir = root.join("exports").display().to_string();
        c.rasterizer.image_dir = root.join("ocr_pages").display().to_string();

        customize(&mut c, root);

        c
    };

    let application = Application::build(configuration.clone(), Some(1))
        .await
        .expect("Failed to build application.");
    let application_port = application.port();

    // Launches the application as a background task
    let _ = tokio::spawn(application.run_until_stopped());

    TestApp {
        address: format!("http://127.0.0.1:{}", application_port),
        port: application_port,
        db_pool: get_connection_pool(&configuration.database),
        uploads_dir: PathBuf::from(configuration.storage.uploads_dir),
        image_dir: PathBuf::from(configuration.rasterizer.image_dir),
        exports_dir: PathBuf::from(configuration.storage.exports_dir),
        _workdir: workdir,
    }
}

/// Drops an executable shell script into `dir` that stands in for the
/// external rasterization tool, and returns its path for the
/// `rasterizer.command` setting. The script receives pdftoppm's argument
/// shape: `-jpeg <pdf> <output-prefix>`.
pub fn install_stub_rasterizer(dir: &Path, script_body: &str) -> String {
    let script_path = dir.join("stub_pdftoppm.sh");
    std::fs::write(&script_path, script_body).expect("Failed to write stub rasterizer");
    std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to mark stub rasterizer executable");
    script_path.display().to_string()
}

/// A stub rasterizer producing one page image per invocation.
pub const STUB_RASTERIZER_ONE_PAGE: &str = "#!/bin/sh\nprintf 'jpeg' > \"$3-1.jpg\"\n";

/// A stub rasterizer that fails the way a corrupt PDF makes pdftoppm fail.
pub const STUB_RASTERIZER_FAILING: &str = "#!/bin/sh\necho 'Syntax Error: broken' >&2\nexit 1\n";

/// A stub rasterizer slow enough that a test can observe a batch before
/// its first file finishes.
pub const STUB_RASTERIZER_STALLING: &str = "#!/bin/sh\nsleep 5\nexit 1\n";
