use std::{net::TcpListener, time::Duration};

use actix_web::{
    dev::Server,
    web::{self, Data},
    App, HttpServer,
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;
use tracing_actix_web::TracingLogger;

use crate::{
    adapters::pdftoppm_rasterizer::PdftoppmRasterizer,
    configuration::{DatabaseSettings, Settings, StorageSettings},
    repositories::{
        batch_job_store::BatchJobStore,
        invoice_sqlite_repository::InvoiceSqliteRepository,
        page_delivery_webhook_repository::PageDeliveryWebhookRepository,
    },
    routes::{
        add_invoice, completion_webhook, export_invoices, health_check, job_status,
        list_invoices, submit_batch,
    },
};

/// Holds the newly built server, and some useful properties
pub struct Application {
    server: Server,
    port: u16,
}

#[derive(thiserror::Error, Debug)]
pub enum ApplicationBuildError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error(transparent)]
    DatabaseError(#[from] sqlx::Error),
    #[error(transparent)]
    MigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("Failed to build the delivery HTTP client: {0}")]
    DeliveryClientError(#[from] reqwest::Error),
}

impl Application {
    /// # Parameters
    /// - nb_workers: number of actix-web workers
    ///   if `None`, the number of available physical CPUs is used as the worker count.
    #[tracing::instrument(name = "Building application", skip(settings, nb_workers))]
    pub async fn build(
        settings: Settings,
        nb_workers: Option<usize>,
    ) -> Result<Self, ApplicationBuildError> {
        // The service owns its working directories
        std::fs::create_dir_all(&settings.storage.uploads_dir)?;
        std::fs::create_dir_all(&settings.storage.exports_dir)?;
        std::fs::create_dir_all(&settings.rasterizer.image_dir)?;

        let connection_pool = get_connection_pool(&settings.database);
        sqlx::migrate!("./migrations").run(&connection_pool).await?;

        let address = format!(
            "{}:{}",
            settings.application.host, settings.application.port
        );
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        let job_store = BatchJobStore::new(Duration::from_secs(settings.jobs.retention_secs));
        let rasterizer = PdftoppmRasterizer::new(settings.rasterizer.clone());
        let delivery = PageDeliveryWebhookRepository::new(&settings.delivery)?;
        let invoice_repository = InvoiceSqliteRepository::new();

        let server = run(
            listener,
            nb_workers,
            connection_pool,
            job_store,
            rasterizer,
            delivery,
            invoice_repository,
            settings.storage.clone(),
        )?;

        Ok(Self { server, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// This function only returns when the application is stopped
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        info!("Running server ...");
        self.server.await
    }
}

/// listener: the consumer binds their own port
///
/// TracingLogger middleware: helps collecting telemetry data.
/// It generates a unique identifier for each incoming request: `request_id`.
///
/// # Parameters
/// - nb_workers: number of actix-web workers
///   if `None`, the number of available physical CPUs is used as the worker count.
pub fn run(
    listener: TcpListener,
    nb_workers: Option<usize>,
    db_pool: SqlitePool,
    job_store: BatchJobStore,
    rasterizer: PdftoppmRasterizer,
    delivery: PageDeliveryWebhookRepository,
    invoice_repository: InvoiceSqliteRepository,
    storage: StorageSettings,
) -> Result<Server, std::io::Error> {
    let db_pool = Data::new(db_pool);

    // Wraps shared state in `actix_web::Data` (`Arc`) to register it and
    // access it from handlers. The job store is the process-wide registry:
    // submission, drain loops and the completion webhook all go through
    // this one instance.
    let job_store = Data::new(job_store);
    let rasterizer = Data::new(rasterizer);
    let delivery = Data::new(delivery);
    let invoice_repository = Data::new(invoice_repository);
    let storage = Data::new(storage);

    // `move` to capture variables from the surrounding environment
    let server = HttpServer::new(move || {
        info!("Starting actix-web worker");

        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/upload", web::post().to(submit_batch))
            .route("/job-status/{job_id}", web::get().to(job_status))
            .route("/webhook/{callback_path}", web::post().to(completion_webhook))
            .route("/invoices", web::get().to(list_invoices))
            .route("/invoices", web::post().to(add_invoice))
            .route("/invoices/export", web::get().to(export_invoices))
            .app_data(db_pool.clone())
            .app_data(job_store.clone())
            .app_data(rasterizer.clone())
            .app_data(delivery.clone())
            .app_data(invoice_repository.clone())
            .app_data(storage.clone())
    })
    .listen(listener)?;

    // If no workers were set, use the actix-web settings (number of workers = number of physical CPUs)
    if let Some(nb_workers) = nb_workers {
        return Ok(server.workers(nb_workers).run());
    }

    // No await
    Ok(server.run())
}

pub fn get_connection_pool(settings: &DatabaseSettings) -> SqlitePool {
    SqlitePoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(settings.connect_options())
}
