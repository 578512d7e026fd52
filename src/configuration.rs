use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub storage: StorageSettings,
    pub rasterizer: RasterizerSettings,
    pub delivery: DeliverySettings,
    pub jobs: JobsSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    /// Path of the SQLite database file holding the invoice records
    pub path: String,
    pub create_if_missing: bool,
}

impl DatabaseSettings {
    pub fn connect_options(&self) -> SqliteConnectOptions {
        let mut options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(self.create_if_missing);
        // Lowers sqlx logs from INFO to TRACE level.
        options.log_statements(tracing::log::LevelFilter::Trace);
        options
    }
}

/// Directories owned by the service on the local filesystem.
///
/// They are created at startup if they do not exist yet.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    /// Where uploaded PDFs wait until their batch processes them
    pub uploads_dir: String,
    /// Where a copy of each rendered export document is kept
    pub exports_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RasterizerSettings {
    /// The external rasterization executable, `pdftoppm` in production.
    /// Overridable so tests can substitute a stub.
    pub command: String,
    /// Working directory the tool writes page images into
    pub image_dir: String,
    /// Restricts rasterization to the first page of each document
    pub first_page_only: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeliverySettings {
    /// Remote endpoint receiving the page images of each processed PDF
    pub webhook_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JobsSettings {
    /// How long a drained batch job stays pollable before eviction
    pub retention_secs: u64,
}

/// Extracts app settings from configuration files and env variables
///
/// `base.yaml` should contain shared settings for all environments.
/// A specific env file should be created for each environment: `local.yaml` and `production.yaml`
/// The environment is set with the env var `APP_ENVIRONMENT`.
/// If `APP_ENVIRONMENT` is not set, `local.yaml` is the default.
///
/// Settings are also taken from environment variables: with a prefix of APP and '__' as separator
/// For ex: `APP_APPLICATION__PORT=5001` would set `Settings.application.port`
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    // Detects the running environment.
    // Default to `local` if unspecified.
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .expect("Failed to parse APP_ENVIRONMENT.");
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        // Adds in settings from environment variables (with a prefix of APP and '__' as separator)
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

/// The possible runtime environment for our application.
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}
