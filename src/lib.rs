use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use structopt::StructOpt;
use tracing::info;

pub mod app;
pub mod cache;
pub mod config_sync;
pub mod grouping;
pub mod models;
pub mod progress;
pub mod remote;
pub mod settings;
pub mod store;
pub mod telemetry;
pub mod upload;

pub use app::{Gallery, ViewState};
pub use galleria_api_structs as api;
pub use settings::Settings;

#[derive(Debug, StructOpt)]
#[structopt(name = "galleria-sync")]
pub struct Args {
    #[structopt(flatten)]
    pub settings: Settings,

    /// Photos to upload into the preview bucket.
    #[structopt(parse(from_os_str))]
    pub files: Vec<PathBuf>,
}

#[derive(Debug)]
pub enum Error {
    SettingsError(structopt::clap::Error),
    TelemetryInitError(anyhow::Error),
    SignInError(remote::Error),
    UploadError(upload::UploadError),
}

impl From<Error> for u8 {
    fn from(error: Error) -> u8 {
        match error {
            Error::SettingsError(_) => 2,
            Error::TelemetryInitError(_) => 3,
            Error::SignInError(_) => 4,
            Error::UploadError(_) => 5,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::SettingsError(err) => {
                write!(f, "Invalid settings: {}", err)
            },
            Error::TelemetryInitError(err) => {
                write!(f, "Failed to init telemetry: {}", err)
            },
            Error::SignInError(err) => {
                write!(f, "Failed to sign in: {}", err)
            },
            Error::UploadError(err) => {
                write!(f, "Upload failed: {}", err)
            },
        }
    }
}

impl std::error::Error for Error {}

/// Loads `.env`, reads [`Settings`] from the environment and installs the tracing
/// subscriber. Call once from the embedding shell before building a [`Gallery`].
pub fn init() -> Result<Settings, Error> {
    dotenv::dotenv().ok();
    let settings = Settings::from_env().map_err(Error::SettingsError)?;

    telemetry::init(&settings).map_err(Error::TelemetryInitError)?;

    Ok(settings)
}

pub async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();
    let args = Args::from_args();

    telemetry::init(&args.settings).map_err(Error::TelemetryInitError)?;

    preview(args.settings, &args.files).await
}

/// Runs the gallery against an in-memory bucket: uploads `files`, then prints the
/// resulting day groups.
pub async fn preview(settings: Settings, files: &[PathBuf]) -> Result<(), Error> {

    let bus = progress::ProgressBus::new();
    let backend = Arc::new(remote::memory::MemoryBackend::with_storage(
        bus.clone(),
        api::S3Config {
            bucket: "galleria-preview".to_string(),
            region: "us-east-1".to_string(),
            access_key: "preview".to_string(),
            secret_key: "preview".to_string(),
        },
    ));
    backend.register_account(
        "preview",
        api::SessionDescriptor {
            user_id: 1,
            email: "preview@localhost".to_string(),
            name: "Preview".to_string(),
            picture_url: None,
            has_s3_config: true,
        },
    );

    let mut gallery = Gallery::start(backend, &bus, settings);
    gallery
        .sign_in("preview")
        .await
        .map_err(Error::SignInError)?;
    if !files.is_empty() {
        info!(count = files.len(), "Uploading");
        gallery.upload(files).await.map_err(Error::UploadError)?;
    }

    let state = gallery.state();
    for group in gallery.group(&state.photos) {
        println!("{}", group.label());
        for photo in group.photos {
            println!("  {}  {}", photo.original_name, photo.thumbnail);
        }
    }

    gallery.shutdown().await;
    Ok(())
}

// State guarded here is always left consistent before any await point, so a poisoned
// lock still holds usable data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
