use thiserror::Error;
use tracing::{info, warn};

use galleria_api_structs::S3Config;

use crate::models::session::AuthSession;
use crate::remote::{self, ConfigProvider, DriveSync};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Replication {
    Synced,
    /// The session has no drive access, so replication was not attempted.
    Skipped,
    /// Replication was attempted and failed; the primary save still stands.
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveOutcome {
    pub replication: Replication,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SaveError {
    #[error("sign in before configuring storage")]
    NotSignedIn,
    #[error("{0} is required")]
    Incomplete(&'static str),
    #[error("failed to save storage configuration: {0}")]
    Primary(#[source] remote::Error),
}

pub struct ConfigSyncPolicy<'a, B: ?Sized> {
    backend: &'a B,
}

impl<'a, B: ConfigProvider + DriveSync + ?Sized> ConfigSyncPolicy<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        ConfigSyncPolicy { backend }
    }

    /// On success the session is marked as having storage configured, whatever happened
    /// to replication.
    #[tracing::instrument(skip_all, fields(bucket = %config.bucket, region = %config.region))]
    pub async fn save(
        &self,
        config: &S3Config,
        session: &mut AuthSession,
    ) -> Result<SaveOutcome, SaveError> {
        if let Some(field) = config.missing_field() {
            return Err(SaveError::Incomplete(field));
        }

        self.backend
            .configure_s3(config)
            .await
            .map_err(SaveError::Primary)?;
        info!("Storage configuration saved");

        let replication = match session.drive_token() {
            None => Replication::Skipped,
            Some(token) => match self.backend.sync_config_to_drive(token, config).await {
                Ok(()) => {
                    info!("Storage configuration synced to drive");
                    Replication::Synced
                },
                Err(err) => {
                    warn!("Could not sync storage configuration to drive: {}", err);
                    Replication::Failed(err.to_string())
                },
            },
        };

        session.has_s3_config = true;
        Ok(SaveOutcome { replication })
    }
}
