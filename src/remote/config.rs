use galleria_api_structs::S3Config;

use super::Error;

#[async_trait::async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn configure_s3(&self, config: &S3Config) -> Result<(), Error>;
}

/// Optional cross-device replication of the storage configuration.
#[async_trait::async_trait]
pub trait DriveSync: Send + Sync {
    async fn sync_config_to_drive(&self, access_token: &str, config: &S3Config)
        -> Result<(), Error>;
}
