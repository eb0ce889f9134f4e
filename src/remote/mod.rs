use std::fmt;

use thiserror::Error;

pub mod cache;
pub mod config;
pub mod database;
pub mod memory;
pub mod photos;
pub mod session;

pub use cache::ImageCacheProvider;
pub use config::{ConfigProvider, DriveSync};
pub use database::DatabaseProvider;
pub use photos::PhotoProvider;
pub use session::SessionProvider;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    InitDatabase,
    ListPhotos,
    DeletePhoto,
    UploadPhotos,
    GetCachedImageUrl,
    ConfigureS3,
    SyncConfigToDrive,
    GoogleLogin,
    CheckDrivePermission,
    CompleteOauthFlow,
    Logout,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::InitDatabase => "init_database",
            Command::ListPhotos => "list_photos",
            Command::DeletePhoto => "delete_photo",
            Command::UploadPhotos => "upload_photos",
            Command::GetCachedImageUrl => "get_cached_image_url",
            Command::ConfigureS3 => "configure_s3",
            Command::SyncConfigToDrive => "sync_config_to_drive",
            Command::GoogleLogin => "google_login",
            Command::CheckDrivePermission => "check_drive_permission",
            Command::CompleteOauthFlow => "complete_oauth_flow",
            Command::Logout => "logout",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("not logged in")]
    NotLoggedIn,
    #[error("storage is not configured")]
    NotConfigured,
    #[error("{command} failed: {reason}")]
    Command { command: Command, reason: String },
}

impl Error {
    pub fn command(command: Command, reason: impl Into<String>) -> Self {
        Error::Command {
            command,
            reason: reason.into(),
        }
    }
}

pub trait Backend:
    DatabaseProvider + PhotoProvider + ImageCacheProvider + ConfigProvider + DriveSync + SessionProvider
{
}

impl<T> Backend for T where
    T: DatabaseProvider
        + PhotoProvider
        + ImageCacheProvider
        + ConfigProvider
        + DriveSync
        + SessionProvider
{
}
