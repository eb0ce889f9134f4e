use galleria_api_structs::{DriveStatus, SessionDescriptor};

use super::Error;

#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    async fn google_login(&self, token: &str) -> Result<SessionDescriptor, Error>;

    async fn check_drive_permission(&self, access_token: &str) -> Result<DriveStatus, Error>;

    /// Runs the browser round-trip and hands back the resulting token.
    async fn complete_oauth_flow(&self, client_id: &str) -> Result<String, Error>;

    async fn logout(&self) -> Result<(), Error>;
}
