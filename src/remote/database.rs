use super::Error;

#[async_trait::async_trait]
pub trait DatabaseProvider: Send + Sync {
    /// Prepare the local catalog. Called once at startup, nobody waits on it.
    async fn init_database(&self) -> Result<(), Error>;
}
