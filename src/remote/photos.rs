use std::path::PathBuf;

use galleria_api_structs::PhotoMetadata;

use super::Error;

#[async_trait::async_trait]
pub trait PhotoProvider: Send + Sync {
    /// The whole library, most recent first. With `use_cache` the provider may answer from
    /// its local catalog instead of listing the bucket.
    async fn list_photos(&self, use_cache: bool) -> Result<Vec<PhotoMetadata>, Error>;

    async fn delete_photo(&self, photo_id: &str) -> Result<(), Error>;

    /// Uploads the batch as a single request. Progress is reported out of band on the
    /// `upload-progress` event stream.
    async fn upload_photos(&self, files: &[PathBuf]) -> Result<(), Error>;
}
