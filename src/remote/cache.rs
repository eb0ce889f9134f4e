use super::Error;
use crate::models::photos::SizeVariant;

#[async_trait::async_trait]
pub trait ImageCacheProvider: Send + Sync {
    async fn get_cached_image_url(
        &self,
        photo_id: &str,
        size: SizeVariant,
    ) -> Result<Option<String>, Error>;
}
