use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::lock;
use crate::models::photos::{Dimensions, Photo, PhotoId, SizeVariant};
use crate::remote::ImageCacheProvider;

/// Read-only view over the external image cache. A miss and a failed lookup are the same
/// thing here: both resolve to the remote URL.
pub struct ImageCacheResolver<C: ?Sized> {
    cache: Arc<C>,
}

impl<C: ?Sized> Clone for ImageCacheResolver<C> {
    fn clone(&self) -> Self {
        ImageCacheResolver {
            cache: self.cache.clone(),
        }
    }
}

impl<C: ImageCacheProvider + ?Sized> ImageCacheResolver<C> {
    pub fn new(cache: Arc<C>) -> Self {
        ImageCacheResolver { cache }
    }

    pub async fn resolve(&self, photo_id: &str, size: SizeVariant, fallback: &str) -> String {
        self.cached(photo_id, size)
            .await
            .unwrap_or_else(|| fallback.to_string())
    }

    async fn cached(&self, photo_id: &str, size: SizeVariant) -> Option<String> {
        match self.cache.get_cached_image_url(photo_id, size).await {
            Ok(Some(reference)) if !reference.trim().is_empty() => Some(reference),
            Ok(_) => None,
            Err(err) => {
                debug!(photo_id, %size, "Cache lookup failed, using remote URL: {}", err);
                None
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageKey {
    pub photo_id: PhotoId,
    pub size: SizeVariant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    /// Blank region reserved at the final size until a source is known.
    Placeholder { key: ImageKey, dimensions: Dimensions },
    Showing {
        key: ImageKey,
        dimensions: Dimensions,
        source: String,
        /// The rendition actually on screen; lower than `key.size` mid-way through a
        /// progressive load.
        shown: SizeVariant,
    },
}

impl SlotState {
    pub fn key(&self) -> Option<&ImageKey> {
        match self {
            SlotState::Empty => None,
            SlotState::Placeholder { key, .. } | SlotState::Showing { key, .. } => Some(key),
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            SlotState::Showing { source, .. } => Some(source.as_str()),
            _ => None,
        }
    }
}

struct SlotInner {
    generation: u64,
    state: SlotState,
}

/// One rendered image. Rebinding the slot to another photo or size invalidates every
/// resolution still in flight for the previous key.
pub struct ImageSlot<C: ?Sized> {
    resolver: ImageCacheResolver<C>,
    inner: Mutex<SlotInner>,
}

impl<C: ImageCacheProvider + ?Sized> ImageSlot<C> {
    pub fn new(resolver: ImageCacheResolver<C>) -> Self {
        ImageSlot {
            resolver,
            inner: Mutex::new(SlotInner {
                generation: 0,
                state: SlotState::Empty,
            }),
        }
    }

    pub fn state(&self) -> SlotState {
        lock(&self.inner).state.clone()
    }

    /// Shows `size` of `photo`. Returns `false` if the slot was rebound before the source
    /// resolved, in which case nothing was applied.
    pub async fn load(&self, photo: &Photo, size: SizeVariant) -> bool {
        let (generation, key, dimensions) = self.bind(photo, size);
        let source = self
            .resolver
            .resolve(&photo.id, size, photo.url_for(size))
            .await;
        self.apply(generation, key, dimensions, source, size)
    }

    /// Paints the thumbnail first, then swaps in `target` once it resolves.
    pub async fn load_progressive(&self, photo: &Photo, target: SizeVariant) -> bool {
        if target == SizeVariant::Thumbnail {
            return self.load(photo, target).await;
        }

        let (generation, key, dimensions) = self.bind(photo, target);
        let preview = self
            .resolver
            .resolve(&photo.id, SizeVariant::Thumbnail, &photo.thumbnail)
            .await;
        if !self.apply(
            generation,
            key.clone(),
            dimensions,
            preview,
            SizeVariant::Thumbnail,
        ) {
            return false;
        }

        let source = self
            .resolver
            .resolve(&photo.id, target, photo.url_for(target))
            .await;
        self.apply(generation, key, dimensions, source, target)
    }

    /// Unbinds the slot; late results for the old key are discarded.
    pub fn clear(&self) {
        let mut inner = lock(&self.inner);
        inner.generation += 1;
        inner.state = SlotState::Empty;
    }

    fn bind(&self, photo: &Photo, size: SizeVariant) -> (u64, ImageKey, Dimensions) {
        let key = ImageKey {
            photo_id: photo.id.clone(),
            size,
        };
        let dimensions = photo.dimensions_for(size);

        let mut inner = lock(&self.inner);
        inner.generation += 1;
        inner.state = SlotState::Placeholder {
            key: key.clone(),
            dimensions,
        };
        (inner.generation, key, dimensions)
    }

    fn apply(
        &self,
        generation: u64,
        key: ImageKey,
        dimensions: Dimensions,
        source: String,
        shown: SizeVariant,
    ) -> bool {
        let mut inner = lock(&self.inner);
        if inner.generation != generation {
            debug!(photo_id = %key.photo_id, size = %key.size, "Discarding stale image resolution");
            return false;
        }
        inner.state = SlotState::Showing {
            key,
            dimensions,
            source,
            shown,
        };
        true
    }
}
