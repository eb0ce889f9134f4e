use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::lock;
use crate::models::photos::{Photo, PhotoId};
use crate::remote::{self, PhotoProvider};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GalleryState {
    /// Most recent first, as listed by the backend.
    pub photos: Vec<Photo>,
    pub is_loading: bool,
    pub selected: Option<PhotoId>,
}

impl GalleryState {
    pub fn selected_photo(&self) -> Option<&Photo> {
        let selected = self.selected.as_ref()?;
        self.photos.iter().find(|photo| &photo.id == selected)
    }

    fn clear_selection_unless_present(&mut self) {
        if self.selected.is_some() && self.selected_photo().is_none() {
            self.selected = None;
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to delete photo {photo_id}: {source}")]
pub struct DeleteError {
    pub photo_id: PhotoId,
    #[source]
    pub source: remote::Error,
}

#[derive(Default)]
struct Inner {
    view: GalleryState,
    /// Bumped by `reset`; listings issued under an older epoch are dropped.
    epoch: u64,
    /// Bumped on every confirmed delete.
    delete_version: u64,
    /// Delete version each in-flight fetch was issued at, with multiplicity.
    in_flight: BTreeMap<u64, usize>,
    tombstones: Vec<(u64, PhotoId)>,
}

impl Inner {
    fn begin_fetch(&mut self) -> FetchTicket {
        *self.in_flight.entry(self.delete_version).or_insert(0) += 1;
        self.view.is_loading = true;
        FetchTicket {
            epoch: self.epoch,
            issued_at: self.delete_version,
        }
    }

    fn finish_fetch(&mut self, issued_at: u64) {
        if let Some(count) = self.in_flight.get_mut(&issued_at) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(&issued_at);
            }
        }
        self.view.is_loading = !self.in_flight.is_empty();

        // Only fetches issued before a tombstone can resurrect its photo.
        match self.in_flight.keys().next().copied() {
            Some(oldest) => self.tombstones.retain(|(version, _)| *version > oldest),
            None => self.tombstones.clear(),
        }
    }

    fn deleted_since(&self, issued_at: u64, photo_id: &str) -> bool {
        self.tombstones
            .iter()
            .any(|(version, id)| *version > issued_at && id == photo_id)
    }
}

#[derive(Clone, Copy, Debug)]
struct FetchTicket {
    epoch: u64,
    issued_at: u64,
}

/// Owned handle to the gallery state. Clones share the same state.
pub struct GalleryStore<B: ?Sized> {
    backend: Arc<B>,
    inner: Arc<Mutex<Inner>>,
}

impl<B: ?Sized> Clone for GalleryStore<B> {
    fn clone(&self) -> Self {
        GalleryStore {
            backend: self.backend.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<B: PhotoProvider + ?Sized> GalleryStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        GalleryStore {
            backend,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub(crate) fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn snapshot(&self) -> GalleryState {
        lock(&self.inner).view.clone()
    }

    pub fn photos(&self) -> Vec<Photo> {
        lock(&self.inner).view.photos.clone()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.inner).view.is_loading
    }

    pub fn selected_photo(&self) -> Option<Photo> {
        lock(&self.inner).view.selected_photo().cloned()
    }

    /// Replaces the collection with a fresh listing. Failures keep the current photos and
    /// are only logged.
    ///
    /// Overlapping fetches are not serialized, the listing that resolves last wins. Photos
    /// whose delete was confirmed after this fetch was issued are filtered out of its
    /// listing.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_photos(&self, use_cache: bool) {
        let ticket = lock(&self.inner).begin_fetch();
        let issued_at = ticket.issued_at;

        let result = self.backend.list_photos(use_cache).await;

        let mut inner = lock(&self.inner);
        if inner.epoch != ticket.epoch {
            debug!("Dropping listing issued before the store was reset");
            return;
        }
        match result {
            Ok(listing) => {
                let photos: Vec<Photo> = listing
                    .into_iter()
                    .filter_map(|metadata| match Photo::try_from(metadata) {
                        Ok(photo) => Some(photo),
                        Err(err) => {
                            warn!("Skipping listed photo: {}", err);
                            None
                        },
                    })
                    .filter(|photo| !inner.deleted_since(issued_at, &photo.id))
                    .collect();
                info!(count = photos.len(), "Fetched photos");

                inner.view.photos = photos;
                inner.view.clear_selection_unless_present();
            },
            Err(err) => {
                error!("Failed to fetch photos: {}", err);
            },
        }
        inner.finish_fetch(issued_at);
    }

    /// Deletes remotely, then locally. On failure nothing changes and the error is
    /// returned for the caller to show.
    #[tracing::instrument(skip(self))]
    pub async fn delete_photo(&self, photo_id: &str) -> Result<(), DeleteError> {
        if let Err(source) = self.backend.delete_photo(photo_id).await {
            error!("Failed to delete photo: {}", source);
            return Err(DeleteError {
                photo_id: photo_id.to_string(),
                source,
            });
        }

        let mut inner = lock(&self.inner);
        inner.view.photos.retain(|photo| photo.id != photo_id);
        if inner.view.selected.as_deref() == Some(photo_id) {
            inner.view.selected = None;
        }
        inner.delete_version += 1;
        if !inner.in_flight.is_empty() {
            let version = inner.delete_version;
            inner.tombstones.push((version, photo_id.to_string()));
        }
        info!("Deleted photo");

        Ok(())
    }

    pub fn set_selected_photo(&self, photo: Option<&Photo>) {
        lock(&self.inner).view.selected = photo.map(|photo| photo.id.clone());
    }

    /// Forgets every photo, e.g. after sign-out. Fetches still in flight are discarded
    /// when they resolve.
    pub fn reset(&self) {
        let mut inner = lock(&self.inner);
        let epoch = inner.epoch + 1;
        *inner = Inner {
            epoch,
            ..Inner::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use galleria_api_structs::PhotoMetadata;

    use super::*;
    use crate::remote::{Command, Error};

    struct Listing {
        photos: Mutex<Vec<PhotoMetadata>>,
        fail_list: bool,
        fail_delete: bool,
    }

    impl Listing {
        fn new(ids: &[&str]) -> Arc<Self> {
            Arc::new(Listing {
                photos: Mutex::new(ids.iter().map(|id| metadata(id)).collect()),
                fail_list: false,
                fail_delete: false,
            })
        }
    }

    #[async_trait::async_trait]
    impl PhotoProvider for Listing {
        async fn list_photos(&self, _use_cache: bool) -> Result<Vec<PhotoMetadata>, Error> {
            if self.fail_list {
                return Err(Error::command(Command::ListPhotos, "SlowDown"));
            }
            Ok(lock(&self.photos).clone())
        }

        async fn delete_photo(&self, photo_id: &str) -> Result<(), Error> {
            if self.fail_delete {
                return Err(Error::command(Command::DeletePhoto, "AccessDenied"));
            }
            lock(&self.photos).retain(|p| p.id != photo_id);
            Ok(())
        }

        async fn upload_photos(&self, _files: &[PathBuf]) -> Result<(), Error> {
            Ok(())
        }
    }

    fn metadata(id: &str) -> PhotoMetadata {
        PhotoMetadata {
            id: id.into(),
            original_name: format!("{}.jpg", id),
            upload_date: "2024-01-01T10:00:00Z".into(),
            file_size: 10,
            thumbnail_url: format!("https://cdn/{}/thumbnail.jpg", id),
            small_url: String::new(),
            medium_url: String::new(),
            large_url: String::new(),
            original_url: format!("https://cdn/{}/original.jpg", id),
            width: 10,
            height: 10,
        }
    }

    fn ids(store: &GalleryStore<Listing>) -> Vec<String> {
        store.photos().into_iter().map(|p| p.id).collect()
    }

    #[async_std::test]
    async fn fetch_replaces_collection_and_clears_loading() {
        let store = GalleryStore::new(Listing::new(&["p2", "p1"]));
        store.fetch_photos(true).await;

        assert_eq!(ids(&store), vec!["p2", "p1"]);
        assert!(!store.is_loading());
    }

    #[async_std::test]
    async fn failed_fetch_keeps_previous_photos() {
        let backend = Listing::new(&["p1"]);
        let store = GalleryStore::new(backend.clone());
        store.fetch_photos(true).await;

        let failing = Arc::new(Listing {
            photos: Mutex::new(Vec::new()),
            fail_list: true,
            fail_delete: false,
        });
        let failing_store = GalleryStore {
            backend: failing,
            inner: store.inner.clone(),
        };
        failing_store.fetch_photos(false).await;

        assert_eq!(ids(&store), vec!["p1"]);
        assert!(!store.is_loading());
    }

    #[async_std::test]
    async fn delete_clears_matching_selection_only() {
        let store = GalleryStore::new(Listing::new(&["p1", "p2"]));
        store.fetch_photos(true).await;

        let p2 = store.photos()[1].clone();
        store.set_selected_photo(Some(&p2));
        store.delete_photo("p1").await.unwrap();
        assert_eq!(store.selected_photo().map(|p| p.id), Some("p2".to_string()));

        store.delete_photo("p2").await.unwrap();
        assert_eq!(store.selected_photo(), None);
        assert!(store.photos().is_empty());
    }

    #[async_std::test]
    async fn failed_delete_leaves_collection_untouched() {
        let backend = Arc::new(Listing {
            photos: Mutex::new(vec![metadata("p1")]),
            fail_list: false,
            fail_delete: true,
        });
        let store = GalleryStore::new(backend);
        store.fetch_photos(true).await;

        let err = store.delete_photo("p1").await.unwrap_err();
        assert_eq!(err.photo_id, "p1");
        assert_eq!(ids(&store), vec!["p1"]);
    }

    #[async_std::test]
    async fn invalid_listing_entries_are_skipped() {
        let backend = Listing::new(&["p1", "p2"]);
        lock(&backend.photos)[0].original_url.clear();
        let store = GalleryStore::new(backend);
        store.fetch_photos(true).await;

        assert_eq!(ids(&store), vec!["p2"]);
    }

    #[test]
    fn tombstones_only_filter_older_fetches() {
        let mut inner = Inner::default();
        let old_fetch = inner.begin_fetch();

        inner.delete_version += 1;
        inner.tombstones.push((inner.delete_version, "p1".into()));
        let new_fetch = inner.begin_fetch();

        assert!(inner.deleted_since(old_fetch.issued_at, "p1"));
        assert!(!inner.deleted_since(new_fetch.issued_at, "p1"));

        inner.finish_fetch(old_fetch.issued_at);
        assert!(inner.tombstones.is_empty());
        assert!(inner.view.is_loading);

        inner.finish_fetch(new_fetch.issued_at);
        assert!(!inner.view.is_loading);
    }
}
