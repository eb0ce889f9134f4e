use std::path::PathBuf;
use std::sync::Arc;

use async_std::task;
use tracing::{error, info, warn};

use galleria_api_structs::{S3Config, UploadProgress};

use crate::cache::{ImageCacheResolver, ImageSlot};
use crate::config_sync::{ConfigSyncPolicy, SaveError, SaveOutcome};
use crate::grouping::{DateGroup, DateGroupingPresenter};
use crate::models::photos::Photo;
use crate::models::session::AuthSession;
use crate::progress::ProgressBus;
use crate::remote::{self, Backend};
use crate::settings::Settings;
use crate::store::{DeleteError, GalleryState, GalleryStore};
use crate::upload::{UploadCoordinator, UploadError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewState {
    SignedOut,
    /// Signed in, but no bucket configured yet.
    NeedsStorageConfig,
    Ready,
}

pub struct Gallery<B: Backend> {
    backend: Arc<B>,
    settings: Settings,
    session: Option<AuthSession>,
    store: GalleryStore<B>,
    uploads: UploadCoordinator<B>,
    resolver: ImageCacheResolver<B>,
    presenter: DateGroupingPresenter,
}

impl<B: Backend + 'static> Gallery<B> {
    /// Mounts the view. The local catalog is initialised in the background; a failure
    /// there is logged and otherwise ignored.
    pub fn start(backend: Arc<B>, progress: &Arc<ProgressBus>, settings: Settings) -> Self {
        {
            let backend = backend.clone();
            task::spawn(async move {
                if let Err(err) = backend.init_database().await {
                    error!("Failed to initialise database: {}", err);
                }
            });
        }

        let store = GalleryStore::new(backend.clone());
        let uploads =
            UploadCoordinator::mount(store.clone(), progress, settings.progress_clear_delay());

        Gallery {
            resolver: ImageCacheResolver::new(backend.clone()),
            presenter: DateGroupingPresenter::new(settings.display_zone()),
            backend,
            settings,
            session: None,
            store,
            uploads,
        }
    }

    /// Unmounts the view, releasing the progress subscription.
    pub async fn shutdown(self) {
        self.uploads.unmount().await;
    }

    pub fn view(&self) -> ViewState {
        match &self.session {
            None => ViewState::SignedOut,
            Some(session) if !session.has_s3_config => ViewState::NeedsStorageConfig,
            Some(_) => ViewState::Ready,
        }
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn store(&self) -> &GalleryStore<B> {
        &self.store
    }

    #[tracing::instrument(skip_all)]
    pub async fn sign_in(&mut self, token: &str) -> Result<ViewState, remote::Error> {
        let descriptor = self.backend.google_login(token).await?;
        let mut session = AuthSession::new(descriptor, Some(token.to_string()));

        session.has_drive_access = match self.backend.check_drive_permission(token).await {
            Ok(status) => status.has_drive_access,
            Err(err) => {
                warn!("Could not check drive permission: {}", err);
                false
            },
        };
        info!(
            user_id = session.user_id,
            has_s3_config = session.has_s3_config,
            "Signed in"
        );

        let ready = session.has_s3_config;
        self.session = Some(session);
        if ready {
            self.store
                .fetch_photos(self.settings.initial_fetch_uses_cache)
                .await;
        }

        Ok(self.view())
    }

    /// Runs the browser round-trip for `client_id`, then signs in with its token.
    pub async fn sign_in_with_oauth(
        &mut self,
        client_id: &str,
    ) -> Result<ViewState, remote::Error> {
        let token = self.backend.complete_oauth_flow(client_id).await?;
        self.sign_in(&token).await
    }

    pub async fn sign_out(&mut self) -> Result<(), remote::Error> {
        self.backend.logout().await?;
        self.session = None;
        self.store.reset();
        info!("Signed out");
        Ok(())
    }

    /// Saves the bucket configuration and loads the gallery from it.
    pub async fn save_storage_config(
        &mut self,
        config: &S3Config,
    ) -> Result<SaveOutcome, SaveError> {
        let session = self
            .session
            .as_mut()
            .ok_or(SaveError::NotSignedIn)?;

        let outcome = ConfigSyncPolicy::new(self.backend.as_ref())
            .save(config, session)
            .await?;
        self.store.fetch_photos(false).await;

        Ok(outcome)
    }

    pub async fn refresh(&self) {
        self.store.fetch_photos(false).await;
    }

    pub async fn upload(&self, files: &[PathBuf]) -> Result<(), UploadError> {
        self.uploads.upload(files).await
    }

    pub fn upload_progress(&self) -> Option<UploadProgress> {
        self.uploads.current_progress()
    }

    pub async fn delete_photo(&self, photo_id: &str) -> Result<(), DeleteError> {
        self.store.delete_photo(photo_id).await
    }

    pub fn select(&self, photo: Option<&Photo>) {
        self.store.set_selected_photo(photo);
    }

    pub fn state(&self) -> GalleryState {
        self.store.snapshot()
    }

    /// Groups a snapshot of the collection by day. Borrow `photos` from [`Gallery::state`].
    pub fn group<'a>(&self, photos: &'a [Photo]) -> Vec<DateGroup<'a>> {
        self.presenter.present(photos)
    }

    /// A fresh slot for one rendered image.
    pub fn image_slot(&self) -> ImageSlot<B> {
        ImageSlot::new(self.resolver.clone())
    }
}
