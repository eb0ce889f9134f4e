//! In-process backend laid out like the real bucket, with injectable failures.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_std::channel::{self, Receiver, Sender};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;
use url::Url;

use galleria_api_structs::{
    DriveStatus, PhotoMetadata, S3Config, SessionDescriptor, UploadProgress,
};

use super::{
    Command, ConfigProvider, DatabaseProvider, DriveSync, Error, ImageCacheProvider,
    PhotoProvider, SessionProvider,
};
use crate::lock;
use crate::models::photos::SizeVariant;
use crate::progress::ProgressBus;

#[derive(Default)]
struct State {
    objects: BTreeMap<String, String>,
    cached_images: HashMap<(String, SizeVariant), String>,
    storage: Option<S3Config>,
    drive_config: Option<S3Config>,
    accounts: HashMap<String, SessionDescriptor>,
    oauth_clients: HashMap<String, String>,
    drive_tokens: HashSet<String>,
    signed_in: Option<i64>,
    database_ready: bool,
    failing: HashSet<Command>,
    holds: HashMap<Command, Receiver<()>>,
    calls: Vec<Command>,
    next_id: u64,
}

/// Keeps a command stalled until released or dropped.
pub struct Hold {
    _release: Sender<()>,
}

impl Hold {
    pub fn release(self) {}
}

pub struct MemoryBackend {
    state: Mutex<State>,
    progress: Arc<ProgressBus>,
}

impl MemoryBackend {
    pub fn new(progress: Arc<ProgressBus>) -> Self {
        MemoryBackend {
            state: Mutex::new(State::default()),
            progress,
        }
    }

    /// Starts out signed in with `storage` already configured.
    pub fn with_storage(progress: Arc<ProgressBus>, storage: S3Config) -> Self {
        let backend = MemoryBackend::new(progress);
        {
            let mut state = lock(&backend.state);
            state.storage = Some(storage);
            state.signed_in = Some(1);
        }
        backend
    }

    pub fn register_account(&self, token: &str, descriptor: SessionDescriptor) {
        lock(&self.state)
            .accounts
            .insert(token.to_string(), descriptor);
    }

    pub fn register_oauth_client(&self, client_id: &str, token: &str) {
        lock(&self.state)
            .oauth_clients
            .insert(client_id.to_string(), token.to_string());
    }

    pub fn grant_drive_access(&self, access_token: &str) {
        lock(&self.state)
            .drive_tokens
            .insert(access_token.to_string());
    }

    /// Stores a listed photo as the shell would after an upload.
    pub fn insert_photo(&self, photo: PhotoMetadata) -> Result<(), Error> {
        let json = serde_json::to_string(&photo)
            .map_err(|err| Error::command(Command::UploadPhotos, err.to_string()))?;
        lock(&self.state)
            .objects
            .insert(metadata_key(&photo.id), json);
        Ok(())
    }

    pub fn cache_image(&self, photo_id: &str, size: SizeVariant, reference: &str) {
        lock(&self.state)
            .cached_images
            .insert((photo_id.to_string(), size), reference.to_string());
    }

    pub fn fail(&self, command: Command) {
        lock(&self.state).failing.insert(command);
    }

    pub fn recover(&self, command: Command) {
        lock(&self.state).failing.remove(&command);
    }

    /// Stalls the next call of `command` after it has read its inputs, until the returned
    /// hold is released.
    pub fn hold(&self, command: Command) -> Hold {
        let (release, held) = channel::bounded(1);
        lock(&self.state).holds.insert(command, held);
        Hold { _release: release }
    }

    pub fn calls(&self) -> Vec<Command> {
        lock(&self.state).calls.clone()
    }

    pub fn storage(&self) -> Option<S3Config> {
        lock(&self.state).storage.clone()
    }

    pub fn drive_config(&self) -> Option<S3Config> {
        lock(&self.state).drive_config.clone()
    }

    pub fn database_ready(&self) -> bool {
        lock(&self.state).database_ready
    }

    /// Records the call and applies any injected failure. Returns the hold to wait on.
    fn enter(&self, command: Command) -> Result<Option<Receiver<()>>, Error> {
        let mut state = lock(&self.state);
        state.calls.push(command);
        if state.failing.contains(&command) {
            return Err(Error::command(command, "injected failure"));
        }
        Ok(state.holds.remove(&command))
    }

    fn storage_or_err(&self) -> Result<S3Config, Error> {
        let state = lock(&self.state);
        if state.signed_in.is_none() {
            return Err(Error::NotLoggedIn);
        }
        state.storage.clone().ok_or(Error::NotConfigured)
    }

    fn listing(&self) -> Result<Vec<PhotoMetadata>, Error> {
        let state = lock(&self.state);
        let mut photos = state
            .objects
            .values()
            .map(|json| serde_json::from_str::<PhotoMetadata>(json))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| Error::command(Command::ListPhotos, err.to_string()))?;
        photos.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        Ok(photos)
    }

    fn stored_photo(&self, storage: &S3Config, file: &Path) -> Result<PhotoMetadata, Error> {
        let base = Url::parse(&format!(
            "https://{}.s3.{}.amazonaws.com/",
            storage.bucket, storage.region
        ))
        .map_err(|err| Error::command(Command::UploadPhotos, err.to_string()))?;
        let upload_date = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|err| Error::command(Command::UploadPhotos, err.to_string()))?;

        let id = {
            let mut state = lock(&self.state);
            state.next_id += 1;
            format!("photo-{:04}", state.next_id)
        };
        let url = |size: SizeVariant| -> Result<String, Error> {
            base.join(&format!("photos/{}/{}.jpg", id, size))
                .map(String::from)
                .map_err(|err| Error::command(Command::UploadPhotos, err.to_string()))
        };

        Ok(PhotoMetadata {
            id: id.clone(),
            original_name: file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unknown.jpg".to_string()),
            upload_date,
            file_size: 0,
            thumbnail_url: url(SizeVariant::Thumbnail)?,
            small_url: url(SizeVariant::Small)?,
            medium_url: url(SizeVariant::Medium)?,
            large_url: url(SizeVariant::Large)?,
            original_url: url(SizeVariant::Original)?,
            width: 0,
            height: 0,
        })
    }
}

fn metadata_key(photo_id: &str) -> String {
    format!("metadata/{}.json", photo_id)
}

async fn wait(held: Option<Receiver<()>>) {
    if let Some(held) = held {
        // Resolves on release and when the hold is dropped.
        let _ = held.recv().await;
    }
}

#[async_trait::async_trait]
impl DatabaseProvider for MemoryBackend {
    async fn init_database(&self) -> Result<(), Error> {
        let held = self.enter(Command::InitDatabase)?;
        wait(held).await;
        lock(&self.state).database_ready = true;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PhotoProvider for MemoryBackend {
    async fn list_photos(&self, use_cache: bool) -> Result<Vec<PhotoMetadata>, Error> {
        // Snapshot before the call is recorded, like a listing that is already on the
        // wire by the time anyone sees the request.
        let photos = self.storage_or_err().and_then(|_| self.listing());
        let held = self.enter(Command::ListPhotos)?;
        let photos = photos?;
        debug!(use_cache, count = photos.len(), "Listing photos");

        wait(held).await;
        Ok(photos)
    }

    async fn delete_photo(&self, photo_id: &str) -> Result<(), Error> {
        let held = self.enter(Command::DeletePhoto)?;
        self.storage_or_err()?;
        wait(held).await;

        let mut state = lock(&self.state);
        state.objects.remove(&metadata_key(photo_id));
        state
            .cached_images
            .retain(|(cached_id, _), _| cached_id != photo_id);
        Ok(())
    }

    async fn upload_photos(&self, files: &[PathBuf]) -> Result<(), Error> {
        let held = self.enter(Command::UploadPhotos)?;
        let storage = self.storage_or_err()?;
        wait(held).await;

        for (index, file) in files.iter().enumerate() {
            self.progress.emit(UploadProgress::new(
                file.to_string_lossy(),
                (index * 100 / files.len()) as u8,
                "Processing",
            ));
            let photo = self.stored_photo(&storage, file)?;
            self.insert_photo(photo)?;
        }

        self.progress
            .emit(UploadProgress::new("All files", 100, "Complete"));
        Ok(())
    }
}

#[async_trait::async_trait]
impl ImageCacheProvider for MemoryBackend {
    async fn get_cached_image_url(
        &self,
        photo_id: &str,
        size: SizeVariant,
    ) -> Result<Option<String>, Error> {
        let held = self.enter(Command::GetCachedImageUrl)?;
        wait(held).await;
        Ok(lock(&self.state)
            .cached_images
            .get(&(photo_id.to_string(), size))
            .cloned())
    }
}

#[async_trait::async_trait]
impl ConfigProvider for MemoryBackend {
    async fn configure_s3(&self, config: &S3Config) -> Result<(), Error> {
        let held = self.enter(Command::ConfigureS3)?;
        wait(held).await;

        let mut state = lock(&self.state);
        let user_id = state.signed_in.ok_or(Error::NotLoggedIn)?;
        state.storage = Some(config.clone());
        for account in state.accounts.values_mut() {
            if account.user_id == user_id {
                account.has_s3_config = true;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DriveSync for MemoryBackend {
    async fn sync_config_to_drive(
        &self,
        access_token: &str,
        config: &S3Config,
    ) -> Result<(), Error> {
        let held = self.enter(Command::SyncConfigToDrive)?;
        wait(held).await;

        let mut state = lock(&self.state);
        if !state.drive_tokens.contains(access_token) {
            return Err(Error::command(
                Command::SyncConfigToDrive,
                "drive access not granted, settings are only saved locally",
            ));
        }
        state.drive_config = Some(config.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionProvider for MemoryBackend {
    async fn google_login(&self, token: &str) -> Result<SessionDescriptor, Error> {
        let held = self.enter(Command::GoogleLogin)?;
        wait(held).await;

        let mut state = lock(&self.state);
        let mut descriptor = state
            .accounts
            .get(token)
            .cloned()
            .ok_or_else(|| Error::command(Command::GoogleLogin, "invalid token"))?;
        descriptor.has_s3_config |= state.storage.is_some();
        state.signed_in = Some(descriptor.user_id);
        Ok(descriptor)
    }

    async fn check_drive_permission(&self, access_token: &str) -> Result<DriveStatus, Error> {
        let held = self.enter(Command::CheckDrivePermission)?;
        wait(held).await;

        Ok(DriveStatus {
            has_drive_access: lock(&self.state).drive_tokens.contains(access_token),
            ..Default::default()
        })
    }

    async fn complete_oauth_flow(&self, client_id: &str) -> Result<String, Error> {
        let held = self.enter(Command::CompleteOauthFlow)?;
        wait(held).await;

        lock(&self.state)
            .oauth_clients
            .get(client_id)
            .cloned()
            .ok_or_else(|| Error::command(Command::CompleteOauthFlow, "unknown client id"))
    }

    async fn logout(&self) -> Result<(), Error> {
        let held = self.enter(Command::Logout)?;
        wait(held).await;

        lock(&self.state).signed_in = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> S3Config {
        S3Config {
            bucket: "holiday".into(),
            region: "eu-west-1".into(),
            access_key: "AKIA".into(),
            secret_key: "secret".into(),
        }
    }

    #[async_std::test]
    async fn uploads_land_in_listing_with_bucket_urls() {
        let bus = ProgressBus::new();
        let backend = MemoryBackend::with_storage(bus.clone(), storage());

        backend
            .upload_photos(&[PathBuf::from("/home/sam/beach.jpg")])
            .await
            .unwrap();
        let listing = backend.list_photos(true).await.unwrap();

        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].original_name, "beach.jpg");
        assert_eq!(
            listing[0].thumbnail_url,
            format!(
                "https://holiday.s3.eu-west-1.amazonaws.com/photos/{}/thumbnail.jpg",
                listing[0].id
            )
        );
    }

    #[async_std::test]
    async fn upload_reports_progress_on_the_bus() {
        let bus = ProgressBus::new();
        let subscription = bus.subscribe();
        let backend = MemoryBackend::with_storage(bus.clone(), storage());

        backend
            .upload_photos(&[PathBuf::from("a.jpg"), PathBuf::from("b.jpg")])
            .await
            .unwrap();

        assert_eq!(
            subscription.latest(),
            Some(UploadProgress::new("All files", 100, "Complete"))
        );
    }

    #[async_std::test]
    async fn commands_require_configured_storage() {
        let backend = MemoryBackend::new(ProgressBus::new());
        assert_eq!(backend.list_photos(true).await, Err(Error::NotLoggedIn));
    }

    #[async_std::test]
    async fn injected_failures_are_recorded() {
        let backend = MemoryBackend::with_storage(ProgressBus::new(), storage());
        backend.fail(Command::DeletePhoto);

        assert!(backend.delete_photo("p1").await.is_err());
        backend.recover(Command::DeletePhoto);
        assert!(backend.delete_photo("p1").await.is_ok());
        assert_eq!(
            backend.calls(),
            vec![Command::DeletePhoto, Command::DeletePhoto]
        );
    }
}
