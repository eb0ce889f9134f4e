use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_std::task::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, error, info};

use galleria_api_structs::UploadProgress;

use crate::lock;
use crate::progress::{ProgressBus, Subscription};
use crate::remote::{self, PhotoProvider};
use crate::store::GalleryStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("another upload is still running")]
    Busy,
    #[error("upload failed: {0}")]
    Submission(#[source] remote::Error),
}

#[derive(Default)]
struct DisplayState {
    current: Option<UploadProgress>,
    generation: u64,
}

/// The single "current progress" slot shown to the user.
#[derive(Default)]
struct ProgressDisplay {
    state: Mutex<DisplayState>,
}

impl ProgressDisplay {
    fn show(self: &Arc<Self>, event: UploadProgress, clear_after: Duration) {
        let complete = event.is_complete();
        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.current = Some(event);
            state.generation
        };

        if complete {
            let display = self.clone();
            task::spawn(async move {
                task::sleep(clear_after).await;
                display.clear_if_unchanged(generation);
            });
        }
    }

    // A newer event that arrived during the delay keeps the display alive.
    fn clear_if_unchanged(&self, generation: u64) {
        let mut state = lock(&self.state);
        if state.generation == generation {
            state.current = None;
        }
    }

    fn current(&self) -> Option<UploadProgress> {
        lock(&self.state).current.clone()
    }
}

/// Submits upload batches and mirrors the progress stream while mounted.
///
/// Mounting subscribes to the [`ProgressBus`]; the subscription lives exactly as long as
/// the coordinator, so dropping or [`unmount`](UploadCoordinator::unmount)ing it stops any
/// further event from being applied.
pub struct UploadCoordinator<B: ?Sized> {
    store: GalleryStore<B>,
    display: Arc<ProgressDisplay>,
    uploading: AtomicBool,
    subscription: Option<Subscription>,
    pump: Option<JoinHandle<()>>,
}

impl<B: PhotoProvider + ?Sized> UploadCoordinator<B> {
    pub fn mount(store: GalleryStore<B>, bus: &Arc<ProgressBus>, clear_after: Duration) -> Self {
        let subscription = bus.subscribe();
        let display = Arc::new(ProgressDisplay::default());

        let events = subscription.receiver();
        let pump = {
            let display = display.clone();
            task::spawn(async move {
                while let Ok(event) = events.recv().await {
                    debug!(
                        file_name = %event.file_name,
                        progress = event.progress,
                        status = %event.status,
                        "Upload progress"
                    );
                    display.show(event, clear_after);
                }
            })
        };

        UploadCoordinator {
            store,
            display,
            uploading: AtomicBool::new(false),
            subscription: Some(subscription),
            pump: Some(pump),
        }
    }

    /// Releases the progress subscription and waits for the event pump to wind down.
    pub async fn unmount(mut self) {
        self.subscription.take();
        if let Some(pump) = self.pump.take() {
            pump.await;
        }
    }

    pub fn current_progress(&self) -> Option<UploadProgress> {
        self.display.current()
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::Acquire)
    }

    /// Submits `files` as one batch and refreshes the gallery from the remote store once
    /// it is accepted. A rejected batch leaves the gallery as it was.
    #[tracing::instrument(skip(self, files), fields(files = files.len()))]
    pub async fn upload(&self, files: &[PathBuf]) -> Result<(), UploadError> {
        if files.is_empty() {
            debug!("Nothing to upload");
            return Ok(());
        }
        if self
            .uploading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(UploadError::Busy);
        }
        let _batch = BatchGuard(&self.uploading);

        if let Err(err) = self.store.backend().upload_photos(files).await {
            error!("Upload failed: {}", err);
            return Err(UploadError::Submission(err));
        }
        info!("Upload batch accepted, refreshing gallery");

        self.store.fetch_photos(false).await;
        Ok(())
    }
}

struct BatchGuard<'a>(&'a AtomicBool);

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
