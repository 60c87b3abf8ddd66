//! Generation controller.
//!
//! Owns the prompt form and the newest-first result gallery. Each call to
//! [`GenerationController::generate`] issues at most one provider request;
//! a second call while one is outstanding is rejected instead of racing it.
//! [`GenerationController::clear`] bumps an epoch so that a request started
//! before the reset cannot repopulate the gallery when it completes.

use crate::download::Downloader;
use crate::error::{PicturaError, Result};
use crate::image::{GeneratedImage, GenerationRequest, ImageProvider, ImageQuality, ImageSize};
use crate::notify::{Notification, Notifier};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Current contents of the prompt form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationForm {
    /// Prompt text as typed.
    pub prompt: String,
    /// Selected size.
    pub size: ImageSize,
    /// Selected quality.
    pub quality: ImageQuality,
}

#[derive(Debug, Default)]
struct ControllerState {
    form: GenerationForm,
    results: VecDeque<GeneratedImage>,
    epoch: u64,
}

/// Clears the in-flight flag when dropped, including when the request
/// future is dropped before completing.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives image generation and keeps the session gallery.
pub struct GenerationController {
    provider: Arc<dyn ImageProvider>,
    notifier: Arc<dyn Notifier>,
    downloader: Downloader,
    state: Mutex<ControllerState>,
    in_flight: AtomicBool,
    sequence: AtomicU64,
}

impl GenerationController {
    /// Creates a controller with an empty gallery.
    pub fn new(provider: Arc<dyn ImageProvider>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            provider,
            notifier,
            downloader: Downloader::new(),
            state: Mutex::new(ControllerState::default()),
            in_flight: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
        }
    }

    /// Name of the backing provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Snapshot of the form.
    pub fn form(&self) -> GenerationForm {
        self.state.lock().form.clone()
    }

    /// Replaces the prompt text.
    pub fn set_prompt(&self, prompt: impl Into<String>) {
        self.state.lock().form.prompt = prompt.into();
    }

    /// Selects a size.
    pub fn set_size(&self, size: ImageSize) {
        self.state.lock().form.size = size;
    }

    /// Selects a quality.
    pub fn set_quality(&self, quality: ImageQuality) {
        self.state.lock().form.quality = quality;
    }

    /// True while a generation request is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Gallery contents, newest first.
    pub fn results(&self) -> Vec<GeneratedImage> {
        self.state.lock().results.iter().cloned().collect()
    }

    /// Number of images in the gallery.
    pub fn len(&self) -> usize {
        self.state.lock().results.len()
    }

    /// True if the gallery is empty.
    pub fn is_empty(&self) -> bool {
        self.state.lock().results.is_empty()
    }

    /// Looks up a gallery entry by id.
    pub fn get(&self, id: &str) -> Option<GeneratedImage> {
        self.state
            .lock()
            .results
            .iter()
            .find(|image| image.id == id)
            .cloned()
    }

    /// Empties the gallery. Requests already in flight will not add to it.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.results.clear();
        state.epoch += 1;
    }

    /// Generates an image from the current form.
    pub async fn submit(&self) -> Result<GeneratedImage> {
        let form = self.form();
        self.generate(&form.prompt, form.size, form.quality).await
    }

    /// Generates one image and prepends it to the gallery.
    ///
    /// Every outcome is reported through the notifier. The error is also
    /// returned so library callers can inspect it; users only ever see the
    /// generic notification.
    pub async fn generate(
        &self,
        prompt: &str,
        size: ImageSize,
        quality: ImageQuality,
    ) -> Result<GeneratedImage> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            self.notifier.notify(Notification::enter_prompt());
            return Err(PicturaError::EmptyPrompt);
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            self.notifier.notify(Notification::already_generating());
            return Err(PicturaError::Busy);
        };

        let epoch = self.state.lock().epoch;
        let request = GenerationRequest::new(prompt)
            .with_size(size)
            .with_quality(quality);

        tracing::debug!(
            provider = self.provider.name(),
            size = %size,
            quality = %quality,
            "submitting generation request"
        );

        let url = match self.request_first(&request).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("image generation failed: {e}");
                self.notifier.notify(Notification::generation_failed());
                return Err(e);
            }
        };

        let timestamp = Utc::now();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let image = GeneratedImage {
            id: format!("{}-{}", timestamp.timestamp_millis(), seq),
            url,
            prompt: request.prompt,
            timestamp,
            size,
            quality,
        };

        {
            let mut state = self.state.lock();
            if state.epoch != epoch {
                tracing::debug!(id = %image.id, "gallery was reset, dropping completion");
                return Err(PicturaError::Superseded);
            }
            state.results.push_front(image.clone());
        }

        self.notifier.notify(Notification::generated());
        Ok(image)
    }

    async fn request_first(&self, request: &GenerationRequest) -> Result<String> {
        self.provider
            .generate(request)
            .await?
            .into_iter()
            .next()
            .map(|output| output.url)
            .ok_or_else(|| PicturaError::UnexpectedResponse("no images in response".into()))
    }

    /// Saves the image at `url` into `dir`, named after `prompt`.
    pub async fn download(&self, url: &str, prompt: &str, dir: &Path) -> Result<PathBuf> {
        match self.downloader.save(url, prompt, dir).await {
            Ok(path) => Ok(path),
            Err(e) => {
                tracing::warn!("image download failed: {e}");
                self.notifier.notify(Notification::download_failed());
                Err(e)
            }
        }
    }
}
