//! Top-level application context.
//!
//! [`App`] owns the session observer and the generation controller. Both are
//! handed their collaborators explicitly; nothing here is global. Dropping or
//! shutting down the app releases the session subscription.

use crate::config::Config;
use crate::controller::GenerationController;
use crate::error::{PicturaError, Result};
use crate::image::providers::HostedImageProvider;
use crate::image::{GeneratedImage, ImageProvider, ImageQuality, ImageSize};
use crate::notify::{Notification, Notifier};
use crate::session::{AuthProvider, LocalAuthProvider, SessionObserver, SessionView, User};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Application context.
pub struct App {
    session: SessionObserver,
    controller: Arc<GenerationController>,
    notifier: Arc<dyn Notifier>,
    output_dir: PathBuf,
}

impl App {
    /// Wires an app from its collaborators and subscribes to the session.
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        provider: Arc<dyn ImageProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session: SessionObserver::new(auth),
            controller: Arc::new(GenerationController::new(provider, notifier.clone())),
            notifier,
            output_dir: PathBuf::from("."),
        }
    }

    /// Builds an app against the hosted endpoint described by `config`.
    ///
    /// Fails with [`PicturaError::Auth`] when no API key is configured. The
    /// returned provider is already resolved to a signed-in session.
    pub fn from_config(
        config: &Config,
        notifier: Arc<dyn Notifier>,
    ) -> Result<(Self, LocalAuthProvider)> {
        let key = config
            .api_key
            .as_deref()
            .ok_or_else(|| PicturaError::Auth("no API key configured".into()))?;
        let provider = HostedImageProvider::builder()
            .api_key(key)
            .base_url(config.base_url())
            .model(config.model())
            .build()?;

        let auth = LocalAuthProvider::new();
        let app = Self::new(Arc::new(auth.clone()), Arc::new(provider), notifier)
            .with_defaults(config.size, config.quality)
            .with_output_dir(config.output_dir());

        sign_in_from_config(&auth, config);
        Ok((app, auth))
    }

    /// Sets the initial size and quality selection.
    pub fn with_defaults(self, size: ImageSize, quality: ImageQuality) -> Self {
        self.controller.set_size(size);
        self.controller.set_quality(quality);
        self
    }

    /// Sets the download directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Session observer.
    pub fn session(&self) -> &SessionObserver {
        &self.session
    }

    /// Generation controller.
    pub fn controller(&self) -> &Arc<GenerationController> {
        &self.controller
    }

    /// Download directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// What may be shown right now.
    pub fn view(&self) -> SessionView {
        self.session.view()
    }

    /// Waits for the session to resolve.
    pub async fn ready(&self) -> SessionView {
        self.session.resolved().await
    }

    fn require_user(&self) -> Result<User> {
        match self.session.view() {
            SessionView::Ready(user) => Ok(user),
            // Nothing is rendered while loading, so nothing to tell the user.
            SessionView::Loading => Err(PicturaError::NotSignedIn),
            SessionView::SignedOut => {
                self.notifier.notify(Notification::sign_in_required());
                Err(PicturaError::NotSignedIn)
            }
        }
    }

    /// Generates an image for the signed-in user.
    pub async fn generate(
        &self,
        prompt: &str,
        size: ImageSize,
        quality: ImageQuality,
    ) -> Result<GeneratedImage> {
        self.require_user()?;
        self.controller.generate(prompt, size, quality).await
    }

    /// Generates an image from the controller's current form.
    pub async fn submit(&self) -> Result<GeneratedImage> {
        self.require_user()?;
        self.controller.submit().await
    }

    /// Saves a gallery image into the download directory.
    pub async fn download(&self, image: &GeneratedImage) -> Result<PathBuf> {
        self.controller
            .download(&image.url, &image.prompt, &self.output_dir)
            .await
    }

    /// Ends the session.
    pub fn logout(&self) {
        self.session.logout();
    }

    /// Releases the session subscription.
    pub fn shutdown(mut self) {
        self.session.teardown();
    }
}

/// Resolves the local session from configuration.
pub fn sign_in_from_config(auth: &LocalAuthProvider, config: &Config) {
    if config.api_key.is_none() {
        tracing::debug!("no API key configured, session signed out");
        auth.sign_out();
        return;
    }

    let user = match &config.email {
        Some(email) => User::new("local").with_email(email.clone()),
        None => User::new("local"),
    };
    auth.sign_in(user);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{GenerationRequest, ImageOutput};
    use crate::notify::ChannelNotifier;
    use async_trait::async_trait;

    struct FoxProvider;

    #[async_trait]
    impl ImageProvider for FoxProvider {
        async fn generate(&self, _request: &GenerationRequest) -> Result<Vec<ImageOutput>> {
            Ok(vec![ImageOutput::new("https://cdn.example.com/fox.png")])
        }

        fn name(&self) -> &str {
            "fox"
        }
    }

    fn make_app() -> (
        App,
        LocalAuthProvider,
        tokio::sync::mpsc::UnboundedReceiver<Notification>,
    ) {
        let auth = LocalAuthProvider::new();
        let (notifier, rx) = ChannelNotifier::new();
        let app = App::new(
            Arc::new(auth.clone()),
            Arc::new(FoxProvider),
            Arc::new(notifier),
        );
        (app, auth, rx)
    }

    #[tokio::test]
    async fn test_generation_gated_while_loading() {
        let (app, _auth, mut notes) = make_app();
        assert_eq!(app.view(), SessionView::Loading);

        let err = app
            .generate("a red fox", ImageSize::Square, ImageQuality::High)
            .await
            .unwrap_err();
        assert!(matches!(err, PicturaError::NotSignedIn));
        assert!(notes.try_recv().is_err());
        assert!(app.controller().is_empty());
    }

    #[tokio::test]
    async fn test_generation_requires_user() {
        let (app, auth, mut notes) = make_app();
        auth.sign_out();

        let err = app
            .generate("a red fox", ImageSize::Square, ImageQuality::High)
            .await
            .unwrap_err();
        assert!(matches!(err, PicturaError::NotSignedIn));
        assert_eq!(notes.try_recv().unwrap(), Notification::sign_in_required());
    }

    #[tokio::test]
    async fn test_generation_when_signed_in() {
        let (app, auth, mut notes) = make_app();
        auth.sign_in(User::new("u1"));

        let image = app
            .generate("a red fox", ImageSize::Square, ImageQuality::High)
            .await
            .unwrap();
        assert_eq!(app.controller().results(), vec![image]);
        assert_eq!(notes.try_recv().unwrap(), Notification::generated());
    }

    #[tokio::test]
    async fn test_logout_regates() {
        let (app, auth, _notes) = make_app();
        auth.sign_in(User::new("u1"));
        app.logout();

        assert_eq!(app.view(), SessionView::SignedOut);
        assert!(app.submit().await.is_err());
    }

    #[test]
    fn test_shutdown_releases_subscription() {
        let (app, auth, _notes) = make_app();
        assert_eq!(auth.listener_count(), 1);
        app.shutdown();
        assert_eq!(auth.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_from_config_signed_in() {
        let (notifier, _rx) = ChannelNotifier::new();
        let config = Config {
            api_key: Some("sk-test".into()),
            email: Some("fox@example.com".into()),
            size: ImageSize::Portrait,
            quality: ImageQuality::Medium,
            output_dir: Some(PathBuf::from("/tmp/out")),
            ..Config::default()
        };

        let (app, _auth) = App::from_config(&config, Arc::new(notifier)).unwrap();
        assert_eq!(
            app.ready().await,
            SessionView::Ready(User::new("local").with_email("fox@example.com"))
        );
        assert_eq!(app.output_dir(), Path::new("/tmp/out"));
        assert_eq!(app.controller().form().size, ImageSize::Portrait);
        assert_eq!(app.controller().form().quality, ImageQuality::Medium);
        assert_eq!(app.controller().provider_name(), "Hosted image API");
    }

    #[test]
    fn test_from_config_requires_key() {
        let (notifier, _rx) = ChannelNotifier::new();
        let result = App::from_config(&Config::default(), Arc::new(notifier));
        assert!(matches!(result, Err(PicturaError::Auth(_))));
    }

    #[tokio::test]
    async fn test_sign_in_from_config_without_key_signs_out() {
        let (app, auth, mut notes) = make_app();
        auth.sign_in(User::new("u1"));

        sign_in_from_config(&auth, &Config::default());
        assert_eq!(app.ready().await, SessionView::SignedOut);
        assert!(app
            .generate("a red fox", ImageSize::Square, ImageQuality::Auto)
            .await
            .is_err());
        assert_eq!(notes.try_recv().unwrap(), Notification::sign_in_required());
    }
}
