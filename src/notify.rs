//! Transient user-facing notifications.

use serde::Serialize;
use tokio::sync::mpsc;

/// Whether a notification reports success or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Operation completed.
    Success,
    /// Operation was rejected or failed.
    Error,
}

/// A short message shown to the user and then forgotten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Success or failure.
    pub kind: NotificationKind,
    /// One-line headline.
    pub title: String,
    /// Optional detail line.
    pub description: Option<String>,
}

impl Notification {
    /// Creates a success notification.
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            title: title.into(),
            description: None,
        }
    }

    /// Creates an error notification.
    pub fn error(title: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: title.into(),
            description: None,
        }
    }

    /// Adds a detail line.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Empty prompt was submitted.
    pub fn enter_prompt() -> Self {
        Self::error("Please enter a prompt")
    }

    /// A request is already running.
    pub fn already_generating() -> Self {
        Self::error("Already generating")
            .with_description("Wait for the current image to finish.")
    }

    /// No signed-in session.
    pub fn sign_in_required() -> Self {
        Self::error("Please sign in to generate images")
    }

    /// Generation succeeded.
    pub fn generated() -> Self {
        Self::success("Image generated successfully!")
    }

    /// Generation failed for any remote reason.
    pub fn generation_failed() -> Self {
        Self::error("Failed to generate image. Please try again.")
    }

    /// Download failed for any reason.
    pub fn download_failed() -> Self {
        Self::error("Failed to download image")
    }

    /// True for error notifications.
    pub fn is_error(&self) -> bool {
        self.kind == NotificationKind::Error
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{} ({})", self.title, description),
            None => write!(f, "{}", self.title),
        }
    }
}

/// Sink for notifications.
pub trait Notifier: Send + Sync {
    /// Delivers a notification. Must not block.
    fn notify(&self, notification: Notification);
}

/// Forwards notifications into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiver that drains it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // Nobody listening means nobody to show it to.
        let _ = self.tx.send(notification);
    }
}

/// Writes notifications to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => tracing::info!("{notification}"),
            NotificationKind::Error => tracing::warn!("{notification}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_notifier_delivers() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(Notification::generated());
        notifier.notify(Notification::enter_prompt());

        assert_eq!(rx.try_recv().unwrap(), Notification::generated());
        let second = rx.try_recv().unwrap();
        assert!(second.is_error());
        assert_eq!(second.title, "Please enter a prompt");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_notifier_survives_closed_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.notify(Notification::generation_failed());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Notification::generated().to_string(),
            "Image generated successfully!"
        );
        assert_eq!(
            Notification::already_generating().to_string(),
            "Already generating (Wait for the current image to finish.)"
        );
    }
}
