#![warn(missing_docs)]
//! Pictura - prompt-to-image client.
//!
//! Sends a text prompt to a hosted image-generation API, keeps the results in
//! a newest-first in-memory gallery and saves them to disk on request.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use pictura::{
//!     App, HostedImageProvider, ImageQuality, ImageSize, LocalAuthProvider, LogNotifier, User,
//! };
//!
//! #[tokio::main]
//! async fn main() -> pictura::Result<()> {
//!     let auth = LocalAuthProvider::new();
//!     let provider = HostedImageProvider::builder().build()?;
//!     let app = App::new(Arc::new(auth.clone()), Arc::new(provider), Arc::new(LogNotifier));
//!
//!     auth.sign_in(User::new("local"));
//!     let image = app
//!         .generate("A red fox in fresh snow", ImageSize::Square, ImageQuality::High)
//!         .await?;
//!     let path = app.download(&image).await?;
//!     println!("saved {}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `pictura` command-line front end.

pub mod app;
pub mod config;
pub mod controller;
pub mod download;
mod error;
pub mod image;
pub mod notify;
pub mod session;

// Re-export error types at crate root
pub use error::{PicturaError, Result};

pub use app::App;
pub use config::Config;
pub use controller::{GenerationController, GenerationForm};
pub use download::{sanitize_filename, Downloader};
pub use image::providers::{HostedImageProvider, HostedImageProviderBuilder};
pub use image::{
    GeneratedImage, GenerationRequest, ImageFormat, ImageOutput, ImageProvider, ImageQuality,
    ImageSize,
};
pub use notify::{ChannelNotifier, LogNotifier, Notification, NotificationKind, Notifier};
pub use session::{
    AuthProvider, LocalAuthProvider, SessionObserver, SessionState, SessionView, Subscription,
    User,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::app::App;
    pub use crate::controller::GenerationController;
    pub use crate::error::{PicturaError, Result};
    pub use crate::image::{GeneratedImage, ImageProvider, ImageQuality, ImageSize};
    pub use crate::notify::{Notification, Notifier};
    pub use crate::session::{AuthProvider, SessionObserver, SessionView};
}
