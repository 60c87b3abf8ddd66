//! Image provider trait.

use crate::error::Result;
use crate::image::types::{GenerationRequest, ImageOutput};
use async_trait::async_trait;

/// Trait for hosted image generation backends.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates images for the given request.
    ///
    /// Returns the images in the order the backend produced them. The
    /// result may be empty if the backend produced nothing.
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<ImageOutput>>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;
}
