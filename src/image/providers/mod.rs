//! Image generation providers.

mod hosted;

pub use hosted::{
    HostedImageProvider, HostedImageProviderBuilder, DEFAULT_BASE_URL, DEFAULT_MODEL,
};
