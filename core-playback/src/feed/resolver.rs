//! Resolution of feed items to a playable source.

use bridge_traits::{MediaDescriptor, MediaSource};

/// Decides where a backend should read a feed item from.
///
/// Implemented by the download cache; lookups must not block.
pub trait AssetResolver: Send + Sync {
    /// Local file when one is available, otherwise the remote source.
    fn resolve(&self, descriptor: &MediaDescriptor) -> MediaSource;

    /// Hint that `descriptor` is likely to be shown soon.
    fn prefetch(&self, _descriptor: &MediaDescriptor) {}
}

/// Resolver that always streams from the source.
#[derive(Debug, Clone, Default)]
pub struct RemoteResolver;

impl AssetResolver for RemoteResolver {
    fn resolve(&self, descriptor: &MediaDescriptor) -> MediaSource {
        MediaSource::remote(descriptor)
    }
}
