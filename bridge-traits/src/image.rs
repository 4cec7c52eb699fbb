//! Artwork loading for UI surfaces.
//!
//! The playback core never loads images itself. UI code binds an image
//! target (an image view, a widget id) to a media object through the helpers
//! below, and the host's [`ImageLoader`] does the fetching and caching.

use crate::{media::Media, platform::PlatformSendSync};

/// Target display scale of an image request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageScale {
    Small,
    Medium,
    Large,
}

impl ImageScale {
    /// Requested width in pixels.
    pub fn width(&self) -> u32 {
        match self {
            ImageScale::Small => 320,
            ImageScale::Medium => 640,
            ImageScale::Large => 1280,
        }
    }
}

/// Objects able to describe their artwork.
pub trait ImageMetadata {
    /// Artwork URL for the requested scale, if the object has artwork.
    fn image_url(&self, scale: ImageScale) -> Option<String>;
}

impl ImageMetadata for Media {
    fn image_url(&self, scale: ImageScale) -> Option<String> {
        self.image_url
            .as_ref()
            .map(|base| format!("{}/scale/width/{}", base.trim_end_matches('/'), scale.width()))
    }
}

/// Host identifier of the visual element receiving an image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageTarget(pub String);

impl ImageTarget {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Host image loading and caching.
///
/// Requests are fire-and-forget: the loader updates the target itself. A new
/// request for the same target supersedes the previous one.
pub trait ImageLoader: PlatformSendSync {
    /// Load `url` into `target`, showing `placeholder` meanwhile (or when
    /// `url` is `None`).
    fn load(&self, target: &ImageTarget, url: Option<String>, placeholder: Option<&str>);

    /// Cancel the in-flight request of `target`, if any.
    fn cancel(&self, target: &ImageTarget);
}

/// Request the artwork of `object` at `scale` into `target`.
///
/// A missing object or an object without artwork still sets the placeholder.
pub fn request_image_for_object(
    loader: &dyn ImageLoader,
    target: &ImageTarget,
    object: Option<&dyn ImageMetadata>,
    scale: ImageScale,
    placeholder: Option<&str>,
) {
    let url = object.and_then(|object| object.image_url(scale));
    loader.load(target, url, placeholder);
}

/// Cancel the current image request of `target`.
pub fn cancel_image_request(loader: &dyn ImageLoader, target: &ImageTarget) {
    loader.cancel(target);
}
