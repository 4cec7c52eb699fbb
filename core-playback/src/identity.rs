//! # Playback Identity
//!
//! What is being played: resource name, resolved metadata, requested quality
//! and the last failure. Resolved metadata is only ever stored for the
//! resource name that produced it.

use crate::error::PlaybackError;
use bridge_traits::media::{Media, MediaComposition, MediaUrn, Quality, Resolution};
use core_runtime::events::MetadataSnapshot;

/// The tuple currently played by a controller or by the shared service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackIdentity {
    pub urn: Option<MediaUrn>,
    pub media: Option<Media>,
    pub media_composition: Option<MediaComposition>,
    pub preferred_quality: Option<Quality>,
    /// Most recent failure, cleared by a successful resolution.
    pub error: Option<PlaybackError>,
}

impl PlaybackIdentity {
    /// Identity of a request for which only the resource name is known.
    pub fn for_urn(urn: MediaUrn, quality: Quality) -> Self {
        Self {
            urn: Some(urn),
            preferred_quality: Some(quality),
            ..Default::default()
        }
    }

    /// Identity of a request made with already resolved metadata. The
    /// composition still has to be resolved.
    pub fn for_media(media: Media, quality: Quality) -> Self {
        Self {
            urn: Some(media.urn.clone()),
            media: Some(media),
            preferred_quality: Some(quality),
            ..Default::default()
        }
    }

    /// Observable fields, as published with `MetadataChanged`.
    pub fn snapshot(&self) -> MetadataSnapshot {
        MetadataSnapshot {
            urn: self.urn.clone(),
            media: self.media.clone(),
            media_composition: self.media_composition.clone(),
            preferred_quality: self.preferred_quality,
        }
    }

    /// Store the resolution obtained for `urn`.
    ///
    /// Returns `false`, leaving the identity untouched, when `urn` is not the
    /// identity's resource name.
    pub fn apply_resolution(&mut self, urn: &MediaUrn, resolution: Resolution) -> bool {
        if self.urn.as_ref() != Some(urn) {
            return false;
        }

        self.media = Some(resolution.media);
        self.media_composition = Some(resolution.media_composition);
        self.error = None;
        true
    }

    pub fn record_error(&mut self, error: PlaybackError) {
        self.error = Some(error);
    }

    /// Whether the resource name matches `urn`.
    pub fn is_for(&self, urn: &MediaUrn) -> bool {
        self.urn.as_ref() == Some(urn)
    }

    /// Returns `true` when nothing is being played and no error is pending.
    pub fn is_empty(&self) -> bool {
        self.urn.is_none()
            && self.media.is_none()
            && self.media_composition.is_none()
            && self.preferred_quality.is_none()
            && self.error.is_none()
    }
}
