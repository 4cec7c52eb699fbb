//! Media data model shared by data providers, engines and the core.
//!
//! These types describe what a data provider resolves a resource name into:
//! descriptive metadata ([`Media`]) and the structural chapter/segment graph
//! ([`MediaComposition`]) carrying the playable resources.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Resource Names
// ============================================================================

/// Opaque unique identifier for a playable item, e.g. `urn:rts:video:8806923`.
///
/// Two URNs are equal when their string forms are equal; the core never
/// compares media by object identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaUrn(String);

impl MediaUrn {
    /// Wrap a resource name.
    pub fn new(urn: impl Into<String>) -> Self {
        Self(urn.into())
    }

    /// Borrow the resource name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Media type encoded in the third segment (`urn:<vendor>:<type>:<id>`).
    pub fn media_type(&self) -> MediaType {
        match self.0.split(':').nth(2) {
            Some("video") => MediaType::Video,
            Some("audio") => MediaType::Audio,
            _ => MediaType::Unknown,
        }
    }
}

impl fmt::Display for MediaUrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaUrn {
    fn from(urn: &str) -> Self {
        Self::new(urn)
    }
}

impl From<String> for MediaUrn {
    fn from(urn: String) -> Self {
        Self(urn)
    }
}

/// Kind of content a resource name points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
    #[default]
    Unknown,
}

// ============================================================================
// Quality
// ============================================================================

/// Requested quality tier. Advisory: engines and resource selection may fall back.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Quality {
    /// Standard definition
    Sd,
    /// High quality (between SD and HD)
    Hq,
    /// High definition
    #[default]
    Hd,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Quality::Sd => "SD",
            Quality::Hq => "HQ",
            Quality::Hd => "HD",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Media Metadata
// ============================================================================

/// Resolved descriptive metadata for a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// Resource name this metadata was resolved for.
    pub urn: MediaUrn,
    /// Display title.
    pub title: String,
    /// Short description, when available.
    pub lead: Option<String>,
    /// Video or audio.
    pub media_type: MediaType,
    /// Total duration.
    pub duration: Duration,
    /// Base URL of the artwork, scaled by image loaders.
    pub image_url: Option<String>,
}

impl Media {
    /// Create metadata with the minimal required fields.
    pub fn new(urn: MediaUrn, title: impl Into<String>) -> Self {
        let media_type = urn.media_type();
        Self {
            urn,
            title: title.into(),
            lead: None,
            media_type,
            duration: Duration::ZERO,
            image_url: None,
        }
    }

    /// Attach a duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Attach an artwork base URL.
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

// ============================================================================
// Media Composition
// ============================================================================

/// Streaming protocol of a playable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamingProtocol {
    Hls,
    Dash,
    Progressive,
}

/// One playable rendition of a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub url: String,
    pub quality: Quality,
    pub protocol: StreamingProtocol,
}

/// Logical subdivision of a chapter (mark in / mark out within the chapter stream).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub urn: MediaUrn,
    pub title: String,
    pub mark_in: Duration,
    pub mark_out: Duration,
}

impl Segment {
    pub fn duration(&self) -> Duration {
        self.mark_out.saturating_sub(self.mark_in)
    }
}

/// A playable unit of a composition, with its renditions and segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub urn: MediaUrn,
    pub title: String,
    pub duration: Duration,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// Structural graph of a resource: the chapter to play plus its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaComposition {
    /// Chapter the composition was requested for.
    pub chapter_urn: MediaUrn,
    pub chapters: Vec<Chapter>,
}

impl MediaComposition {
    /// The chapter designated by [`MediaComposition::chapter_urn`].
    pub fn main_chapter(&self) -> Option<&Chapter> {
        self.chapters
            .iter()
            .find(|chapter| chapter.urn == self.chapter_urn)
    }

    /// Pick the source to hand to an engine for the requested quality.
    ///
    /// Prefers the exact quality, then the best quality below it, then
    /// anything the main chapter offers. Returns `None` when the main chapter
    /// is missing or has no resources.
    pub fn playable_source(&self, quality: Quality) -> Option<PlayableSource> {
        let chapter = self.main_chapter()?;

        let resource = chapter
            .resources
            .iter()
            .find(|r| r.quality == quality)
            .or_else(|| {
                chapter
                    .resources
                    .iter()
                    .filter(|r| r.quality < quality)
                    .max_by_key(|r| r.quality)
            })
            .or_else(|| chapter.resources.first())?;

        Some(PlayableSource {
            url: resource.url.clone(),
            quality: resource.quality,
            protocol: resource.protocol,
            start_position: Duration::ZERO,
        })
    }
}

/// Result of resolving a resource name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub media: Media,
    pub media_composition: MediaComposition,
}

impl Resolution {
    pub fn new(media: Media, media_composition: MediaComposition) -> Self {
        Self {
            media,
            media_composition,
        }
    }
}

/// Engine-playable source selected from a composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayableSource {
    pub url: String,
    /// Quality actually selected, which may differ from the requested one.
    pub quality: Quality,
    pub protocol: StreamingProtocol,
    /// Initial playback position (defaults to start of stream).
    pub start_position: Duration,
}
