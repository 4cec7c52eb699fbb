//! # Host Bridge Traits
//!
//! Contract between the playback core and the host application.
//!
//! ## Overview
//!
//! The core never talks to a media stack, a network API or a UI toolkit
//! directly. Every such capability is described here as a trait and injected
//! by the host at construction time.
//!
//! ## Traits
//!
//! ### Playback
//! - [`DataProvider`](data_provider::DataProvider) - Resolves resource names into metadata and compositions
//! - [`PlayerEngine`](engine::PlayerEngine) - Platform media engine driven by one controller
//! - [`EngineFactory`](engine::EngineFactory) - Creates engines for new controllers
//!
//! ### UI Integration
//! - [`PictureInPictureDelegate`](picture_in_picture::PictureInPictureDelegate) - Host UI restoration hooks
//! - [`ImageLoader`](image::ImageLoader) - Artwork fetching and caching
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is missing:
//!
//! ```ignore
//! let service = PlaybackService::builder()
//!     .data_provider(provider)
//!     .build()?; // Err(CapabilityMissing { capability: "EngineFactory", .. })
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Host adapters
//! should map "unknown resource" to `NotFound` and connectivity problems to
//! `Network` so the core can classify failures.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks.

pub mod data_provider;
pub mod engine;
pub mod error;
pub mod image;
pub mod logging;
pub mod media;
pub mod picture_in_picture;
pub mod platform;

pub use error::BridgeError;

// Re-export commonly used types
pub use data_provider::DataProvider;
pub use engine::{EngineEvent, EngineFactory, PlaybackState, PlayerEngine};
pub use image::{ImageLoader, ImageMetadata, ImageScale, ImageTarget};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media::{
    Chapter, Media, MediaComposition, MediaType, MediaUrn, PlayableSource, Quality, Resolution,
    Resource, Segment, StreamingProtocol,
};
pub use picture_in_picture::{
    PictureInPictureDelegate, RestorationCompletion, RestorationReceiver,
};
pub use platform::PlatformSendSync;
