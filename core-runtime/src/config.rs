//! # Service Configuration
//!
//! Settings of the shared playback service. Collaborators (data provider,
//! engine factory) are not configuration: they are injected through the
//! service builder, which fails fast when one is missing.
//!
//! ## Usage
//!
//! ```rust
//! use bridge_traits::media::Quality;
//! use core_runtime::config::ServiceConfig;
//! use std::time::Duration;
//!
//! let config = ServiceConfig::default()
//!     .with_default_quality(Quality::Sd)
//!     .with_resolution_timeout(Duration::from_secs(15));
//!
//! assert!(config.validate().is_ok());
//! ```
//!
//! Hosts shipping configuration as JSON can deserialize it directly; missing
//! fields take their defaults.

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::media::Quality;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Buffer size of the event bus created by the service when none is
    /// injected.
    ///
    /// Default: 100 events.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    /// Quality requested when a caller does not ask for one.
    ///
    /// Default: HD.
    #[serde(default)]
    pub default_quality: Quality,

    /// Initial external-screen mirroring policy.
    ///
    /// Default: false (full-screen external playback).
    #[serde(default)]
    pub mirrored_on_external_screen: bool,

    /// Start playing as soon as the engine reports it is ready.
    ///
    /// Default: true.
    #[serde(default = "default_autoplay")]
    pub autoplay: bool,

    /// Upper bound on metadata resolution. An expired resolution is reported
    /// like any other resolution failure.
    ///
    /// Default: none (unbounded).
    #[serde(default)]
    pub resolution_timeout: Option<Duration>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: default_event_buffer_size(),
            default_quality: Quality::default(),
            mirrored_on_external_screen: false,
            autoplay: default_autoplay(),
            resolution_timeout: None,
        }
    }
}

impl ServiceConfig {
    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    pub fn with_default_quality(mut self, quality: Quality) -> Self {
        self.default_quality = quality;
        self
    }

    pub fn with_mirrored_on_external_screen(mut self, mirrored: bool) -> Self {
        self.mirrored_on_external_screen = mirrored;
        self
    }

    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    pub fn with_resolution_timeout(mut self, timeout: Duration) -> Self {
        self.resolution_timeout = Some(timeout);
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config("event_buffer_size must be > 0".to_string()));
        }

        if self.resolution_timeout == Some(Duration::ZERO) {
            return Err(Error::Config(
                "resolution_timeout must be > 0 when set".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_event_buffer_size() -> usize {
    DEFAULT_EVENT_BUFFER_SIZE
}

fn default_autoplay() -> bool {
    true
}
