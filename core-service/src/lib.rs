//! Shared playback service and bootstrap helpers.
//!
//! This crate wires the host-provided bridges (data provider, engine factory,
//! picture-in-picture delegate) into the process-wide playback session. The
//! application builds one [`PlaybackService`] in its composition root and
//! hands clones to every UI surface:
//!
//! ```ignore
//! let service = PlaybackService::builder()
//!     .dependencies(ServiceDependencies::new(provider, factory))
//!     .config(ServiceConfig::default())
//!     .build()?;
//!
//! let mut events = service.subscribe();
//! service.play_urn(MediaUrn::new("urn:rts:video:8806923"), None).await;
//! ```

pub mod error;
pub mod picture_in_picture;
pub mod service;

pub use error::{CoreError, Result};
pub use picture_in_picture::{delegate_handle, PictureInPictureSession, StopOutcome};
pub use service::{PlaybackService, PlaybackServiceBuilder};

use std::sync::Arc;

use bridge_traits::{data_provider::DataProvider, engine::EngineFactory};

/// Aggregated handle to the bridges the service requires.
pub struct ServiceDependencies {
    pub data_provider: Arc<dyn DataProvider>,
    pub engine_factory: Arc<dyn EngineFactory>,
}

impl ServiceDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        data_provider: Arc<dyn DataProvider>,
        engine_factory: Arc<dyn EngineFactory>,
    ) -> Self {
        Self {
            data_provider,
            engine_factory,
        }
    }
}
