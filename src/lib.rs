//! Letterbox playback workspace façade.
//!
//! Re-exports the member crates so host applications can depend on a single
//! package:
//!
//! - [`bridge`]: contracts the host implements (data provider, player engine,
//!   picture-in-picture delegate, image loader, logger sink)
//! - [`runtime`]: event bus, logging bootstrap and configuration
//! - [`playback`]: playback controller state machine and playback identity
//! - [`service`]: the shared playback service and picture-in-picture session

pub use bridge_traits as bridge;
pub use core_playback as playback;
pub use core_runtime as runtime;
pub use core_service as service;

pub use core_playback::{PlaybackController, PlaybackError, PlaybackIdentity};
pub use core_runtime::config::ServiceConfig;
pub use core_runtime::events::{CoreEvent, EventBus};
pub use core_service::{PictureInPictureSession, PlaybackService};
