//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the playback core:
//! - Logging and tracing bootstrap
//! - Service configuration
//! - Event bus carrying typed change notifications
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its event vocabulary and
//! logging conventions. Nothing here knows about controllers or engines
//! beyond the shared data model in `bridge-traits`.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
