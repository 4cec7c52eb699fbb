//! # Playback Module
//!
//! Playback controllers and the identity of what they play.
//!
//! ## Overview
//!
//! This module handles:
//! - The controller state machine over a host player engine
//! - Controller-owned metadata (resource name, media, composition, quality)
//! - Failure classification shared with the service
//! - Weak view bindings to controllers

pub mod binding;
pub mod controller;
pub mod error;
pub mod identity;

pub use binding::ControllerBinding;
pub use controller::{ControllerId, ControllerObserver, PlaybackController};
pub use error::{PlaybackError, Result};
pub use identity::PlaybackIdentity;
