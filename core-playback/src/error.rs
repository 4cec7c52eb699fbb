//! # Playback Error Types
//!
//! Failures of controllers and of metadata resolution. Errors are `Clone`
//! because the last one is kept on the playback identity and republished to
//! subscribers.

use bridge_traits::engine::PlaybackState;
use bridge_traits::media::{MediaUrn, Quality};
use bridge_traits::BridgeError;
use core_runtime::events::{FailureKind, FailureReport};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// The data provider does not know the resource.
    #[error("Media not found: {0}")]
    NotFound(MediaUrn),

    /// The data provider failed to resolve the resource.
    #[error("Failed to resolve {urn}: {message}")]
    Resolution {
        urn: MediaUrn,
        message: String,
        /// Connectivity failure, a retry may succeed.
        network: bool,
    },

    /// Resolution did not complete within the configured timeout.
    #[error("Resolution of {urn} timed out after {timeout:?}")]
    ResolutionTimeout { urn: MediaUrn, timeout: Duration },

    /// The resource resolved but offers nothing an engine can play.
    #[error("No playable resource for {urn} (requested {quality})")]
    NoPlayableResource { urn: MediaUrn, quality: Quality },

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The engine factory could not create an engine.
    #[error("Player engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Engine-level playback error.
    #[error("Player engine error: {0}")]
    Engine(String),

    // ========================================================================
    // Controller Errors
    // ========================================================================
    /// The requested operation is not allowed in the current state.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: PlaybackState,
        to: PlaybackState,
    },

    /// The controller released its engine and cannot be used anymore.
    #[error("Controller has been released")]
    ControllerReleased,
}

impl PlaybackError {
    /// Map a data provider failure for `urn`.
    pub fn from_resolution(urn: &MediaUrn, error: BridgeError) -> Self {
        match error {
            BridgeError::NotFound(_) => PlaybackError::NotFound(urn.clone()),
            other => PlaybackError::Resolution {
                urn: urn.clone(),
                network: other.is_network(),
                message: other.to_string(),
            },
        }
    }

    /// Broadcast classification of the error.
    pub fn kind(&self) -> FailureKind {
        match self {
            PlaybackError::NotFound(_) => FailureKind::NotFound,
            PlaybackError::Resolution { .. } | PlaybackError::ResolutionTimeout { .. } => {
                FailureKind::Resolution
            }
            PlaybackError::NoPlayableResource { .. } => FailureKind::Unsupported,
            PlaybackError::EngineUnavailable(_) | PlaybackError::Engine(_) => FailureKind::Engine,
            PlaybackError::InvalidTransition { .. } | PlaybackError::ControllerReleased => {
                FailureKind::Internal
            }
        }
    }

    /// Returns `true` if this error is transient and the request can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::Resolution { network: true, .. }
                | PlaybackError::ResolutionTimeout { .. }
                | PlaybackError::EngineUnavailable(_)
        )
    }

    /// Payload published with `ServiceEvent::PlaybackFailed`.
    pub fn report(&self) -> FailureReport {
        FailureReport {
            kind: self.kind(),
            message: self.to_string(),
            recoverable: self.is_transient(),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
