//! Metadata resolution bridge.

use crate::{
    error::Result,
    media::{MediaUrn, Resolution},
    platform::PlatformSendSync,
};
use async_trait::async_trait;

/// Resolves a resource name into its media metadata and composition.
///
/// Implementations usually call a remote integration layer. The core may
/// issue overlapping requests for different resource names and discards the
/// results of superseded ones, so implementations need not support
/// cancellation themselves.
///
/// Errors should use [`BridgeError::NotFound`](crate::BridgeError::NotFound)
/// for unknown resources and [`BridgeError::Network`](crate::BridgeError::Network)
/// for connectivity failures.
#[async_trait]
pub trait DataProvider: PlatformSendSync {
    async fn resolve(&self, urn: &MediaUrn) -> Result<Resolution>;
}
