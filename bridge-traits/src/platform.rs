//! Marker trait keeping bridge bounds in one place.
//!
//! Engines, data providers and delegates are shared between the UI thread and
//! the tasks that redeliver engine callbacks, so every bridge object must be
//! `Send + Sync`. Routing the bound through a single marker keeps the trait
//! definitions short and lets a single-threaded host relax it later without
//! touching each trait.

/// Marker trait equivalent to `Send + Sync`.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync + ?Sized {}

