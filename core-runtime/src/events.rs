//! # Event Bus System
//!
//! Typed change notifications for the playback core, delivered over
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for the service, the
//!   controllers and picture in picture
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   emit    ┌───────────┐
//! │ PlaybackService  ├──────────>│           │
//! └──────────────────┘           │           │    subscribe   ┌────────────┐
//! ┌──────────────────┐   emit    │ EventBus  ├───────────────>│ Subscriber │
//! │PlaybackController├──────────>│ (broadcast│                └────────────┘
//! └──────────────────┘           │  channel) │    subscribe   ┌────────────┐
//! ┌──────────────────┐   emit    │           ├───────────────>│ Subscriber │
//! │  PiP Session     ├──────────>│           │                └────────────┘
//! └──────────────────┘           └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, EventStream};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut metadata = EventStream::new(event_bus.subscribe())
//!     .filter(|event| matches!(event, CoreEvent::Service(_)));
//!
//! tokio::spawn(async move {
//!     while let Ok(event) = metadata.recv().await {
//!         println!("{}", event.description());
//!     }
//! });
//! # }
//! ```
//!
//! ## Ordering
//!
//! For one play request the service publishes, in order:
//! 1. `MetadataChanged` with the new resource name (immediately)
//! 2. either `MetadataChanged` with the resolved media and composition, or
//!    `PlaybackFailed` when resolution fails, never both
//!
//! A new request supersedes the previous one: nothing is published for a
//! resolution that completes after it was superseded.
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events and can
//!   continue receiving.
//! - **`RecvError::Closed`**: all senders have been dropped.
//!
//! Delivery is fire-and-forget. Emitting with no subscriber is not an error
//! for publishers, which ignore the `SendError`.

use bridge_traits::{
    engine::PlaybackState,
    media::{Media, MediaComposition, MediaUrn, Quality},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published and received through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Shared playback session events
    Service(ServiceEvent),
    /// Controller lifecycle events
    Playback(PlaybackEvent),
    /// Picture-in-picture lifecycle events
    PictureInPicture(PictureInPictureEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Service(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::PictureInPicture(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Service(ServiceEvent::PlaybackFailed { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::StateChanged {
                current: PlaybackState::Failed,
                ..
            }) => EventSeverity::Warning,
            CoreEvent::Service(ServiceEvent::MetadataChanged { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Service Events
// ============================================================================

/// Observable fields of the shared playback identity at one instant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataSnapshot {
    pub urn: Option<MediaUrn>,
    pub media: Option<Media>,
    pub media_composition: Option<MediaComposition>,
    pub preferred_quality: Option<Quality>,
}

impl MetadataSnapshot {
    /// Returns `true` when no field is set.
    pub fn is_empty(&self) -> bool {
        self.urn.is_none()
            && self.media.is_none()
            && self.media_composition.is_none()
            && self.preferred_quality.is_none()
    }
}

/// Classification of a playback failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The data provider could not resolve the resource
    Resolution,
    /// The resource does not exist
    NotFound,
    /// The resource resolved but offers nothing playable
    Unsupported,
    /// Engine creation or engine-level playback failure
    Engine,
    /// Misuse of a controller (released, invalid transition)
    Internal,
}

/// Broadcast payload describing a failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureReport {
    pub kind: FailureKind,
    /// Human-readable error message.
    pub message: String,
    /// Whether retrying the same request may succeed.
    pub recoverable: bool,
}

/// Events published by the playback service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ServiceEvent {
    /// The shared playback identity changed.
    MetadataChanged {
        previous: MetadataSnapshot,
        current: MetadataSnapshot,
    },
    /// Resolution or playback of the current request failed.
    PlaybackFailed {
        /// Resource name of the failed request, if any.
        urn: Option<MediaUrn>,
        failure: FailureReport,
    },
}

impl ServiceEvent {
    fn description(&self) -> &str {
        match self {
            ServiceEvent::MetadataChanged { .. } => "Playback metadata changed",
            ServiceEvent::PlaybackFailed { .. } => "Playback failed",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events published by playback controllers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A controller moved to a new state.
    StateChanged {
        controller_id: String,
        previous: PlaybackState,
        current: PlaybackState,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::StateChanged { .. } => "Playback state changed",
        }
    }
}

// ============================================================================
// Picture-in-Picture Events
// ============================================================================

/// Events published by the picture-in-picture session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PictureInPictureEvent {
    Started {
        controller_id: String,
    },
    /// The stop sequence finished.
    Stopped {
        controller_id: String,
        /// Outcome of the user interface restoration, `None` when none was
        /// needed.
        restored: Option<bool>,
    },
}

impl PictureInPictureEvent {
    fn description(&self) -> &str {
        match self {
            PictureInPictureEvent::Started { .. } => "Picture in picture started",
            PictureInPictureEvent::Stopped { .. } => "Picture in picture stopped",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future events.
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let failures = EventStream::new(event_bus.subscribe())
///     .filter(|event| event.severity() >= core_runtime::events::EventSeverity::Error);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata_changed(urn: &str) -> CoreEvent {
        CoreEvent::Service(ServiceEvent::MetadataChanged {
            previous: MetadataSnapshot::default(),
            current: MetadataSnapshot {
                urn: Some(MediaUrn::new(urn)),
                preferred_quality: Some(Quality::Hd),
                ..Default::default()
            },
        })
    }

    fn state_changed(previous: PlaybackState, current: PlaybackState) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::StateChanged {
            controller_id: "controller-1".to_string(),
            previous,
            current,
        })
    }

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(metadata_changed("urn:rts:video:1")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = metadata_changed("urn:rts:video:1");
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Service(_)));

        bus.emit(state_changed(PlaybackState::Idle, PlaybackState::Preparing))
            .ok();
        let service_event = metadata_changed("urn:rts:video:2");
        bus.emit(service_event.clone()).ok();

        let received = stream.recv().await.unwrap();
        assert_eq!(received, service_event);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(metadata_changed(&format!("urn:rts:video:{i}"))).ok();
        }

        let result = sub.recv().await;
        assert!(matches!(result, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failure = CoreEvent::Service(ServiceEvent::PlaybackFailed {
            urn: Some(MediaUrn::new("urn:rts:video:1")),
            failure: FailureReport {
                kind: FailureKind::NotFound,
                message: "gone".to_string(),
                recoverable: false,
            },
        });
        assert_eq!(failure.severity(), EventSeverity::Error);
        assert_eq!(
            state_changed(PlaybackState::Playing, PlaybackState::Failed).severity(),
            EventSeverity::Warning
        );
        assert_eq!(
            metadata_changed("urn:rts:video:1").severity(),
            EventSeverity::Info
        );
        assert_eq!(
            state_changed(PlaybackState::Ready, PlaybackState::Playing).severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_event_description() {
        let event = CoreEvent::PictureInPicture(PictureInPictureEvent::Stopped {
            controller_id: "controller-1".to_string(),
            restored: Some(true),
        });
        assert_eq!(event.description(), "Picture in picture stopped");
    }

    #[test]
    fn test_metadata_snapshot_emptiness() {
        assert!(MetadataSnapshot::default().is_empty());
        let snapshot = MetadataSnapshot {
            preferred_quality: Some(Quality::Sd),
            ..Default::default()
        };
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_event_serialization() {
        let event = state_changed(PlaybackState::Playing, PlaybackState::Paused);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"paused\""));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_try_recv_skips_filtered_events() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Playback(_)));

        bus.emit(metadata_changed("urn:rts:video:1")).ok();
        let playback = state_changed(PlaybackState::Idle, PlaybackState::Preparing);
        bus.emit(playback.clone()).ok();

        let received = stream.try_recv().unwrap().unwrap();
        assert_eq!(received, playback);
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_publishers() {
        let bus = EventBus::new(100);
        let mut sub = bus.subscribe();

        let bus1 = bus.clone();
        let bus2 = bus.clone();

        let handle1 = tokio::spawn(async move {
            for i in 0..10 {
                bus1.emit(metadata_changed(&format!("urn:rts:video:{i}"))).ok();
            }
        });
        let handle2 = tokio::spawn(async move {
            for _ in 0..10 {
                bus2.emit(state_changed(PlaybackState::Playing, PlaybackState::Paused))
                    .ok();
            }
        });

        handle1.await.ok();
        handle2.await.ok();

        let mut count = 0;
        while sub.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 20);
    }
}
