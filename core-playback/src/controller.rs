//! # Playback Controller
//!
//! A controller owns exactly one player engine for its whole life and drives
//! it through the playback state machine:
//!
//! ```text
//! Idle ──> Preparing ──> Ready ──> Playing <──> Paused
//!                                     │
//!                                     └──> Ended
//!
//! any non-terminal state ──> Failed
//! ```
//!
//! `Ended` and `Failed` are terminal: playing again needs a new controller.
//!
//! Many controllers may exist at once (one per UI surface). At most one is
//! *live*, i.e. attached to the shared playback service; the service marks it
//! with [`PlaybackController::attach`] and registers itself as the
//! [`ControllerObserver`] so that engine failures reach the shared identity.
//!
//! Every transition is published as `PlaybackEvent::StateChanged`.
//!
//! ## Usage
//!
//! ```ignore
//! let controller = Arc::new(PlaybackController::from_factory(&*factory, bus)?);
//! controller.play_urn(urn, Quality::Hd, &*provider).await?;
//!
//! // later, from the host's engine callback
//! controller.handle_engine_event(EngineEvent::ReadyToPlay).await?;
//! ```

use crate::error::{PlaybackError, Result};
use crate::identity::PlaybackIdentity;
use bridge_traits::data_provider::DataProvider;
use bridge_traits::engine::{EngineEvent, EngineFactory, PlaybackState, PlayerEngine};
use bridge_traits::media::{MediaUrn, Quality, Resolution};
use bridge_traits::BridgeError;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::logging::strip_query;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Unique identifier of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerId(Uuid);

impl ControllerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Receives failures of a live controller.
///
/// Called synchronously from the failing call, after the controller released
/// its internal lock. Implementations must not block.
pub trait ControllerObserver: Send + Sync {
    fn controller_did_fail(&self, controller: ControllerId, error: &PlaybackError);
}

struct ControllerInner {
    state: PlaybackState,
    identity: PlaybackIdentity,
    live: bool,
    released: bool,
    autoplay: bool,
    observer: Option<Weak<dyn ControllerObserver>>,
}

/// Owner of one player engine.
pub struct PlaybackController {
    id: ControllerId,
    engine: Arc<dyn PlayerEngine>,
    event_bus: EventBus,
    inner: Mutex<ControllerInner>,
}

impl PlaybackController {
    /// Wrap an engine. The controller starts `Idle`, detached, with autoplay on.
    pub fn new(engine: Arc<dyn PlayerEngine>, event_bus: EventBus) -> Self {
        Self {
            id: ControllerId::new(),
            engine,
            event_bus,
            inner: Mutex::new(ControllerInner {
                state: PlaybackState::Idle,
                identity: PlaybackIdentity::default(),
                live: false,
                released: false,
                autoplay: true,
                observer: None,
            }),
        }
    }

    /// Create the engine through the host factory.
    pub fn from_factory(factory: &dyn EngineFactory, event_bus: EventBus) -> Result<Self> {
        let engine = factory
            .create_engine()
            .map_err(|e| PlaybackError::EngineUnavailable(e.to_string()))?;
        Ok(Self::new(engine, event_bus))
    }

    /// Whether a controller starts playing as soon as its engine is ready.
    pub fn with_autoplay(self, autoplay: bool) -> Self {
        self.inner.lock().autoplay = autoplay;
        self
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.lock().state
    }

    /// Whether the controller is bound into the shared service.
    pub fn is_live(&self) -> bool {
        self.inner.lock().live
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().released
    }

    /// Metadata the controller is playing.
    pub fn identity(&self) -> PlaybackIdentity {
        self.inner.lock().identity.clone()
    }

    /// Resolve `urn` through `provider` and start preparing it.
    ///
    /// Lets a UI surface play locally before handing the controller over to
    /// the service. A resolution failure is kept on the controller identity
    /// and returned; the controller stays `Idle`.
    #[instrument(skip(self, provider), fields(controller_id = %self.id, urn = %urn))]
    pub async fn play_urn(
        &self,
        urn: MediaUrn,
        quality: Quality,
        provider: &dyn DataProvider,
    ) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            self.ensure_usable(&inner)?;
            if inner.state != PlaybackState::Idle {
                return Err(PlaybackError::InvalidTransition {
                    from: inner.state,
                    to: PlaybackState::Preparing,
                });
            }
            inner.identity = PlaybackIdentity::for_urn(urn.clone(), quality);
        }

        let resolution = match provider.resolve(&urn).await {
            Ok(resolution) => resolution,
            Err(e) => {
                let error = PlaybackError::from_resolution(&urn, e);
                warn!(error = %error, "Resolution failed");
                self.inner.lock().identity.record_error(error.clone());
                return Err(error);
            }
        };

        self.load(&urn, resolution, quality).await
    }

    /// Start preparing the source of an already resolved resource.
    ///
    /// Replaces the identity when `urn` differs from the current one. Fails
    /// with `NoPlayableResource` when the composition offers nothing to play.
    #[instrument(skip(self, resolution), fields(controller_id = %self.id, urn = %urn))]
    pub async fn load(
        &self,
        urn: &MediaUrn,
        resolution: Resolution,
        quality: Quality,
    ) -> Result<()> {
        let source = {
            let mut inner = self.inner.lock();
            self.ensure_usable(&inner)?;
            if !inner.state.can_transition_to(PlaybackState::Preparing) {
                return Err(PlaybackError::InvalidTransition {
                    from: inner.state,
                    to: PlaybackState::Preparing,
                });
            }

            if !inner.identity.is_for(urn) {
                inner.identity = PlaybackIdentity::for_urn(urn.clone(), quality);
            }
            inner.identity.preferred_quality = Some(quality);

            let Some(source) = resolution.media_composition.playable_source(quality) else {
                let error = PlaybackError::NoPlayableResource {
                    urn: urn.clone(),
                    quality,
                };
                inner.identity.apply_resolution(urn, resolution);
                inner.identity.record_error(error.clone());
                return Err(error);
            };

            inner.identity.apply_resolution(urn, resolution);
            self.transition(&mut inner, PlaybackState::Preparing)?;
            source
        };

        debug!(
            url = %strip_query(&source.url),
            quality = %source.quality,
            "Preparing source"
        );

        if let Err(e) = self.engine.prepare(source).await {
            let error = engine_error(e);
            self.fail(error.clone());
            return Err(error);
        }

        Ok(())
    }

    /// Store resolved metadata for the current resource without touching
    /// playback. Returns `false` when `urn` is no longer the current one.
    pub fn update_metadata(&self, urn: &MediaUrn, resolution: Resolution) -> bool {
        self.inner.lock().identity.apply_resolution(urn, resolution)
    }

    /// Apply a transition reported by the engine.
    #[instrument(skip(self), fields(controller_id = %self.id))]
    pub async fn handle_engine_event(&self, event: EngineEvent) -> Result<()> {
        match event {
            EngineEvent::ReadyToPlay => {
                let autoplay = {
                    let mut inner = self.inner.lock();
                    self.ensure_usable(&inner)?;
                    self.transition(&mut inner, PlaybackState::Ready)?;
                    inner.autoplay
                };
                if autoplay {
                    self.play().await?;
                }
                Ok(())
            }
            EngineEvent::PlaybackEnded => {
                let mut inner = self.inner.lock();
                self.ensure_usable(&inner)?;
                self.transition(&mut inner, PlaybackState::Ended)?;
                Ok(())
            }
            EngineEvent::Failed { message } => {
                self.ensure_usable(&self.inner.lock())?;
                self.fail(PlaybackError::Engine(message));
                Ok(())
            }
        }
    }

    /// Start or resume playback. No-op when already playing.
    #[instrument(skip(self), fields(controller_id = %self.id))]
    pub async fn play(&self) -> Result<()> {
        if !self.check_transition(PlaybackState::Playing)? {
            return Ok(());
        }

        if let Err(e) = self.engine.play().await {
            let error = engine_error(e);
            self.fail(error.clone());
            return Err(error);
        }

        let mut inner = self.inner.lock();
        self.transition(&mut inner, PlaybackState::Playing)
    }

    /// Pause playback. No-op when already paused.
    #[instrument(skip(self), fields(controller_id = %self.id))]
    pub async fn pause(&self) -> Result<()> {
        if !self.check_transition(PlaybackState::Paused)? {
            return Ok(());
        }

        if let Err(e) = self.engine.pause().await {
            let error = engine_error(e);
            self.fail(error.clone());
            return Err(error);
        }

        let mut inner = self.inner.lock();
        self.transition(&mut inner, PlaybackState::Paused)
    }

    pub async fn position(&self) -> Result<Duration> {
        self.ensure_usable(&self.inner.lock())?;
        self.engine.position().await.map_err(engine_error)
    }

    pub async fn duration(&self) -> Result<Option<Duration>> {
        self.ensure_usable(&self.inner.lock())?;
        self.engine.duration().await.map_err(engine_error)
    }

    /// Forward the external-screen mirroring policy to the engine.
    pub async fn set_mirrored_on_external_screen(&self, mirrored: bool) -> Result<()> {
        self.ensure_usable(&self.inner.lock())?;
        self.engine
            .set_external_screen_mirroring(mirrored)
            .await
            .map_err(engine_error)
    }

    /// Bind the controller into the shared session.
    pub fn attach(&self, observer: Weak<dyn ControllerObserver>) {
        let mut inner = self.inner.lock();
        inner.live = true;
        inner.observer = Some(observer);
        debug!(controller_id = %self.id, "Controller attached");
    }

    /// Unbind the controller from the shared session. Playback continues.
    pub fn detach(&self) {
        let mut inner = self.inner.lock();
        inner.live = false;
        inner.observer = None;
        debug!(controller_id = %self.id, "Controller detached");
    }

    /// Stop playback and release the engine. Idempotent.
    ///
    /// Engine errors during teardown are logged, not returned: the controller
    /// is unusable afterwards either way.
    #[instrument(skip(self), fields(controller_id = %self.id))]
    pub async fn release(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.released {
                return;
            }
            inner.released = true;
            inner.live = false;
            inner.observer = None;
        }

        if let Err(e) = self.engine.stop().await {
            warn!(error = %e, "Engine failed to stop");
        }
        if let Err(e) = self.engine.release().await {
            warn!(error = %e, "Engine failed to release");
        }
        info!("Controller released");
    }

    fn ensure_usable(&self, inner: &ControllerInner) -> Result<()> {
        if inner.released {
            Err(PlaybackError::ControllerReleased)
        } else {
            Ok(())
        }
    }

    /// `Ok(false)` when the controller already is in `next`.
    fn check_transition(&self, next: PlaybackState) -> Result<bool> {
        let inner = self.inner.lock();
        self.ensure_usable(&inner)?;
        if inner.state == next {
            return Ok(false);
        }
        if !inner.state.can_transition_to(next) {
            return Err(PlaybackError::InvalidTransition {
                from: inner.state,
                to: next,
            });
        }
        Ok(true)
    }

    fn transition(&self, inner: &mut ControllerInner, next: PlaybackState) -> Result<()> {
        let previous = inner.state;
        if !previous.can_transition_to(next) {
            return Err(PlaybackError::InvalidTransition {
                from: previous,
                to: next,
            });
        }

        inner.state = next;
        debug!(controller_id = %self.id, %previous, current = %next, "State changed");
        let _ = self
            .event_bus
            .emit(CoreEvent::Playback(PlaybackEvent::StateChanged {
                controller_id: self.id.to_string(),
                previous,
                current: next,
            }));
        Ok(())
    }

    /// Move to `Failed`, keep the error and notify the observer of a live
    /// controller.
    fn fail(&self, error: PlaybackError) {
        let observer = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                debug!(
                    controller_id = %self.id,
                    error = %error,
                    "Failure after terminal state ignored"
                );
                return;
            }
            warn!(controller_id = %self.id, error = %error, "Playback failed");
            inner.identity.record_error(error.clone());
            let _ = self.transition(&mut inner, PlaybackState::Failed);
            if inner.live {
                inner.observer.as_ref().and_then(Weak::upgrade)
            } else {
                None
            }
        };

        if let Some(observer) = observer {
            observer.controller_did_fail(self.id, &error);
        }
    }
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("PlaybackController")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("urn", &inner.identity.urn)
            .field("live", &inner.live)
            .field("released", &inner.released)
            .finish()
    }
}

fn engine_error(error: BridgeError) -> PlaybackError {
    PlaybackError::Engine(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::media::{
        Chapter, Media, MediaComposition, PlayableSource, Resource, StreamingProtocol,
    };
    use core_runtime::events::EventStream;
    use mockall::mock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    mock! {
        Engine {}

        #[async_trait]
        impl PlayerEngine for Engine {
            async fn prepare(&self, source: PlayableSource) -> BridgeResult<()>;
            async fn play(&self) -> BridgeResult<()>;
            async fn pause(&self) -> BridgeResult<()>;
            async fn stop(&self) -> BridgeResult<()>;
            async fn position(&self) -> BridgeResult<Duration>;
            async fn duration(&self) -> BridgeResult<Option<Duration>>;
            async fn set_external_screen_mirroring(&self, mirrored: bool) -> BridgeResult<()>;
            async fn release(&self) -> BridgeResult<()>;
        }
    }

    mock! {
        Provider {}

        #[async_trait]
        impl DataProvider for Provider {
            async fn resolve(&self, urn: &MediaUrn) -> BridgeResult<Resolution>;
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        failures: AtomicUsize,
    }

    impl ControllerObserver for CountingObserver {
        fn controller_did_fail(&self, _controller: ControllerId, _error: &PlaybackError) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn resolution(urn: &str, resources: Vec<Resource>) -> Resolution {
        let urn = MediaUrn::new(urn);
        Resolution::new(
            Media::new(urn.clone(), "Title"),
            MediaComposition {
                chapter_urn: urn.clone(),
                chapters: vec![Chapter {
                    urn,
                    title: "Title".to_string(),
                    duration: Duration::from_secs(120),
                    resources,
                    segments: Vec::new(),
                }],
            },
        )
    }

    fn hls(quality: Quality) -> Resource {
        Resource {
            url: format!("https://cdn.example.com/{quality}.m3u8?token=abc"),
            quality,
            protocol: StreamingProtocol::Hls,
        }
    }

    fn permissive_engine() -> MockEngine {
        let mut engine = MockEngine::new();
        engine.expect_prepare().returning(|_| Ok(()));
        engine.expect_play().returning(|| Ok(()));
        engine.expect_pause().returning(|| Ok(()));
        engine.expect_stop().returning(|| Ok(()));
        engine.expect_release().returning(|| Ok(()));
        engine
    }

    fn drain_states(stream: &mut EventStream) -> Vec<PlaybackState> {
        let mut states = Vec::new();
        while let Some(Ok(event)) = stream.try_recv() {
            if let CoreEvent::Playback(PlaybackEvent::StateChanged { current, .. }) = event {
                states.push(current);
            }
        }
        states
    }

    #[tokio::test]
    async fn nominal_lifecycle_publishes_every_transition() {
        let bus = EventBus::new(32);
        let mut stream = EventStream::new(bus.subscribe());
        let controller = PlaybackController::new(Arc::new(permissive_engine()), bus);
        let urn = MediaUrn::new("urn:rts:video:1");

        controller
            .load(&urn, resolution("urn:rts:video:1", vec![hls(Quality::Hd)]), Quality::Hd)
            .await
            .unwrap();
        assert_eq!(controller.state(), PlaybackState::Preparing);

        controller
            .handle_engine_event(EngineEvent::ReadyToPlay)
            .await
            .unwrap();
        assert_eq!(controller.state(), PlaybackState::Playing);

        controller.pause().await.unwrap();
        controller.play().await.unwrap();
        controller
            .handle_engine_event(EngineEvent::PlaybackEnded)
            .await
            .unwrap();

        assert_eq!(
            drain_states(&mut stream),
            vec![
                PlaybackState::Preparing,
                PlaybackState::Ready,
                PlaybackState::Playing,
                PlaybackState::Paused,
                PlaybackState::Playing,
                PlaybackState::Ended,
            ]
        );
        assert!(controller.identity().media.is_some());
    }

    #[tokio::test]
    async fn without_autoplay_ready_waits_for_play() {
        let mut engine = MockEngine::new();
        engine.expect_prepare().returning(|_| Ok(()));
        engine.expect_play().never();
        let controller =
            PlaybackController::new(Arc::new(engine), EventBus::new(8)).with_autoplay(false);
        let urn = MediaUrn::new("urn:rts:video:1");

        controller
            .load(&urn, resolution("urn:rts:video:1", vec![hls(Quality::Sd)]), Quality::Hd)
            .await
            .unwrap();
        controller
            .handle_engine_event(EngineEvent::ReadyToPlay)
            .await
            .unwrap();

        assert_eq!(controller.state(), PlaybackState::Ready);
    }

    #[tokio::test]
    async fn prepare_receives_selected_source() {
        let mut engine = MockEngine::new();
        engine
            .expect_prepare()
            .withf(|source| source.quality == Quality::Hq)
            .times(1)
            .returning(|_| Ok(()));
        let controller = PlaybackController::new(Arc::new(engine), EventBus::new(8));
        let urn = MediaUrn::new("urn:rts:video:1");

        controller
            .load(
                &urn,
                resolution("urn:rts:video:1", vec![hls(Quality::Sd), hls(Quality::Hq)]),
                Quality::Hd,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn composition_without_resources_is_rejected() {
        let mut engine = MockEngine::new();
        engine.expect_prepare().never();
        let controller = PlaybackController::new(Arc::new(engine), EventBus::new(8));
        let urn = MediaUrn::new("urn:rts:video:1");

        let result = controller
            .load(&urn, resolution("urn:rts:video:1", Vec::new()), Quality::Hd)
            .await;

        assert!(matches!(result, Err(PlaybackError::NoPlayableResource { .. })));
        assert_eq!(controller.state(), PlaybackState::Idle);
        let identity = controller.identity();
        assert!(identity.media.is_some());
        assert!(identity.error.is_some());
    }

    #[tokio::test]
    async fn engine_failure_notifies_live_observer_only() {
        let observer = Arc::new(CountingObserver::default());
        let shared: Arc<dyn ControllerObserver> = observer.clone();
        let weak = Arc::downgrade(&shared);

        let live = PlaybackController::new(Arc::new(permissive_engine()), EventBus::new(8));
        live.attach(weak.clone());
        live.handle_engine_event(EngineEvent::Failed {
            message: "decoder".to_string(),
        })
        .await
        .unwrap();

        assert_eq!(live.state(), PlaybackState::Failed);
        assert_eq!(
            live.identity().error,
            Some(PlaybackError::Engine("decoder".to_string()))
        );
        assert_eq!(observer.failures.load(Ordering::SeqCst), 1);

        let detached = PlaybackController::new(Arc::new(permissive_engine()), EventBus::new(8));
        detached.attach(weak);
        detached.detach();
        detached
            .handle_engine_event(EngineEvent::Failed {
                message: "decoder".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(observer.failures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn terminal_states_reject_play() {
        let controller = PlaybackController::new(Arc::new(permissive_engine()), EventBus::new(8));
        controller
            .handle_engine_event(EngineEvent::Failed {
                message: "boom".to_string(),
            })
            .await
            .unwrap();

        let result = controller.play().await;
        assert_eq!(
            result,
            Err(PlaybackError::InvalidTransition {
                from: PlaybackState::Failed,
                to: PlaybackState::Playing,
            })
        );
    }

    #[tokio::test]
    async fn play_urn_resolves_then_prepares() {
        let mut provider = MockProvider::new();
        provider
            .expect_resolve()
            .times(1)
            .returning(|urn| Ok(resolution(urn.as_str(), vec![hls(Quality::Hd)])));
        let controller = PlaybackController::new(Arc::new(permissive_engine()), EventBus::new(8));

        controller
            .play_urn(MediaUrn::new("urn:rts:audio:3"), Quality::Hd, &provider)
            .await
            .unwrap();

        assert_eq!(controller.state(), PlaybackState::Preparing);
        let identity = controller.identity();
        assert_eq!(identity.urn, Some(MediaUrn::new("urn:rts:audio:3")));
        assert!(identity.media_composition.is_some());
    }

    #[tokio::test]
    async fn play_urn_keeps_resolution_failure() {
        let mut provider = MockProvider::new();
        provider
            .expect_resolve()
            .returning(|_| Err(BridgeError::NotFound("404".to_string())));
        let mut engine = MockEngine::new();
        engine.expect_prepare().never();
        let controller = PlaybackController::new(Arc::new(engine), EventBus::new(8));
        let urn = MediaUrn::new("urn:rts:video:404");

        let result = controller.play_urn(urn.clone(), Quality::Hd, &provider).await;

        assert_eq!(result, Err(PlaybackError::NotFound(urn.clone())));
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert_eq!(controller.identity().error, Some(PlaybackError::NotFound(urn)));
    }

    #[tokio::test]
    async fn release_is_idempotent_and_final() {
        let mut engine = MockEngine::new();
        engine.expect_stop().times(1).returning(|| Ok(()));
        engine.expect_release().times(1).returning(|| Ok(()));
        let controller = PlaybackController::new(Arc::new(engine), EventBus::new(8));
        controller.attach(Weak::<CountingObserver>::new());

        controller.release().await;
        controller.release().await;

        assert!(controller.is_released());
        assert!(!controller.is_live());
        assert_eq!(controller.position().await, Err(PlaybackError::ControllerReleased));
    }

    #[tokio::test]
    async fn position_and_mirroring_reach_engine() {
        let mut engine = MockEngine::new();
        engine
            .expect_position()
            .returning(|| Ok(Duration::from_secs(42)));
        engine
            .expect_duration()
            .returning(|| Ok(Some(Duration::from_secs(120))));
        engine
            .expect_set_external_screen_mirroring()
            .with(mockall::predicate::eq(true))
            .times(1)
            .returning(|_| Ok(()));
        let controller = PlaybackController::new(Arc::new(engine), EventBus::new(8));

        assert_eq!(controller.position().await, Ok(Duration::from_secs(42)));
        assert_eq!(
            controller.duration().await,
            Ok(Some(Duration::from_secs(120)))
        );
        controller.set_mirrored_on_external_screen(true).await.unwrap();
    }

    #[test]
    fn update_metadata_ignores_other_urns() {
        let controller = PlaybackController::new(Arc::new(MockEngine::new()), EventBus::new(8));
        let current = MediaUrn::new("urn:rts:video:1");
        controller.inner.lock().identity = PlaybackIdentity::for_urn(current.clone(), Quality::Hd);

        assert!(!controller.update_metadata(
            &MediaUrn::new("urn:rts:video:2"),
            resolution("urn:rts:video:2", vec![hls(Quality::Hd)])
        ));
        assert!(controller.update_metadata(
            &current,
            resolution("urn:rts:video:1", vec![hls(Quality::Hd)])
        ));
        assert!(controller.identity().media.is_some());
    }
}
