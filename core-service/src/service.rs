//! # Playback Service
//!
//! Owner of the shared playback session.
//!
//! The service holds at most one *live* [`PlaybackController`] and the
//! [`PlaybackIdentity`] of what it plays. Play requests atomically tear down
//! and replace the live controller; `resume_from_controller` adopts a
//! controller created by a UI surface without interrupting it.
//!
//! ## Notifications
//!
//! For one request, subscribers observe:
//!
//! 1. `MetadataChanged` as soon as the new resource name is known
//! 2. `MetadataChanged` once media and composition are resolved, **or**
//!    `PlaybackFailed` if resolution fails
//!
//! All state lives behind a single async mutex and every event is emitted
//! while it is held, so events are published in mutation order. Engine calls
//! (release, prepare, mirroring) run after the lock is released so a slow
//! host engine never stalls readers.
//!
//! ## Stale resolutions
//!
//! Resolution runs in a spawned task. Superseding the request cancels the
//! task's token; a result that still gets through is dropped unless its
//! request id and resource name both match the current request.

use crate::error::{CoreError, Result};
use crate::picture_in_picture::PictureInPictureSession;
use crate::ServiceDependencies;
use bridge_traits::data_provider::DataProvider;
use bridge_traits::engine::{EngineFactory, PlaybackState};
use bridge_traits::media::{Media, MediaComposition, MediaUrn, Quality, Resolution};
use bridge_traits::picture_in_picture::PictureInPictureDelegate;
use core_playback::{
    ControllerId, ControllerObserver, PlaybackController, PlaybackError, PlaybackIdentity,
};
use core_runtime::config::ServiceConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, MetadataSnapshot, ServiceEvent};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`PlaybackService`].
#[derive(Default)]
pub struct PlaybackServiceBuilder {
    data_provider: Option<Arc<dyn DataProvider>>,
    engine_factory: Option<Arc<dyn EngineFactory>>,
    event_bus: Option<EventBus>,
    config: ServiceConfig,
}

impl PlaybackServiceBuilder {
    pub fn dependencies(mut self, dependencies: ServiceDependencies) -> Self {
        self.data_provider = Some(dependencies.data_provider);
        self.engine_factory = Some(dependencies.engine_factory);
        self
    }

    pub fn data_provider(mut self, data_provider: Arc<dyn DataProvider>) -> Self {
        self.data_provider = Some(data_provider);
        self
    }

    pub fn engine_factory(mut self, engine_factory: Arc<dyn EngineFactory>) -> Self {
        self.engine_factory = Some(engine_factory);
        self
    }

    /// Publish on an existing bus instead of creating one sized from the
    /// configuration.
    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration and the injected capabilities.
    ///
    /// Must be called from within a Tokio runtime: resolutions and failure
    /// forwarding are spawned on it.
    pub fn build(self) -> Result<PlaybackService> {
        self.config.validate()?;

        let data_provider = self.data_provider.ok_or_else(|| {
            CoreError::capability_missing(
                "DataProvider",
                "a data provider is required to resolve resource names",
            )
        })?;
        let engine_factory = self.engine_factory.ok_or_else(|| {
            CoreError::capability_missing(
                "EngineFactory",
                "an engine factory is required to create playback controllers",
            )
        })?;
        let runtime = Handle::try_current().map_err(|e| {
            CoreError::InitializationFailed(format!("no Tokio runtime available: {e}"))
        })?;

        let event_bus = self
            .event_bus
            .unwrap_or_else(|| EventBus::new(self.config.event_buffer_size));
        let mirrored = self.config.mirrored_on_external_screen;
        let config = self.config;

        let shared = Arc::new_cyclic(|weak_self| ServiceShared {
            config,
            data_provider,
            engine_factory,
            event_bus,
            runtime,
            state: Mutex::new(ServiceState::new(mirrored)),
            weak_self: weak_self.clone(),
        });

        info!("Playback service ready");
        Ok(PlaybackService { shared })
    }
}

// ============================================================================
// Service
// ============================================================================

/// Process-wide playback session, constructed once by the application's
/// composition root and shared by cloning.
#[derive(Clone)]
pub struct PlaybackService {
    shared: Arc<ServiceShared>,
}

struct ServiceShared {
    config: ServiceConfig,
    data_provider: Arc<dyn DataProvider>,
    engine_factory: Arc<dyn EngineFactory>,
    event_bus: EventBus,
    runtime: Handle,
    state: Mutex<ServiceState>,
    weak_self: Weak<ServiceShared>,
}

struct ServiceState {
    controller: Option<Arc<PlaybackController>>,
    identity: PlaybackIdentity,
    pending: Option<PendingResolution>,
    next_request_id: u64,
    pip_delegate: Option<Weak<dyn PictureInPictureDelegate>>,
    pip_session: Option<Arc<PictureInPictureSession>>,
    mirrored: bool,
}

impl ServiceState {
    fn new(mirrored: bool) -> Self {
        Self {
            controller: None,
            identity: PlaybackIdentity::default(),
            pending: None,
            next_request_id: 0,
            pip_delegate: None,
            pip_session: None,
            mirrored,
        }
    }

    fn is_empty(&self) -> bool {
        self.controller.is_none() && self.pending.is_none() && self.identity.is_empty()
    }
}

/// Work left once a replacement has been committed under the state lock.
struct Handoff {
    retired: Option<Arc<PlaybackController>>,
    installed: Option<Arc<PlaybackController>>,
    resolve: Option<(MediaUrn, Quality)>,
}

/// In-flight metadata resolution.
struct PendingResolution {
    request_id: u64,
    urn: MediaUrn,
    token: CancellationToken,
}

impl PlaybackService {
    pub fn builder() -> PlaybackServiceBuilder {
        PlaybackServiceBuilder::default()
    }

    pub fn new(dependencies: ServiceDependencies, config: ServiceConfig) -> Result<Self> {
        Self::builder()
            .dependencies(dependencies)
            .config(config)
            .build()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.shared.config
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    /// Play `urn`, replacing whatever is live.
    ///
    /// No-op when `urn` already is the current resource, even after its
    /// request failed; call [`Self::reset`] first to retry. Failures are
    /// reported through [`Self::last_error`] and `PlaybackFailed`, never
    /// returned.
    #[instrument(skip(self), fields(urn = %urn))]
    pub async fn play_urn(&self, urn: MediaUrn, quality: Option<Quality>) {
        let quality = quality.unwrap_or(self.shared.config.default_quality);
        self.shared.replace(urn, None, quality).await;
    }

    /// Play already resolved media. The composition is still resolved.
    #[instrument(skip(self, media), fields(urn = %media.urn))]
    pub async fn play_media(&self, media: Media, quality: Option<Quality>) {
        let quality = quality.unwrap_or(self.shared.config.default_quality);
        self.shared.replace(media.urn.clone(), Some(media), quality).await;
    }

    /// Adopt `controller` as the live controller without restarting it.
    ///
    /// The controller's own metadata becomes the shared identity. Metadata is
    /// only resolved when the controller has a resource name but no media or
    /// composition yet.
    #[instrument(skip(self, controller), fields(controller_id = %controller.id()))]
    pub async fn resume_from_controller(&self, controller: Arc<PlaybackController>) {
        self.shared.adopt(controller).await;
    }

    /// Tear down the live controller and clear the identity.
    #[instrument(skip(self))]
    pub async fn reset(&self) {
        self.shared.reset().await;
    }

    // ------------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------------

    pub async fn urn(&self) -> Option<MediaUrn> {
        self.shared.state.lock().await.identity.urn.clone()
    }

    pub async fn media(&self) -> Option<Media> {
        self.shared.state.lock().await.identity.media.clone()
    }

    pub async fn media_composition(&self) -> Option<MediaComposition> {
        self.shared.state.lock().await.identity.media_composition.clone()
    }

    pub async fn preferred_quality(&self) -> Option<Quality> {
        self.shared.state.lock().await.identity.preferred_quality
    }

    pub async fn last_error(&self) -> Option<PlaybackError> {
        self.shared.state.lock().await.identity.error.clone()
    }

    /// Consistent copy of every identity field.
    pub async fn identity(&self) -> PlaybackIdentity {
        self.shared.state.lock().await.identity.clone()
    }

    /// The live controller, if any.
    pub async fn controller(&self) -> Option<Arc<PlaybackController>> {
        self.shared.state.lock().await.controller.clone()
    }

    // ------------------------------------------------------------------------
    // External screen
    // ------------------------------------------------------------------------

    /// Mirror the player on external screens instead of switching to
    /// full-screen external playback. Kept across controller replacements.
    pub async fn set_mirrored_on_external_screen(&self, mirrored: bool) {
        let controller = {
            let mut state = self.shared.state.lock().await;
            if state.mirrored == mirrored {
                return;
            }
            state.mirrored = mirrored;
            debug!(mirrored, "External screen mirroring changed");
            state.controller.clone()
        };

        if let Some(controller) = controller {
            self.shared.sync_mirroring(&controller).await;
        }
    }

    pub async fn is_mirrored_on_external_screen(&self) -> bool {
        self.shared.state.lock().await.mirrored
    }

    // ------------------------------------------------------------------------
    // Picture in picture
    // ------------------------------------------------------------------------

    /// Install the picture-in-picture delegate, or remove it with `None`.
    ///
    /// The service does not keep the delegate alive: the caller must outlive
    /// it or clear it. Changing the delegate rebinds the session, ending an
    /// active picture in picture; setting the current delegate again keeps it.
    pub async fn set_picture_in_picture_delegate(
        &self,
        delegate: Option<Weak<dyn PictureInPictureDelegate>>,
    ) {
        let mut state = self.shared.state.lock().await;
        let unchanged = match (&state.pip_delegate, &delegate) {
            (Some(current), Some(next)) => Weak::ptr_eq(current, next),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            debug!("Picture-in-picture delegate unchanged");
            return;
        }

        if let Some(session) = state.pip_session.take() {
            session.unbind();
        }
        state.pip_delegate = delegate;
        let session = state
            .controller
            .as_ref()
            .and_then(|controller| self.shared.session_for(&state, controller));
        state.pip_session = session;
    }

    pub async fn picture_in_picture_session(&self) -> Option<Arc<PictureInPictureSession>> {
        self.shared.state.lock().await.pip_session.clone()
    }

    pub async fn is_picture_in_picture_active(&self) -> bool {
        self.shared
            .state
            .lock()
            .await
            .pip_session
            .as_ref()
            .is_some_and(|session| session.is_active())
    }

    /// Whether picture in picture is advertised: a live controller exists
    /// and the delegate is alive.
    pub async fn is_picture_in_picture_possible(&self) -> bool {
        self.shared
            .state
            .lock()
            .await
            .pip_session
            .as_ref()
            .is_some_and(|session| session.is_possible())
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.shared.event_bus.subscribe())
    }

    pub fn event_bus(&self) -> EventBus {
        self.shared.event_bus.clone()
    }
}

impl fmt::Debug for PlaybackService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackService")
            .field("config", &self.shared.config)
            .field("event_bus", &self.shared.event_bus)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Internals
// ============================================================================

impl ServiceShared {
    async fn replace(self: &Arc<Self>, urn: MediaUrn, media: Option<Media>, quality: Quality) {
        let handoff = {
            let mut state = self.state.lock().await;
            if state.identity.is_for(&urn) {
                debug!("Resource already current, ignoring request");
                return;
            }

            let previous = state.identity.snapshot();
            let retired = self.teardown(&mut state);
            state.identity = match media {
                Some(media) => PlaybackIdentity::for_media(media, quality),
                None => PlaybackIdentity::for_urn(urn.clone(), quality),
            };

            match PlaybackController::from_factory(
                self.engine_factory.as_ref(),
                self.event_bus.clone(),
            ) {
                Ok(controller) => {
                    let controller = Arc::new(controller.with_autoplay(self.config.autoplay));
                    self.install(&mut state, Arc::clone(&controller));
                    info!(%quality, "Playback replaced");
                    self.publish_metadata(previous, &state);
                    Handoff {
                        retired,
                        installed: Some(controller),
                        resolve: Some((urn, quality)),
                    }
                }
                Err(error) => {
                    self.publish_metadata(previous, &state);
                    self.fail_request(&mut state, error);
                    Handoff {
                        retired,
                        installed: None,
                        resolve: None,
                    }
                }
            }
        };

        self.complete_handoff(handoff).await;
    }

    async fn adopt(self: &Arc<Self>, controller: Arc<PlaybackController>) {
        let handoff = {
            let mut state = self.state.lock().await;
            if is_live_controller(&state, &controller) {
                debug!("Controller already live, ignoring request");
                return;
            }
            if controller.is_released() {
                self.fail_request(&mut state, PlaybackError::ControllerReleased);
                return;
            }

            let previous = state.identity.snapshot();
            let retired = self.teardown(&mut state);

            let identity = controller.identity();
            state.identity = identity.clone();
            self.install(&mut state, Arc::clone(&controller));
            info!(state = %controller_state(&state), "Controller adopted");
            self.publish_metadata(previous, &state);

            let resolve = identity
                .urn
                .filter(|_| identity.media.is_none() || identity.media_composition.is_none())
                .map(|urn| {
                    let quality = identity
                        .preferred_quality
                        .unwrap_or(self.config.default_quality);
                    (urn, quality)
                });
            Handoff {
                retired,
                installed: Some(controller),
                resolve,
            }
        };

        self.complete_handoff(handoff).await;
    }

    async fn reset(&self) {
        let retired = {
            let mut state = self.state.lock().await;
            if state.is_empty() {
                debug!("Nothing to reset");
                return;
            }

            let previous = state.identity.snapshot();
            let retired = self.teardown(&mut state);
            state.identity = PlaybackIdentity::default();
            info!("Playback reset");
            self.publish_metadata(previous, &state);
            retired
        };

        if let Some(controller) = retired {
            controller.release().await;
        }
    }

    /// Cancel the pending resolution, unbind picture in picture and detach
    /// the live controller. The caller releases the returned controller once
    /// the state lock is dropped.
    fn teardown(&self, state: &mut ServiceState) -> Option<Arc<PlaybackController>> {
        if let Some(pending) = state.pending.take() {
            debug!(
                request_id = pending.request_id,
                urn = %pending.urn,
                "Cancelling pending resolution"
            );
            pending.token.cancel();
        }
        if let Some(session) = state.pip_session.take() {
            session.unbind();
        }
        let controller = state.controller.take()?;
        controller.detach();
        Some(controller)
    }

    fn install(&self, state: &mut ServiceState, controller: Arc<PlaybackController>) {
        let observer: Weak<dyn ControllerObserver> = self.weak_self.clone();
        controller.attach(observer);

        let session = self.session_for(state, &controller);
        state.pip_session = session;
        state.controller = Some(controller);
    }

    /// Release the retired controller, push the mirroring policy to the new
    /// one, then start resolving if it is still live.
    async fn complete_handoff(self: &Arc<Self>, handoff: Handoff) {
        if let Some(retired) = handoff.retired {
            retired.release().await;
        }
        let Some(controller) = handoff.installed else {
            return;
        };
        self.sync_mirroring(&controller).await;

        if let Some((urn, quality)) = handoff.resolve {
            let mut state = self.state.lock().await;
            let still_current = is_live_controller(&state, &controller)
                && state.pending.is_none()
                && state.identity.is_for(&urn);
            if still_current {
                self.begin_resolution(&mut state, urn, quality);
            }
        }
    }

    /// Push the mirroring policy to `controller` until the engine agrees with
    /// the latest policy, or the controller is no longer live.
    async fn sync_mirroring(&self, controller: &Arc<PlaybackController>) {
        let mut applied = None;
        loop {
            let wanted = {
                let state = self.state.lock().await;
                if !is_live_controller(&state, controller) {
                    return;
                }
                state.mirrored
            };
            if applied == Some(wanted) {
                return;
            }
            if let Err(e) = controller.set_mirrored_on_external_screen(wanted).await {
                warn!(error = %e, "Failed to apply mirroring to live controller");
                return;
            }
            applied = Some(wanted);
        }
    }

    fn session_for(
        &self,
        state: &ServiceState,
        controller: &PlaybackController,
    ) -> Option<Arc<PictureInPictureSession>> {
        state.pip_delegate.as_ref().map(|delegate| {
            Arc::new(PictureInPictureSession::new(
                controller.id(),
                delegate.clone(),
                self.event_bus.clone(),
            ))
        })
    }

    fn begin_resolution(self: &Arc<Self>, state: &mut ServiceState, urn: MediaUrn, quality: Quality) {
        state.next_request_id += 1;
        let request_id = state.next_request_id;
        let token = CancellationToken::new();
        state.pending = Some(PendingResolution {
            request_id,
            urn: urn.clone(),
            token: token.clone(),
        });
        debug!(request_id, urn = %urn, "Resolution started");

        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => {
                    debug!(request_id, urn = %urn, "Resolution cancelled");
                    return;
                }
                outcome = shared.resolve(&urn) => outcome,
            };
            shared
                .complete_resolution(request_id, urn, quality, outcome)
                .await;
        });
    }

    async fn resolve(&self, urn: &MediaUrn) -> std::result::Result<Resolution, PlaybackError> {
        let resolution = self.data_provider.resolve(urn);
        let result = match self.config.resolution_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, resolution).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(PlaybackError::ResolutionTimeout {
                        urn: urn.clone(),
                        timeout,
                    })
                }
            },
            None => resolution.await,
        };
        result.map_err(|e| PlaybackError::from_resolution(urn, e))
    }

    async fn complete_resolution(
        &self,
        request_id: u64,
        urn: MediaUrn,
        quality: Quality,
        outcome: std::result::Result<Resolution, PlaybackError>,
    ) {
        let mut state = self.state.lock().await;
        let is_current = state
            .pending
            .as_ref()
            .is_some_and(|pending| pending.request_id == request_id)
            && state.identity.is_for(&urn);
        if !is_current {
            debug!(request_id, urn = %urn, "Discarding stale resolution");
            return;
        }
        state.pending = None;

        let resolution = match outcome {
            Ok(resolution) => resolution,
            Err(error) => {
                self.fail_request(&mut state, error);
                return;
            }
        };

        // An adopted controller is already playing and only needs metadata.
        let to_load = state
            .controller
            .clone()
            .filter(|controller| controller.state() == PlaybackState::Idle);

        if to_load.is_some() && resolution.media_composition.playable_source(quality).is_none() {
            self.fail_request(
                &mut state,
                PlaybackError::NoPlayableResource {
                    urn: urn.clone(),
                    quality,
                },
            );
            return;
        }

        let previous = state.identity.snapshot();
        state.identity.apply_resolution(&urn, resolution.clone());
        debug!(request_id, urn = %urn, "Resolution completed");
        self.publish_metadata(previous, &state);

        let Some(controller) = to_load else {
            if let Some(controller) = state.controller.as_ref() {
                controller.update_metadata(&urn, resolution);
            }
            return;
        };
        drop(state);

        // Engine failures come back through the observer.
        if let Err(error) = controller.load(&urn, resolution, quality).await {
            if !matches!(error, PlaybackError::Engine(_)) {
                self.record_controller_failure(controller.id(), error).await;
            }
        }
    }

    async fn record_controller_failure(&self, controller_id: ControllerId, error: PlaybackError) {
        let mut state = self.state.lock().await;
        let is_live = state
            .controller
            .as_ref()
            .is_some_and(|controller| controller.id() == controller_id);
        if !is_live {
            debug!(%controller_id, "Ignoring failure of a replaced controller");
            return;
        }
        self.fail_request(&mut state, error);
    }

    fn fail_request(&self, state: &mut ServiceState, error: PlaybackError) {
        warn!(urn = ?state.identity.urn, error = %error, "Playback request failed");
        let failure = error.report();
        state.identity.record_error(error);
        let _ = self
            .event_bus
            .emit(CoreEvent::Service(ServiceEvent::PlaybackFailed {
                urn: state.identity.urn.clone(),
                failure,
            }));
    }

    fn publish_metadata(&self, previous: MetadataSnapshot, state: &ServiceState) {
        let current = state.identity.snapshot();
        let _ = self
            .event_bus
            .emit(CoreEvent::Service(ServiceEvent::MetadataChanged {
                previous,
                current,
            }));
    }
}

impl ControllerObserver for ServiceShared {
    fn controller_did_fail(&self, controller: ControllerId, error: &PlaybackError) {
        let Some(shared) = self.weak_self.upgrade() else {
            return;
        };
        let error = error.clone();
        // The failing call may run while the service holds its own lock.
        self.runtime.spawn(async move {
            shared.record_controller_failure(controller, error).await;
        });
    }
}

fn is_live_controller(state: &ServiceState, controller: &Arc<PlaybackController>) -> bool {
    state
        .controller
        .as_ref()
        .is_some_and(|live| Arc::ptr_eq(live, controller))
}

fn controller_state(state: &ServiceState) -> PlaybackState {
    state
        .controller
        .as_ref()
        .map(|controller| controller.state())
        .unwrap_or_default()
}
