//! Shared fakes for the service integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::engine::{EngineFactory, PlayerEngine};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::media::{
    Chapter, Media, MediaComposition, MediaUrn, PlayableSource, Quality, Resolution, Resource,
    StreamingProtocol,
};
use bridge_traits::picture_in_picture::{PictureInPictureDelegate, RestorationCompletion};
use core_runtime::config::ServiceConfig;
use core_runtime::events::{CoreEvent, EventStream, ServiceEvent};
use core_service::{PlaybackService, ServiceDependencies};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const WAIT: Duration = Duration::from_secs(2);
pub const QUIET: Duration = Duration::from_millis(100);

// ============================================================================
// Media
// ============================================================================

pub fn urn(value: &str) -> MediaUrn {
    MediaUrn::new(value)
}

pub fn media(value: &str) -> Media {
    Media::new(urn(value), format!("Title of {value}")).with_duration(Duration::from_secs(600))
}

pub fn composition(value: &str, playable: bool) -> MediaComposition {
    let resources = if playable {
        vec![Resource {
            url: format!("https://cdn.example.com/{value}/master.m3u8?hdnts=secret"),
            quality: Quality::Hd,
            protocol: StreamingProtocol::Hls,
        }]
    } else {
        Vec::new()
    };

    MediaComposition {
        chapter_urn: urn(value),
        chapters: vec![Chapter {
            urn: urn(value),
            title: format!("Chapter of {value}"),
            duration: Duration::from_secs(600),
            resources,
            segments: Vec::new(),
        }],
    }
}

pub fn resolution(value: &str) -> Resolution {
    Resolution::new(media(value), composition(value, true))
}

// ============================================================================
// Data Provider
// ============================================================================

#[derive(Clone)]
enum Outcome {
    Resolve(Resolution),
    Network(String),
}

/// Data provider whose answers can be held back per resource name.
#[derive(Default)]
pub struct GatedDataProvider {
    outcomes: Mutex<HashMap<MediaUrn, Outcome>>,
    gates: Mutex<HashMap<MediaUrn, Arc<Notify>>>,
    calls: Mutex<Vec<MediaUrn>>,
}

impl GatedDataProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn succeed(&self, value: &str) {
        self.answer(value, Outcome::Resolve(resolution(value)));
    }

    pub fn succeed_with(&self, value: &str, resolution: Resolution) {
        self.answer(value, Outcome::Resolve(resolution));
    }

    pub fn fail(&self, value: &str) {
        self.answer(value, Outcome::Network("connection reset".to_string()));
    }

    /// Hold answers for `value` until [`GatedDataProvider::open`].
    pub fn gate(&self, value: &str) {
        self.gates
            .lock()
            .unwrap()
            .insert(urn(value), Arc::new(Notify::new()));
    }

    pub fn open(&self, value: &str) {
        if let Some(gate) = self.gates.lock().unwrap().get(&urn(value)) {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> Vec<MediaUrn> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, value: &str, outcome: Outcome) {
        self.outcomes.lock().unwrap().insert(urn(value), outcome);
    }
}

#[async_trait]
impl bridge_traits::data_provider::DataProvider for GatedDataProvider {
    async fn resolve(&self, urn: &MediaUrn) -> BridgeResult<Resolution> {
        self.calls.lock().unwrap().push(urn.clone());

        let gate = self.gates.lock().unwrap().get(urn).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let outcome = self.outcomes.lock().unwrap().get(urn).cloned();
        match outcome {
            Some(Outcome::Resolve(resolution)) => Ok(resolution),
            Some(Outcome::Network(message)) => Err(BridgeError::Network(message)),
            None => Err(BridgeError::NotFound(urn.to_string())),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Prepare(String),
    Play,
    Pause,
    Stop,
    Mirroring(bool),
    Release,
}

#[derive(Default)]
pub struct FakeEngine {
    calls: Mutex<Vec<EngineCall>>,
    position: Mutex<Duration>,
    fail_prepare: bool,
    stop_gate: Option<Arc<Notify>>,
}

impl FakeEngine {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &EngineCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn prepared(&self) -> bool {
        self.calls()
            .iter()
            .any(|call| matches!(call, EngineCall::Prepare(_)))
    }

    pub fn is_released(&self) -> bool {
        self.count(&EngineCall::Release) > 0
    }

    pub fn set_position(&self, position: Duration) {
        *self.position.lock().unwrap() = position;
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PlayerEngine for FakeEngine {
    async fn prepare(&self, source: PlayableSource) -> BridgeResult<()> {
        self.record(EngineCall::Prepare(source.url));
        if self.fail_prepare {
            return Err(BridgeError::OperationFailed("unsupported codec".to_string()));
        }
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record(EngineCall::Play);
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record(EngineCall::Pause);
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.record(EngineCall::Stop);
        if let Some(gate) = &self.stop_gate {
            gate.notified().await;
        }
        Ok(())
    }

    async fn position(&self) -> BridgeResult<Duration> {
        Ok(*self.position.lock().unwrap())
    }

    async fn duration(&self) -> BridgeResult<Option<Duration>> {
        Ok(Some(Duration::from_secs(600)))
    }

    async fn set_external_screen_mirroring(&self, mirrored: bool) -> BridgeResult<()> {
        self.record(EngineCall::Mirroring(mirrored));
        Ok(())
    }

    async fn release(&self) -> BridgeResult<()> {
        self.record(EngineCall::Release);
        Ok(())
    }
}

/// Factory keeping every engine it created.
#[derive(Default)]
pub struct FakeFactory {
    engines: Mutex<Vec<Arc<FakeEngine>>>,
    unavailable: AtomicBool,
    fail_prepare: AtomicBool,
    stop_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_fail_prepare(&self, fail: bool) {
        self.fail_prepare.store(fail, Ordering::SeqCst);
    }

    /// Engines created from now on block in `stop` until the returned gate
    /// is notified.
    pub fn hold_stop(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.stop_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn engines(&self) -> Vec<Arc<FakeEngine>> {
        self.engines.lock().unwrap().clone()
    }

    pub fn created(&self) -> usize {
        self.engines.lock().unwrap().len()
    }

    pub fn last(&self) -> Arc<FakeEngine> {
        self.engines()
            .last()
            .cloned()
            .expect("no engine created yet")
    }
}

impl EngineFactory for FakeFactory {
    fn create_engine(&self) -> BridgeResult<Arc<dyn PlayerEngine>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAvailable("no video surface".to_string()));
        }

        let engine = Arc::new(FakeEngine {
            fail_prepare: self.fail_prepare.load(Ordering::SeqCst),
            stop_gate: self.stop_gate.lock().unwrap().clone(),
            ..Default::default()
        });
        self.engines.lock().unwrap().push(Arc::clone(&engine));
        let engine: Arc<dyn PlayerEngine> = engine;
        Ok(engine)
    }
}

// ============================================================================
// Picture-in-Picture Delegate
// ============================================================================

/// Delegate that keeps the restoration completion until the test signals it.
#[derive(Default)]
pub struct DeferredDelegate {
    restore: AtomicBool,
    pending: Mutex<Option<RestorationCompletion>>,
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
}

impl DeferredDelegate {
    pub fn restoring() -> Arc<Self> {
        let delegate = Self::default();
        delegate.restore.store(true, Ordering::SeqCst);
        Arc::new(delegate)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().unwrap().is_some()
    }

    /// Complete the pending restoration. Returns `false` if none was pending.
    pub fn complete(&self, restored: bool) -> bool {
        match self.pending.lock().unwrap().take() {
            Some(completion) => {
                completion.complete(restored);
                true
            }
            None => false,
        }
    }
}

impl PictureInPictureDelegate for DeferredDelegate {
    fn should_restore_user_interface(&self) -> bool {
        self.restore.load(Ordering::SeqCst)
    }

    fn restore_user_interface(&self, completion: RestorationCompletion) {
        *self.pending.lock().unwrap() = Some(completion);
    }

    fn did_start_picture_in_picture(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn did_stop_picture_in_picture(&self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Service Helpers
// ============================================================================

pub fn build_service(provider: &Arc<GatedDataProvider>, factory: &Arc<FakeFactory>) -> PlaybackService {
    build_service_with(provider, factory, ServiceConfig::default())
}

pub fn build_service_with(
    provider: &Arc<GatedDataProvider>,
    factory: &Arc<FakeFactory>,
    config: ServiceConfig,
) -> PlaybackService {
    PlaybackService::new(
        ServiceDependencies::new(provider.clone(), factory.clone()),
        config,
    )
    .expect("service should build")
}

/// Stream of the service-level events only.
pub fn service_events(service: &PlaybackService) -> EventStream {
    service
        .subscribe()
        .filter(|event| matches!(event, CoreEvent::Service(_)))
}

pub async fn next_service_event(stream: &mut EventStream) -> ServiceEvent {
    let event = tokio::time::timeout(WAIT, stream.recv())
        .await
        .expect("timed out waiting for a service event")
        .expect("event bus closed");
    match event {
        CoreEvent::Service(event) => event,
        other => panic!("unexpected event: {other:?}"),
    }
}

/// Asserts that no event arrives for a short while.
pub async fn assert_quiet(stream: &mut EventStream) {
    if let Ok(event) = tokio::time::timeout(QUIET, stream.recv()).await {
        panic!("unexpected event: {event:?}");
    }
}

/// Poll `condition` until it holds or [`WAIT`] expires.
pub async fn eventually<F>(condition: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
