//! # Picture-in-Picture Session
//!
//! Bridges the OS picture-in-picture lifecycle of the live controller to the
//! delegate supplied by the host application.
//!
//! A session is bound to one controller. The service creates it when both a
//! delegate and a live controller exist, and unbinds it when the controller
//! is replaced or the service is reset.
//!
//! ## Stop sequence
//!
//! ```text
//! stop() ──> should_restore_user_interface()?
//!              │ no                     │ yes
//!              │                        ▼
//!              │            restore_user_interface(completion)
//!              │                        │  (session stays active)
//!              │                        ▼
//!              │            completion.complete(restored)
//!              ▼                        ▼
//!        inactive, did_stop_picture_in_picture(), Stopped event
//! ```
//!
//! The session has no timeout: a delegate that never completes the
//! restoration leaves the session active.

use bridge_traits::picture_in_picture::{PictureInPictureDelegate, RestorationCompletion};
use core_playback::ControllerId;
use core_runtime::events::{CoreEvent, EventBus, PictureInPictureEvent};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, warn};

/// Result of [`PictureInPictureSession::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Picture in picture was not active.
    NotActive,
    /// Another stop sequence is waiting for its restoration.
    InProgress,
    /// The stop sequence finished. `restored` is `None` when no restoration
    /// was needed.
    Stopped { restored: Option<bool> },
}

#[derive(Debug, Default)]
struct SessionState {
    active: bool,
    stopping: bool,
    bound: bool,
}

/// Picture-in-picture state of the live controller.
pub struct PictureInPictureSession {
    controller_id: ControllerId,
    delegate: Weak<dyn PictureInPictureDelegate>,
    event_bus: EventBus,
    state: Mutex<SessionState>,
}

impl PictureInPictureSession {
    pub fn new(
        controller_id: ControllerId,
        delegate: Weak<dyn PictureInPictureDelegate>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            controller_id,
            delegate,
            event_bus,
            state: Mutex::new(SessionState {
                bound: true,
                ..Default::default()
            }),
        }
    }

    pub fn controller_id(&self) -> ControllerId {
        self.controller_id
    }

    /// Whether picture in picture can be offered: the session is still bound
    /// and the delegate is alive.
    pub fn is_possible(&self) -> bool {
        self.state.lock().bound && self.delegate.strong_count() > 0
    }

    /// OS-reported picture-in-picture state.
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// OS request to enter picture in picture. Refused (returns `false`) when
    /// picture in picture is not possible.
    #[instrument(skip(self), fields(controller_id = %self.controller_id))]
    pub fn start(&self) -> bool {
        let Some(delegate) = self.delegate.upgrade() else {
            warn!("Picture in picture refused: no delegate");
            return false;
        };

        {
            let mut state = self.state.lock();
            if !state.bound {
                warn!("Picture in picture refused: session unbound");
                return false;
            }
            if state.active {
                return true;
            }
            state.active = true;
        }

        info!("Picture in picture started");
        delegate.did_start_picture_in_picture();
        self.emit(PictureInPictureEvent::Started {
            controller_id: self.controller_id.to_string(),
        });
        true
    }

    /// OS-driven stop. Waits for the delegate to finish restoring the user
    /// interface when it asks for a restoration.
    #[instrument(skip(self), fields(controller_id = %self.controller_id))]
    pub async fn stop(&self) -> StopOutcome {
        {
            let mut state = self.state.lock();
            if !state.active {
                return StopOutcome::NotActive;
            }
            if state.stopping {
                return StopOutcome::InProgress;
            }
            state.stopping = true;
        }

        let receiver = self.delegate.upgrade().and_then(|delegate| {
            if !delegate.should_restore_user_interface() {
                return None;
            }
            let (completion, receiver) = RestorationCompletion::pair();
            debug!("Requesting user interface restoration");
            delegate.restore_user_interface(completion);
            Some(receiver)
        });

        let restored = match receiver {
            Some(receiver) => match receiver.await {
                Ok(restored) => Some(restored),
                Err(_) => {
                    warn!("Restoration completion dropped without being called");
                    Some(false)
                }
            },
            None => None,
        };

        {
            let mut state = self.state.lock();
            state.active = false;
            state.stopping = false;
        }

        info!(?restored, "Picture in picture stopped");
        self.finish(restored);
        StopOutcome::Stopped { restored }
    }

    /// Detach the session from its controller. An active picture in picture
    /// ends without restoration; a stop sequence in progress completes on its
    /// own.
    pub fn unbind(&self) {
        let was_active = {
            let mut state = self.state.lock();
            state.bound = false;
            let was_active = state.active && !state.stopping;
            if was_active {
                state.active = false;
            }
            was_active
        };

        debug!(controller_id = %self.controller_id, was_active, "Session unbound");
        if was_active {
            self.finish(None);
        }
    }

    fn finish(&self, restored: Option<bool>) {
        if let Some(delegate) = self.delegate.upgrade() {
            delegate.did_stop_picture_in_picture();
        }
        self.emit(PictureInPictureEvent::Stopped {
            controller_id: self.controller_id.to_string(),
            restored,
        });
    }

    fn emit(&self, event: PictureInPictureEvent) {
        let _ = self.event_bus.emit(CoreEvent::PictureInPicture(event));
    }
}

impl fmt::Debug for PictureInPictureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PictureInPictureSession")
            .field("controller_id", &self.controller_id)
            .field("active", &state.active)
            .field("bound", &state.bound)
            .finish()
    }
}

/// Convenience for hosts holding the delegate in an `Arc`.
pub fn delegate_handle<D>(delegate: &Arc<D>) -> Weak<dyn PictureInPictureDelegate>
where
    D: PictureInPictureDelegate + 'static,
{
    let delegate: Arc<dyn PictureInPictureDelegate> = delegate.clone();
    Arc::downgrade(&delegate)
}
