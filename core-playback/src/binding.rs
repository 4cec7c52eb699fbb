//! View-side binding to a controller.
//!
//! A UI surface displays exactly one controller at a time and never keeps it
//! alive: when the service replaces or releases the controller, the binding
//! simply stops resolving.

use crate::controller::{ControllerId, PlaybackController};
use std::sync::{Arc, Weak};

/// Non-owning reference from a view to the controller it displays.
#[derive(Debug, Default, Clone)]
pub struct ControllerBinding {
    controller: Option<Weak<PlaybackController>>,
}

impl ControllerBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display `controller`, replacing any previous binding.
    pub fn bind(&mut self, controller: &Arc<PlaybackController>) {
        self.controller = Some(Arc::downgrade(controller));
    }

    pub fn unbind(&mut self) {
        self.controller = None;
    }

    /// The bound controller, if it is still alive and has not been released.
    pub fn controller(&self) -> Option<Arc<PlaybackController>> {
        self.controller
            .as_ref()
            .and_then(Weak::upgrade)
            .filter(|controller| !controller.is_released())
    }

    pub fn controller_id(&self) -> Option<ControllerId> {
        self.controller().map(|controller| controller.id())
    }

    pub fn is_bound_to(&self, controller: &Arc<PlaybackController>) -> bool {
        self.controller
            .as_ref()
            .is_some_and(|bound| std::ptr::eq(bound.as_ptr(), Arc::as_ptr(controller)))
    }
}
