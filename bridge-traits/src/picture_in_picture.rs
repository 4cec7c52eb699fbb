//! Picture-in-picture delegate supplied by the host application.

use crate::platform::PlatformSendSync;
use futures::channel::oneshot;

/// Host-side hooks for picture-in-picture.
///
/// Restoration is required; the start/stop notifications are optional and
/// default to no-ops.
pub trait PictureInPictureDelegate: PlatformSendSync {
    /// Called when picture in picture might need user interface restoration.
    /// Return `true` if this is the case, most notably when the player view
    /// from which picture in picture was initiated is not visible anymore.
    ///
    /// Must answer quickly; it is called on the stop path.
    fn should_restore_user_interface(&self) -> bool;

    /// Called when a restoration process takes place.
    ///
    /// `completion` MUST be completed at the very end of the restoration
    /// (e.g. after a modal presentation animation), with `true` iff the
    /// restoration succeeded. Dropping it without completing it is a broken
    /// integration and leaves the stop sequence unspecified.
    fn restore_user_interface(&self, completion: RestorationCompletion);

    /// Called when picture in picture has started.
    fn did_start_picture_in_picture(&self) {}

    /// Called when picture in picture has stopped.
    fn did_stop_picture_in_picture(&self) {}
}

/// One-shot completion signal handed to
/// [`PictureInPictureDelegate::restore_user_interface`].
#[derive(Debug)]
pub struct RestorationCompletion {
    sender: oneshot::Sender<bool>,
}

/// Receiving half awaited by the picture-in-picture session.
pub type RestorationReceiver = oneshot::Receiver<bool>;

impl RestorationCompletion {
    /// Create a completion and the receiver that observes it.
    pub fn pair() -> (Self, RestorationReceiver) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    /// Signal the end of the restoration.
    pub fn complete(self, restored: bool) {
        // The session may have been torn down in the meantime.
        let _ = self.sender.send(restored);
    }
}
