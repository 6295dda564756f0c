//! Login notification boundary.
//!
//! The interceptor emits exactly one event per completed login, carrying
//! the resolved identity and the host's raw player-level object. What
//! happens with it afterwards is the event subsystem's business, behind the
//! [`EventSink`] trait.

use crate::protocol::context::Identity;
use std::any::Any;
use std::sync::Arc;

/// The host's raw player-level object; opaque to the interceptor.
pub type PlayerHandle = Arc<dyn Any + Send + Sync>;

/// Fired once per connection when its login completes.
#[derive(Clone)]
pub struct LoginEvent {
    pub identity: Identity,
    pub player: PlayerHandle,
}

impl std::fmt::Debug for LoginEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginEvent")
            .field("identity", &self.identity)
            .finish()
    }
}

/// Consumer of login notifications.
pub trait EventSink: Send + Sync {
    /// Called synchronously on the thread completing the login.
    fn on_login(&self, event: LoginEvent);
}

/// Sink for hosts that do not consume login notifications.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn on_login(&self, _event: LoginEvent) {}
}
