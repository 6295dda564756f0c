//! Per-connection protocol state.
//!
//! One [`ConnectionContext`] exists per instrumented connection. The decoder
//! and encoder stages each hold an `Arc` clone of the same context, so there
//! is a single source of truth for the connection's phase and identity
//! binding, never duplicated and never copied.
//!
//! Only the connection's own event loop touches its context during normal
//! traffic, so transitions are already linearized by arrival order; the
//! internal locks exist for the administrative calls (login completion,
//! profile enrichment) that may come from another thread.

use crate::error::{InterceptError, Result};
use crate::protocol::phase::{HandshakeIntent, ProtocolPhase};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// Display name and unique id carried by an identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub name: Option<String>,
    pub unique_id: Option<Uuid>,
}

/// Handle to the authenticated principal bound to a connection.
///
/// Cheap to clone; clones share the profile. The profile's name and unique
/// id are settable through the narrow enrichment accessors at login
/// completion and are expected to be stable afterwards.
#[derive(Clone)]
pub struct Identity {
    profile: Arc<RwLock<Profile>>,
}

impl Identity {
    pub fn new() -> Self {
        Self {
            profile: Arc::new(RwLock::new(Profile::default())),
        }
    }

    pub fn with_profile(name: impl Into<String>, unique_id: Uuid) -> Self {
        Self {
            profile: Arc::new(RwLock::new(Profile {
                name: Some(name.into()),
                unique_id: Some(unique_id),
            })),
        }
    }

    pub fn profile(&self) -> Profile {
        self.profile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn name(&self) -> Option<String> {
        self.profile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .name
            .clone()
    }

    pub fn unique_id(&self) -> Option<Uuid> {
        self.profile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .unique_id
    }

    /// Profile enrichment: set the display name.
    pub fn set_name(&self, name: impl Into<String>) {
        self.profile
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .name = Some(name.into());
    }

    /// Profile enrichment: set the unique id.
    pub fn set_unique_id(&self, unique_id: Uuid) {
        self.profile
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unique_id = Some(unique_id);
    }

    /// Whether two handles refer to the same identity.
    pub fn same_as(&self, other: &Identity) -> bool {
        Arc::ptr_eq(&self.profile, &other.profile)
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let profile = self.profile();
        f.debug_struct("Identity")
            .field("name", &profile.name)
            .field("unique_id", &profile.unique_id)
            .finish()
    }
}

struct ContextState {
    phase: ProtocolPhase,
    identity: Option<Identity>,
}

/// The single phase + identity cell shared by a connection's decoder and
/// encoder.
pub struct ConnectionContext {
    state: Mutex<ContextState>,
}

impl ConnectionContext {
    pub fn new(initial: ProtocolPhase) -> Self {
        Self {
            state: Mutex::new(ContextState {
                phase: initial,
                identity: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> ProtocolPhase {
        self.lock().phase
    }

    /// The bound identity, once login has completed.
    pub fn identity(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    /// Advance to a later phase. Regressions are rejected; use
    /// [`handle_handshake`](Self::handle_handshake) for the explicit reset
    /// transition.
    pub fn advance(&self, next: ProtocolPhase) -> Result<()> {
        let mut state = self.lock();
        if !state.phase.can_advance_to(next) {
            return Err(InterceptError::PhaseViolation(format!(
                "cannot move from {} to {}",
                state.phase, next
            )));
        }
        debug!(from = %state.phase, to = %next, "Phase advanced");
        state.phase = next;
        Ok(())
    }

    /// Apply a handshake frame's declared intent.
    ///
    /// From `Handshake` this is the normal forward resolution into `Status`
    /// or `Login`. From any later phase it is the explicit reset transition
    /// a fresh handshake frame triggers.
    pub fn handle_handshake(&self, intent: HandshakeIntent) {
        let mut state = self.lock();
        if state.phase != ProtocolPhase::Handshake {
            warn!(from = %state.phase, "Handshake frame mid-stream; resetting connection state");
            state.identity = None;
        }
        debug!(intent = ?intent, "Handshake resolved");
        state.phase = intent.phase();
    }

    /// Login completion: bind the identity exactly once and enter `Play`.
    ///
    /// Fails with [`InterceptError::IdentityRebound`] if an identity is
    /// already bound; the existing binding is left untouched.
    pub fn complete_login(&self, identity: Identity) -> Result<()> {
        let mut state = self.lock();
        if state.identity.is_some() {
            return Err(InterceptError::IdentityRebound);
        }
        debug!(identity = ?identity, "Identity bound, entering play phase");
        state.identity = Some(identity);
        state.phase = ProtocolPhase::Play;
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ConnectionContext")
            .field("phase", &state.phase)
            .field("identity", &state.identity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unbound_in_given_phase() {
        let ctx = ConnectionContext::new(ProtocolPhase::Handshake);
        assert_eq!(ctx.phase(), ProtocolPhase::Handshake);
        assert!(ctx.identity().is_none());
    }

    #[test]
    fn handshake_resolves_intent() {
        let ctx = ConnectionContext::new(ProtocolPhase::Handshake);
        ctx.handle_handshake(HandshakeIntent::Status);
        assert_eq!(ctx.phase(), ProtocolPhase::Status);

        let ctx = ConnectionContext::new(ProtocolPhase::Handshake);
        ctx.handle_handshake(HandshakeIntent::Login);
        assert_eq!(ctx.phase(), ProtocolPhase::Login);
    }

    #[test]
    fn regression_rejected_outside_handshake_reset() {
        let ctx = ConnectionContext::new(ProtocolPhase::Play);
        assert!(matches!(
            ctx.advance(ProtocolPhase::Login),
            Err(InterceptError::PhaseViolation(_))
        ));
        assert_eq!(ctx.phase(), ProtocolPhase::Play);
    }

    #[test]
    fn handshake_reset_clears_identity() {
        let ctx = ConnectionContext::new(ProtocolPhase::Login);
        ctx.complete_login(Identity::new()).unwrap();
        assert!(ctx.identity().is_some());

        ctx.handle_handshake(HandshakeIntent::Login);
        assert_eq!(ctx.phase(), ProtocolPhase::Login);
        assert!(ctx.identity().is_none());
    }

    #[test]
    fn identity_binds_exactly_once() {
        let ctx = ConnectionContext::new(ProtocolPhase::Login);
        let first = Identity::with_profile("steve", Uuid::new_v4());
        ctx.complete_login(first.clone()).unwrap();
        assert_eq!(ctx.phase(), ProtocolPhase::Play);

        let err = ctx.complete_login(Identity::new());
        assert!(matches!(err, Err(InterceptError::IdentityRebound)));
        assert!(ctx.identity().unwrap().same_as(&first));
    }

    #[test]
    fn profile_enrichment_visible_through_clones() {
        let identity = Identity::new();
        let ctx = ConnectionContext::new(ProtocolPhase::Login);
        ctx.complete_login(identity.clone()).unwrap();

        let id = Uuid::new_v4();
        identity.set_name("alex");
        identity.set_unique_id(id);

        let bound = ctx.identity().unwrap();
        assert_eq!(bound.name().as_deref(), Some("alex"));
        assert_eq!(bound.unique_id(), Some(id));
    }

    #[test]
    fn configuration_path_is_legal() {
        let ctx = ConnectionContext::new(ProtocolPhase::Login);
        ctx.advance(ProtocolPhase::Configuration).unwrap();
        ctx.advance(ProtocolPhase::Play).unwrap();
        assert_eq!(ctx.phase(), ProtocolPhase::Play);
    }
}
