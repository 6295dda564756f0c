//! Registry of instrumented channels.
//!
//! Tracks which listening channels currently carry the accept interceptor
//! and which connections have codec stages installed. The server's accept
//! loop adds entries concurrently with administrative inject/uninject calls,
//! so all membership state sits behind one coarse mutex held only for the
//! duration of a mutation or a snapshot copy, never across a call into
//! host or stage code.

use crate::host::channel::{ChannelId, ListenerChannel};
use crate::inject::interceptor::AcceptInterceptor;
use crate::protocol::context::ConnectionContext;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

struct RegistryState {
    listeners: Vec<(ListenerChannel, Arc<AcceptInterceptor>)>,
    contexts: HashMap<ChannelId, Arc<ConnectionContext>>,
}

/// Shared bookkeeping for everything the interceptor has touched.
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                listeners: Vec::new(),
                contexts: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an instrumented listening channel. Idempotent.
    pub fn add_listener(&self, listener: &ListenerChannel, interceptor: Arc<AcceptInterceptor>) {
        let mut state = self.lock();
        if state.listeners.iter().any(|(l, _)| l.id() == listener.id()) {
            return;
        }
        debug!(listener = %listener.id(), addr = %listener.local_addr(), "Listener registered");
        state.listeners.push((listener.clone(), interceptor));
    }

    /// Drop a listening channel from the registry. Idempotent.
    pub fn remove_listener(&self, id: ChannelId) {
        self.lock().listeners.retain(|(l, _)| l.id() != id);
    }

    /// Snapshot the instrumented listeners and their interceptors.
    ///
    /// Listening channels that have closed since registration are pruned
    /// here rather than kept as dead entries.
    pub fn listeners(&self) -> Vec<(ListenerChannel, Arc<AcceptInterceptor>)> {
        let mut state = self.lock();
        state.listeners.retain(|(l, _)| l.is_open());
        state.listeners.clone()
    }

    /// Whether at least one listening channel has been located.
    pub fn is_bound(&self) -> bool {
        !self.lock().listeners.is_empty()
    }

    /// Record the codec context installed on a connection. Idempotent per
    /// connection; a re-injected connection replaces its old entry.
    pub fn add_context(&self, id: ChannelId, context: Arc<ConnectionContext>) {
        self.lock().contexts.insert(id, context);
    }

    /// Drop a connection's context entry. Idempotent.
    pub fn remove_context(&self, id: ChannelId) {
        self.lock().contexts.remove(&id);
    }

    /// Look up the codec context tracked for a connection.
    pub fn context_for(&self, id: ChannelId) -> Option<Arc<ConnectionContext>> {
        self.lock().contexts.get(&id).cloned()
    }

    /// Snapshot all tracked connection contexts.
    pub fn contexts(&self) -> Vec<(ChannelId, Arc<ConnectionContext>)> {
        self.lock()
            .contexts
            .iter()
            .map(|(id, ctx)| (*id, ctx.clone()))
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn context_count(&self) -> usize {
        self.lock().contexts.len()
    }

    /// Remove and return every registered listener, clearing connection
    /// bookkeeping with them.
    pub fn drain(&self) -> Vec<(ListenerChannel, Arc<AcceptInterceptor>)> {
        let mut state = self.lock();
        state.contexts.clear();
        std::mem::take(&mut state.listeners)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ConnectionRegistry")
            .field("listeners", &state.listeners.len())
            .field("contexts", &state.contexts.len())
            .finish()
    }
}
