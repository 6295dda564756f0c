//! The inject / uninject lifecycle.
//!
//! [`ChannelInjector`] ties the pieces together: it discovers the host's
//! listening-channel collection, wraps it so new listeners are instrumented
//! as they appear, runs late-bind catch-up over connections that predate
//! injection, and reverses the whole arrangement on uninject.
//!
//! Uninjection is deliberately asymmetric: it stops future connections from
//! being instrumented and detaches every listener, but codec stages already
//! installed on open connections stay in place until those connections close
//! naturally.

use crate::config::{InterceptorConfig, DECODER_NAME};
use crate::core::observable::{ObservableCollection, SharedCollection};
use crate::core::positioner::PipelinePositioner;
use crate::core::registry::ConnectionRegistry;
use crate::error::{InterceptError, Result};
use crate::event::{EventSink, LoginEvent, PlayerHandle};
use crate::host::channel::{ConnectionChannel, ListenerChannel};
use crate::host::ServerAccess;
use crate::inject::interceptor::{AcceptInterceptor, ConnectionInitializer};
use crate::protocol::codec::InterceptDecoder;
use crate::protocol::context::{ConnectionContext, Identity};
use crate::protocol::packet::PacketTable;
use crate::utils::metrics::Metrics;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

struct InjectorState {
    injected: bool,
    /// Collection located by `is_bound()`, reused by the next `inject()`.
    discovered: Option<SharedCollection<ListenerChannel>>,
    /// What the host held before injection; restored on uninject.
    original: Option<SharedCollection<ListenerChannel>>,
    /// The wrapper this injector installed, for the still-ours check.
    wrapper: Option<SharedCollection<ListenerChannel>>,
}

/// Administrative surface of the interceptor.
pub struct ChannelInjector {
    server: Arc<dyn ServerAccess>,
    table: Arc<dyn PacketTable>,
    events: Arc<dyn EventSink>,
    config: InterceptorConfig,
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<Metrics>,
    state: Mutex<InjectorState>,
}

impl ChannelInjector {
    pub fn new(
        server: Arc<dyn ServerAccess>,
        table: Arc<dyn PacketTable>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self::with_config(server, table, events, InterceptorConfig::default())
    }

    pub fn with_config(
        server: Arc<dyn ServerAccess>,
        table: Arc<dyn PacketTable>,
        events: Arc<dyn EventSink>,
        config: InterceptorConfig,
    ) -> Self {
        Self {
            server,
            table,
            events,
            config,
            registry: Arc::new(ConnectionRegistry::new()),
            metrics: Arc::new(Metrics::new()),
            state: Mutex::new(InjectorState {
                injected: false,
                discovered: None,
                original: None,
                wrapper: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InjectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Whether the server has a discoverable listening channel.
    ///
    /// Read-only apart from caching the discovered collection handle for
    /// reuse by `inject()`.
    pub fn is_bound(&self) -> bool {
        let mut state = self.lock();
        if state.discovered.is_none() {
            state.discovered = self.server.listening_channels();
        }
        state.discovered.is_some()
    }

    /// Attach to the server.
    ///
    /// Wraps the listening-channel collection (instrumenting every listener
    /// already present and every one bound later), then catches up over
    /// connections that were open before this call. Fails with
    /// [`InterceptError::BindNotFound`] when no listening channel can be
    /// located, retaining no partial state.
    pub fn inject(&self) -> Result<()> {
        let mut state = self.lock();
        if state.injected {
            return Err(InterceptError::AlreadyInjected);
        }

        let collection = match state
            .discovered
            .take()
            .or_else(|| self.server.listening_channels())
        {
            Some(collection) => collection,
            None => {
                warn!("inject() failed: server has no listening channel yet");
                return Err(InterceptError::BindNotFound);
            }
        };

        let positioner = PipelinePositioner::from_config(&self.config);
        let initializer = Arc::new(ConnectionInitializer::new(
            self.table.clone(),
            self.registry.clone(),
            positioner.clone(),
            self.config.max_frame_size,
            self.metrics.clone(),
        ));

        // Fires on the appending thread: for elements replayed during
        // wrapping that is this thread, afterwards the host's bind path.
        let callback = {
            let initializer = initializer.clone();
            let positioner = positioner.clone();
            let registry = self.registry.clone();
            let server = self.server.clone();
            let close_duplicates = self.config.close_duplicate_connections;
            move |listener: &ListenerChannel| {
                let interceptor = AcceptInterceptor::new(initializer.clone());
                let others: Vec<ListenerChannel> = registry
                    .listeners()
                    .into_iter()
                    .map(|(l, _)| l)
                    .collect();
                let open = server.open_connections();
                match interceptor.attach(listener, &positioner, &others, &open, close_duplicates)
                {
                    Ok(()) => registry.add_listener(listener, interceptor),
                    Err(e) => {
                        error!(
                            listener = %listener.id(),
                            addr = %listener.local_addr(),
                            error = %e,
                            "Failed to instrument listening channel"
                        );
                    }
                }
            }
        };

        let wrapper: SharedCollection<ListenerChannel> =
            ObservableCollection::wrap(collection.clone(), callback);
        self.server.install_listening_channels(wrapper.clone());
        state.original = Some(collection);
        state.wrapper = Some(wrapper);

        if self.config.catch_up_existing {
            let open = self.server.open_connections();
            if !open.is_empty() {
                debug!(
                    connections = open.len(),
                    "Late bind catch-up over existing connections"
                );
            }
            initializer.catch_up(&open);
        }

        state.injected = true;
        info!(
            listeners = self.registry.listener_count(),
            connections = self.registry.context_count(),
            "Injection complete"
        );
        Ok(())
    }

    /// Detach from the server.
    ///
    /// Removes the accept stage from every registered listener, clears the
    /// registry, and restores the original collection if the host slot
    /// still holds this injector's wrapper. Codec stages on already-open
    /// connections are left in place.
    pub fn uninject(&self) -> Result<()> {
        let mut state = self.lock();

        for (listener, interceptor) in self.registry.drain() {
            interceptor.detach(&listener);
        }

        if let (Some(wrapper), Some(original)) = (state.wrapper.take(), state.original.take()) {
            match self.server.listening_channels() {
                Some(current) if Arc::ptr_eq(&current, &wrapper) => {
                    self.server.install_listening_channels(original);
                    debug!("Restored original listening-channel collection");
                }
                _ => {
                    debug!("Listening-channel collection replaced since inject; leaving as-is");
                }
            }
        }

        state.injected = false;
        state.discovered = None;
        info!("Uninjection complete");
        Ok(())
    }

    /// Complete a connection's login: bind `identity` exactly once, enter
    /// the play phase, and fire one login event carrying the identity and
    /// the host's raw player object.
    pub fn update_connection_identity(
        &self,
        conn: &ConnectionChannel,
        identity: Identity,
        player: PlayerHandle,
    ) -> Result<()> {
        let context = self.context_of(conn)?;
        context.complete_login(identity.clone())?;
        self.metrics.login_completed();
        self.events.on_login(LoginEvent { identity, player });
        Ok(())
    }

    /// Profile enrichment for an already-bound identity, valid immediately
    /// after login completion.
    pub fn update_connection_profile(
        &self,
        conn: &ConnectionChannel,
        name: impl Into<String>,
        unique_id: Uuid,
    ) -> Result<()> {
        let context = self.context_of(conn)?;
        let identity = context
            .identity()
            .ok_or_else(|| InterceptError::Custom("no identity bound yet".into()))?;
        identity.set_name(name);
        identity.set_unique_id(unique_id);
        Ok(())
    }

    /// The shared state cell of an instrumented connection, resolved
    /// through its pipeline.
    fn context_of(&self, conn: &ConnectionChannel) -> Result<Arc<ConnectionContext>> {
        let stage = conn
            .pipeline()
            .get(DECODER_NAME)
            .ok_or_else(|| InterceptError::StageNotFound(DECODER_NAME.to_string()))?;
        let decoder = stage
            .as_any()
            .downcast_ref::<InterceptDecoder>()
            .ok_or_else(|| {
                InterceptError::Custom("foreign stage registered under the decoder name".into())
            })?;
        Ok(decoder.context())
    }
}

impl std::fmt::Debug for ChannelInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelInjector")
            .field("injected", &self.lock().injected)
            .field("registry", &self.registry)
            .finish()
    }
}
