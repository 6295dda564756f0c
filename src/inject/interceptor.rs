//! Accept interception and per-connection initialization.
//!
//! One [`AcceptInterceptor`] is installed on each instrumented listening
//! channel. It fires once per newly accepted connection and hands the
//! connection to the [`ConnectionInitializer`], which installs the codec
//! stage pair and seeds the protocol state. The initializer is also the
//! engine behind late-bind catch-up over connections that were already open
//! when injection happened.

use crate::config::{CONNECTION_HANDLER_NAME, DECODER_NAME, ENCODER_NAME};
use crate::core::positioner::PipelinePositioner;
use crate::core::registry::ConnectionRegistry;
use crate::error::{InterceptError, Result};
use crate::host::channel::{ConnectionChannel, ListenerChannel};
use crate::host::pipeline::Stage;
use crate::protocol::codec::{InterceptDecoder, InterceptEncoder};
use crate::protocol::context::ConnectionContext;
use crate::protocol::packet::PacketTable;
use crate::protocol::phase::ProtocolPhase;
use crate::utils::metrics::Metrics;
use std::any::Any;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Attach lifecycle of one listening channel's interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachState {
    NotAttached,
    Attached,
    /// Terminal; a detached interceptor is never reused.
    Detached,
}

const STATE_NOT_ATTACHED: u8 = 0;
const STATE_ATTACHED: u8 = 1;
const STATE_DETACHED: u8 = 2;

/// Installs the codec stage pair on individual connections.
pub struct ConnectionInitializer {
    table: Arc<dyn PacketTable>,
    registry: Arc<ConnectionRegistry>,
    positioner: PipelinePositioner,
    max_frame_size: usize,
    metrics: Arc<Metrics>,
}

impl ConnectionInitializer {
    pub fn new(
        table: Arc<dyn PacketTable>,
        registry: Arc<ConnectionRegistry>,
        positioner: PipelinePositioner,
        max_frame_size: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            table,
            registry,
            positioner,
            max_frame_size,
            metrics,
        }
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Install the decoder/encoder pair on `conn`, starting its protocol
    /// state in `phase`. Returns the shared context cell.
    ///
    /// Stale interceptor stages left from an earlier injection are removed
    /// first, so initialization is safe to re-run.
    pub fn init_connection(
        &self,
        conn: &ConnectionChannel,
        phase: ProtocolPhase,
    ) -> Result<Arc<ConnectionContext>> {
        let pipeline = conn.pipeline();

        let had_decoder = pipeline.remove(DECODER_NAME).is_some();
        let had_encoder = pipeline.remove(ENCODER_NAME).is_some();
        if had_decoder || had_encoder {
            debug!(conn = %conn.id(), "Removed stale codec stages before reinjection");
        }

        let context = Arc::new(ConnectionContext::new(phase));
        let decoder = Arc::new(InterceptDecoder::new(
            context.clone(),
            self.table.clone(),
            self.max_frame_size,
            self.metrics.clone(),
        ));
        let encoder = Arc::new(InterceptEncoder::new(
            context.clone(),
            self.table.clone(),
            self.max_frame_size,
            self.metrics.clone(),
        ));

        self.positioner.install(pipeline, DECODER_NAME, decoder)?;
        self.positioner.install(pipeline, ENCODER_NAME, encoder)?;

        self.registry.add_context(conn.id(), context.clone());
        self.metrics.connection_intercepted();
        debug!(conn = %conn.id(), peer = %conn.peer_addr(), phase = %phase, "Connection instrumented");
        Ok(context)
    }

    /// Late-bind catch-up: instrument connections that were already open
    /// before injection. Pre-existing connections are past login, so their
    /// state starts in the play phase.
    ///
    /// Connections are processed sequentially and failures recovered one at
    /// a time; a failure on one connection never prevents injection into
    /// the others. Returns the number successfully instrumented.
    pub fn catch_up(&self, connections: &[ConnectionChannel]) -> usize {
        let mut injected = 0;
        for conn in connections {
            if !conn.is_open() {
                debug!(conn = %conn.id(), "Skipping closed connection during catch-up");
                continue;
            }
            match self.init_connection(conn, ProtocolPhase::Play) {
                Ok(_) => {
                    self.metrics.connection_caught_up();
                    injected += 1;
                }
                Err(e) => {
                    self.metrics.injection_failure();
                    error!(
                        conn = %conn.id(),
                        peer = %conn.peer_addr(),
                        error = %e,
                        "Failed to inject into existing connection"
                    );
                }
            }
        }
        injected
    }
}

/// The accept-handling stage installed on a listening channel.
///
/// Fires once per newly accepted connection while attached. Created fresh
/// for each listener on each injection; never reattached after detach.
pub struct AcceptInterceptor {
    state: AtomicU8,
    initializer: Arc<ConnectionInitializer>,
}

impl AcceptInterceptor {
    pub fn new(initializer: Arc<ConnectionInitializer>) -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(STATE_NOT_ATTACHED),
            initializer,
        })
    }

    pub fn state(&self) -> AttachState {
        match self.state.load(Ordering::Acquire) {
            STATE_ATTACHED => AttachState::Attached,
            STATE_DETACHED => AttachState::Detached,
            _ => AttachState::NotAttached,
        }
    }

    /// Install this interceptor on `listener`'s pipeline.
    ///
    /// If another known listener shares `listener`'s local address, any
    /// already-open connection on that address belongs to the stale
    /// duplicate and is closed, so it cannot keep carrying traffic after
    /// instrumentation has moved to the new listening channel.
    pub fn attach(
        self: &Arc<Self>,
        listener: &ListenerChannel,
        positioner: &PipelinePositioner,
        other_listeners: &[ListenerChannel],
        open_connections: &[ConnectionChannel],
        close_duplicates: bool,
    ) -> Result<()> {
        self.state
            .compare_exchange(
                STATE_NOT_ATTACHED,
                STATE_ATTACHED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| {
                InterceptError::Custom("interceptor already attached or detached".into())
            })?;

        positioner.install(listener.pipeline(), CONNECTION_HANDLER_NAME, self.clone())?;
        self.initializer.metrics().listener_instrumented();
        debug!(listener = %listener.id(), addr = %listener.local_addr(), "Listener instrumented");

        let has_duplicate = other_listeners
            .iter()
            .any(|l| l.id() != listener.id() && l.local_addr() == listener.local_addr());
        if close_duplicates && has_duplicate {
            for conn in open_connections {
                if conn.is_open() && conn.local_addr() == listener.local_addr() {
                    warn!(
                        conn = %conn.id(),
                        addr = %conn.local_addr(),
                        "Closing connection accepted by stale duplicate listener"
                    );
                    conn.close();
                    self.initializer.metrics().duplicate_closed();
                }
            }
        }

        Ok(())
    }

    /// Remove this interceptor from `listener`'s pipeline. Terminal.
    pub fn detach(&self, listener: &ListenerChannel) {
        if listener.pipeline().remove(CONNECTION_HANDLER_NAME).is_none() {
            warn!(
                listener = %listener.id(),
                "Failed to uninject listening channel, stage not found"
            );
        }
        self.state.store(STATE_DETACHED, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Arc<Self> {
        use crate::config::MAX_FRAME_SIZE;

        struct EchoTable;

        impl PacketTable for EchoTable {
            fn decode(
                &self,
                _phase: ProtocolPhase,
                _direction: crate::protocol::phase::Direction,
                id: i32,
                body: &mut bytes::BytesMut,
            ) -> Result<crate::protocol::packet::PacketPayload> {
                Ok(crate::protocol::packet::PacketPayload::Opaque {
                    id,
                    body: body.split().freeze(),
                })
            }

            fn encode(
                &self,
                _phase: ProtocolPhase,
                _direction: crate::protocol::phase::Direction,
                payload: &crate::protocol::packet::PacketPayload,
                dst: &mut bytes::BytesMut,
            ) -> Result<i32> {
                match payload {
                    crate::protocol::packet::PacketPayload::Opaque { id, body } => {
                        dst.extend_from_slice(body);
                        Ok(*id)
                    }
                    _ => Ok(0),
                }
            }
        }

        let initializer = Arc::new(ConnectionInitializer::new(
            Arc::new(EchoTable),
            Arc::new(ConnectionRegistry::new()),
            PipelinePositioner::new(Vec::new()),
            MAX_FRAME_SIZE,
            Arc::new(Metrics::new()),
        ));
        Self::new(initializer)
    }
}

impl Stage for AcceptInterceptor {
    fn on_accept(&self, conn: &ConnectionChannel) {
        if self.state() != AttachState::Attached {
            // Accept raced with uninject; leave the connection untouched.
            debug!(conn = %conn.id(), "Accept after detach, skipping instrumentation");
            return;
        }
        if let Err(e) = self.initializer.init_connection(conn, ProtocolPhase::Handshake) {
            self.initializer.metrics().injection_failure();
            error!(conn = %conn.id(), error = %e, "Failed to instrument accepted connection");
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::PacketPayload;
    use crate::protocol::phase::Direction;
    use bytes::BytesMut;

    fn addr(port: u16) -> std::net::SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    struct OpaqueTable;

    impl PacketTable for OpaqueTable {
        fn decode(
            &self,
            _phase: ProtocolPhase,
            _direction: Direction,
            id: i32,
            body: &mut BytesMut,
        ) -> Result<PacketPayload> {
            Ok(PacketPayload::Opaque {
                id,
                body: body.split().freeze(),
            })
        }

        fn encode(
            &self,
            _phase: ProtocolPhase,
            _direction: Direction,
            payload: &PacketPayload,
            dst: &mut BytesMut,
        ) -> Result<i32> {
            match payload {
                PacketPayload::Opaque { id, body } => {
                    dst.extend_from_slice(body);
                    Ok(*id)
                }
                _ => Ok(0),
            }
        }
    }

    fn initializer() -> (Arc<ConnectionInitializer>, Arc<ConnectionRegistry>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let init = Arc::new(ConnectionInitializer::new(
            Arc::new(OpaqueTable),
            registry.clone(),
            PipelinePositioner::new(Vec::new()),
            crate::config::MAX_FRAME_SIZE,
            Arc::new(Metrics::new()),
        ));
        (init, registry)
    }

    #[test]
    fn init_installs_codec_pair_and_context() {
        let (init, registry) = initializer();
        let conn = ConnectionChannel::new(addr(25565), addr(50000));

        let ctx = init
            .init_connection(&conn, ProtocolPhase::Handshake)
            .unwrap();
        assert!(conn.pipeline().contains(DECODER_NAME));
        assert!(conn.pipeline().contains(ENCODER_NAME));
        assert_eq!(ctx.phase(), ProtocolPhase::Handshake);
        assert!(registry.context_for(conn.id()).is_some());
    }

    #[test]
    fn reinit_leaves_single_codec_pair() {
        let (init, _) = initializer();
        let conn = ConnectionChannel::new(addr(25565), addr(50000));

        init.init_connection(&conn, ProtocolPhase::Handshake)
            .unwrap();
        init.init_connection(&conn, ProtocolPhase::Handshake)
            .unwrap();

        let names = conn.pipeline().names();
        assert_eq!(
            names.iter().filter(|n| n.as_str() == DECODER_NAME).count(),
            1
        );
        assert_eq!(
            names.iter().filter(|n| n.as_str() == ENCODER_NAME).count(),
            1
        );
    }

    #[test]
    fn catch_up_starts_existing_connections_in_play() {
        let (init, registry) = initializer();
        let conns: Vec<_> = (0..3)
            .map(|i| ConnectionChannel::new(addr(25565), addr(50000 + i)))
            .collect();

        assert_eq!(init.catch_up(&conns), 3);
        for conn in &conns {
            let ctx = registry.context_for(conn.id()).unwrap();
            assert_eq!(ctx.phase(), ProtocolPhase::Play);
        }
    }

    #[test]
    fn catch_up_skips_closed_connections() {
        let (init, _) = initializer();
        let open = ConnectionChannel::new(addr(25565), addr(50000));
        let closed = ConnectionChannel::new(addr(25565), addr(50001));
        closed.close();

        assert_eq!(init.catch_up(&[closed.clone(), open.clone()]), 1);
        assert!(open.pipeline().contains(DECODER_NAME));
        assert!(!closed.pipeline().contains(DECODER_NAME));
    }

    #[test]
    fn accept_after_detach_is_skipped() {
        let (init, registry) = initializer();
        let interceptor = AcceptInterceptor::new(init);
        let listener = ListenerChannel::new(addr(25565));
        let positioner = PipelinePositioner::new(Vec::new());

        interceptor
            .attach(&listener, &positioner, &[], &[], true)
            .unwrap();
        interceptor.detach(&listener);

        let conn = ConnectionChannel::new(addr(25565), addr(50000));
        listener.accept(&conn);
        assert!(!conn.pipeline().contains(DECODER_NAME));
        assert_eq!(registry.context_count(), 0);
    }

    #[test]
    fn duplicate_address_connections_closed_on_attach() {
        let (init, _) = initializer();
        let interceptor = AcceptInterceptor::new(init);
        let positioner = PipelinePositioner::new(Vec::new());

        let stale = ListenerChannel::new(addr(25565));
        let fresh = ListenerChannel::new(addr(25565));
        let on_dup = ConnectionChannel::new(addr(25565), addr(50000));
        let elsewhere = ConnectionChannel::new(addr(25566), addr(50001));

        interceptor
            .attach(
                &fresh,
                &positioner,
                &[stale],
                &[on_dup.clone(), elsewhere.clone()],
                true,
            )
            .unwrap();

        assert!(!on_dup.is_open());
        assert!(elsewhere.is_open());
    }
}
