//! Listening and connection channel handles.
//!
//! Both channel kinds are cheap-clone handles (`Arc` inside) over shared
//! state: a local address, an open flag, and the channel's stage pipeline.
//! The host creates them at bind/accept time; the interceptor only ever
//! holds handles, never owns the underlying sockets.

use crate::host::pipeline::Pipeline;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique channel identifier, stable for the channel's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    fn next() -> Self {
        Self(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct ChannelState {
    id: ChannelId,
    local_addr: SocketAddr,
    open: AtomicBool,
    pipeline: Pipeline,
}

impl ChannelState {
    fn new(local_addr: SocketAddr) -> Self {
        Self {
            id: ChannelId::next(),
            local_addr,
            open: AtomicBool::new(true),
            pipeline: Pipeline::new(),
        }
    }
}

/// One bound server socket accepting new connections.
#[derive(Clone)]
pub struct ListenerChannel {
    inner: Arc<ChannelState>,
}

impl ListenerChannel {
    pub fn new(local_addr: SocketAddr) -> Self {
        Self {
            inner: Arc::new(ChannelState::new(local_addr)),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.inner.id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.inner.open.store(false, Ordering::Release);
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    /// Host entry point: deliver a newly accepted connection to this
    /// listener's accept stages. Runs on the caller's thread.
    pub fn accept(&self, conn: &ConnectionChannel) {
        self.inner.pipeline.fire_accept(conn);
    }
}

impl PartialEq for ListenerChannel {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ListenerChannel {}

impl std::fmt::Debug for ListenerChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerChannel")
            .field("id", &self.inner.id)
            .field("local_addr", &self.inner.local_addr)
            .field("open", &self.is_open())
            .finish()
    }
}

/// One accepted client socket and its processing pipeline.
#[derive(Clone)]
pub struct ConnectionChannel {
    inner: Arc<ChannelState>,
    peer_addr: SocketAddr,
}

impl ConnectionChannel {
    pub fn new(local_addr: SocketAddr, peer_addr: SocketAddr) -> Self {
        Self {
            inner: Arc::new(ChannelState::new(local_addr)),
            peer_addr,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.inner.id
    }

    /// The server-side address this connection was accepted on.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.inner.open.store(false, Ordering::Release);
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }
}

impl PartialEq for ConnectionChannel {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ConnectionChannel {}

impl std::fmt::Debug for ConnectionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionChannel")
            .field("id", &self.inner.id)
            .field("local_addr", &self.inner.local_addr)
            .field("peer_addr", &self.peer_addr)
            .field("open", &self.is_open())
            .finish()
    }
}
