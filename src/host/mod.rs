//! # Host Server Interface
//!
//! The seam between the interceptor and the server process it attaches to.
//!
//! The interceptor never locates server internals by introspection; the host
//! (or an integration shim for it) implements [`ServerAccess`] and hands over
//! typed accessors for exactly the structures the interceptor needs: the
//! listening-channel collection, the set of already-open connections, and
//! each channel's stage pipeline.
//!
//! ## Components
//! - **ServerAccess**: the injected host dependency
//! - **ListenerChannel / ConnectionChannel**: cheap-clone channel handles
//! - **Pipeline / Stage**: ordered named handler chains

pub mod channel;
pub mod pipeline;

pub use channel::{ChannelId, ConnectionChannel, ListenerChannel};
pub use pipeline::{Pipeline, Stage, StageRef};

use crate::core::observable::SharedCollection;

/// Typed access to the host server's connection-acceptance structures.
///
/// The listening-channel slot is shared-mutable: the host appends newly
/// bound listeners from its own threads, concurrently with administrative
/// reads through this trait. Implementations must make
/// [`install_listening_channels`](ServerAccess::install_listening_channels)
/// atomic with respect to those appends (a swap of one shared handle).
pub trait ServerAccess: Send + Sync {
    /// The server's listening-channel collection, or `None` if the server
    /// has not bound a socket yet.
    fn listening_channels(&self) -> Option<SharedCollection<ListenerChannel>>;

    /// Replace the listening-channel collection handle. Used to install the
    /// observing wrapper on inject and to restore the original on uninject.
    fn install_listening_channels(&self, collection: SharedCollection<ListenerChannel>);

    /// Connections the server has accepted and still tracks.
    fn open_connections(&self) -> Vec<ConnectionChannel>;
}
