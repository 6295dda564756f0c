//! # Network Interceptor
//!
//! Runtime connection interception and protocol codec injection for live
//! servers.
//!
//! This crate attaches to a server process that is already accepting
//! traffic, observes every new connection as it is accepted, and inserts a
//! protocol codec stage pair into each connection's handler pipeline,
//! without the server's own code changing and reversibly while the server
//! keeps serving.
//!
//! ## How it fits together
//! - The host implements [`host::ServerAccess`], exposing its
//!   listening-channel collection, open connections, and per-channel
//!   pipelines.
//! - [`inject::ChannelInjector::inject`] wraps the listening-channel
//!   collection with [`crate::core::ObservableCollection`] so every
//!   listener, pre-existing or future, gets an accept interceptor, placed
//!   by [`crate::core::PipelinePositioner`] relative to known third-party
//!   stages.
//! - Each accepted connection receives an
//!   [`protocol::InterceptDecoder`] / [`protocol::InterceptEncoder`] pair
//!   sharing one [`protocol::ConnectionContext`]: the connection's phase
//!   and identity binding.
//! - Decoded [`protocol::Frame`]s flow to the packet-table and event
//!   collaborators; [`inject::ChannelInjector::uninject`] reverses the
//!   attachment for future connections while leaving live ones untouched.
//!
//! ## Example
//! ```ignore
//! use network_interceptor::inject::ChannelInjector;
//! use std::sync::Arc;
//!
//! let injector = ChannelInjector::new(server, packet_table, event_sink);
//! if injector.is_bound() {
//!     injector.inject()?;
//! }
//! // ... later ...
//! injector.uninject()?;
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod event;
pub mod host;
pub mod inject;
pub mod protocol;
pub mod utils;

pub use error::{InterceptError, Result};
pub use inject::ChannelInjector;
