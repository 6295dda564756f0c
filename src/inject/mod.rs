//! # Injection Machinery
//!
//! Attaching to and detaching from a live server.
//!
//! ## Components
//! - **Interceptor**: the accept-handling stage and per-connection
//!   initializer, including late-bind catch-up
//! - **Lifecycle**: the `inject()` / `uninject()` / `is_bound()`
//!   administrative surface

pub mod interceptor;
pub mod lifecycle;

pub use interceptor::{AcceptInterceptor, AttachState, ConnectionInitializer};
pub use lifecycle::ChannelInjector;
