//! # Error Types
//!
//! Comprehensive error handling for the interceptor.
//!
//! This module defines all error variants that can occur while attaching to a
//! running server, from discovery failures to per-connection injection
//! problems and codec violations.
//!
//! ## Error Categories
//! - **Discovery Errors**: the host's listening-channel structures cannot be located
//! - **Injection Errors**: pipeline stage installation/removal failures
//! - **Codec Errors**: malformed frames, oversized frames, phase violations
//! - **Configuration Errors**: invalid or unreadable configuration
//!
//! All errors implement `std::error::Error` for interoperability.
//!
//! ## Propagation Policy
//! Failures scoped to a single connection never abort a broader `inject()` or
//! `uninject()` call; they are logged and the remaining connections are still
//! processed. Failures to discover the listening-channel structure at all are
//! fatal to that one `inject()` call and leave the system detached and
//! retryable.

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common error cases.
pub mod constants {
    /// Discovery errors
    pub const ERR_NOT_BOUND: &str = "No listening channel discoverable; server not bound yet";
    pub const ERR_ALREADY_INJECTED: &str = "inject() called twice without an intervening uninject()";

    /// Pipeline errors
    pub const ERR_ANCHOR_MISSING: &str = "Anchor stage disappeared between lookup and insertion";
    pub const ERR_STAGE_NOT_FOUND: &str = "Pipeline stage not found";
    pub const ERR_DUPLICATE_STAGE: &str = "Pipeline stage name already present";

    /// Codec errors
    pub const ERR_OVERSIZED_FRAME: &str = "Frame exceeds maximum size";
    pub const ERR_TRUNCATED_VARINT: &str = "VarInt runs past end of buffer";
    pub const ERR_VARINT_TOO_LONG: &str = "VarInt wider than 32 bits";

    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_CODEC_MISSING: &str = "Connection has no interceptor codec installed";
    pub const ERR_IDENTITY_REBOUND: &str = "Identity already bound for this connection";
}

/// Primary error type for all interceptor operations.
#[derive(Error, Debug)]
pub enum InterceptError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The host's listening-channel collection could not be located.
    /// `inject()` retains no partial state after this; retry once the
    /// server has bound.
    #[error("Server not bound: no listening channel discoverable")]
    BindNotFound,

    /// `inject()` was called again without an intervening `uninject()`.
    #[error("Already injected; call uninject() first")]
    AlreadyInjected,

    /// Late-bind catch-up failed for one specific connection. Recovered
    /// locally by the caller; never aborts the surrounding operation.
    #[error("Injection failed for connection {addr}: {reason}")]
    PerConnectionInjection { addr: String, reason: String },

    #[error("Pipeline stage not found: {0}")]
    StageNotFound(String),

    #[error("Pipeline stage already present: {0}")]
    DuplicateStage(String),

    /// The channel is tearing down; its pipeline no longer accepts stages.
    #[error("Pipeline sealed; channel tearing down")]
    PipelineSealed,

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// A frame arrived that is illegal in the connection's current phase.
    #[error("Protocol phase violation: {0}")]
    PhaseViolation(String),

    /// Identity may be bound exactly once per connection.
    #[error("Identity already bound for this connection")]
    IdentityRebound,

    #[error("Packet table error: {0}")]
    PacketTable(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

/// Type alias for Results using InterceptError
pub type Result<T> = std::result::Result<T, InterceptError>;
