//! Decoded frames and the packet-table collaborator boundary.
//!
//! The interceptor recognizes just enough structure to run its state
//! machine: the handshake (with its declared intent) and login success.
//! Everything else flows through as an opaque id + body pair; mapping those
//! to a full message catalog belongs to the packet-table collaborator, not
//! to this crate.

use crate::error::Result;
use crate::protocol::context::Identity;
use crate::protocol::phase::{Direction, HandshakeIntent, ProtocolPhase};
use bytes::{Bytes, BytesMut};
use uuid::Uuid;

/// One discrete protocol message, as seen by downstream consumers.
///
/// Each frame is stamped with the phase the connection was in when the
/// frame was decoded and carries the connection's identity binding (if any),
/// so "who sent this" needs no separate lookup.
#[derive(Debug, Clone)]
pub struct Frame {
    pub phase: ProtocolPhase,
    pub direction: Direction,
    pub payload: PacketPayload,
    pub identity: Option<Identity>,
}

/// Structured payloads the interception core understands.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketPayload {
    /// The opening frame of every connection; declares where the
    /// conversation goes next.
    Handshake {
        protocol_version: i32,
        server_address: String,
        server_port: u16,
        intent: HandshakeIntent,
    },
    /// Authentication finished; carries the resolved profile.
    LoginSuccess { name: String, unique_id: Uuid },
    /// Any message the core does not interpret.
    Opaque { id: i32, body: Bytes },
}

impl PacketPayload {
    /// The numeric id this payload travels under, when known to the core.
    pub fn known_id(&self) -> Option<i32> {
        match self {
            PacketPayload::Opaque { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Collaborator contract: structured (de)serialization of frame bodies.
///
/// `decode` receives the packet id already read off the frame and the
/// remaining body bytes; `encode` writes the payload's fields into `dst` and
/// returns the id the frame should travel under. Both are keyed by phase and
/// direction because id spaces differ per phase.
pub trait PacketTable: Send + Sync {
    fn decode(
        &self,
        phase: ProtocolPhase,
        direction: Direction,
        id: i32,
        body: &mut BytesMut,
    ) -> Result<PacketPayload>;

    fn encode(
        &self,
        phase: ProtocolPhase,
        direction: Direction,
        payload: &PacketPayload,
        dst: &mut BytesMut,
    ) -> Result<i32>;
}
