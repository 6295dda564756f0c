//! # Protocol State & Codec
//!
//! Per-connection protocol machinery: phases, identity binding, frame
//! boundaries, and the decoder/encoder stage pair.
//!
//! ## Components
//! - **Phase**: the forward-only connection phase machine
//! - **Context**: the single shared phase + identity cell per connection
//! - **Framing**: VarInt length-prefixed frame split/emit
//! - **Packet**: decoded frames and the packet-table collaborator trait
//! - **Codec**: tokio codec stages installed into connection pipelines
//!
//! ## Wire Format
//! ```text
//! [Length(VarInt)] [PacketId(VarInt)] [Body(N)]
//! ```

pub mod codec;
pub mod context;
pub mod framing;
pub mod packet;
pub mod phase;

pub use codec::{InterceptDecoder, InterceptEncoder};
pub use context::{ConnectionContext, Identity, Profile};
pub use packet::{Frame, PacketPayload, PacketTable};
pub use phase::{Direction, HandshakeIntent, ProtocolPhase};
