//! Per-connection codec stages.
//!
//! Each instrumented connection carries one decoder and one encoder stage.
//! The pair is created together and shares a single [`ConnectionContext`];
//! neither holds protocol state of its own, which is what lets the host
//! event loop drive them through `&mut` codec calls while administrative
//! threads read the same context through the pipeline.

use crate::error::{InterceptError, Result};
use crate::protocol::context::ConnectionContext;
use crate::protocol::framing;
use crate::protocol::packet::{Frame, PacketPayload, PacketTable};
use crate::protocol::phase::{Direction, ProtocolPhase};
use crate::utils::metrics::Metrics;
use bytes::BytesMut;
use std::any::Any;
use std::sync::Arc;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

/// Inbound half: splits serverbound bytes into frames and advances the
/// connection's phase machine.
#[derive(Clone)]
pub struct InterceptDecoder {
    context: Arc<ConnectionContext>,
    table: Arc<dyn PacketTable>,
    max_frame_size: usize,
    metrics: Arc<Metrics>,
}

impl InterceptDecoder {
    pub fn new(
        context: Arc<ConnectionContext>,
        table: Arc<dyn PacketTable>,
        max_frame_size: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            context,
            table,
            max_frame_size,
            metrics,
        }
    }

    /// The shared state cell for this connection.
    pub fn context(&self) -> Arc<ConnectionContext> {
        self.context.clone()
    }

    /// Decode one frame off the front of `src`, if a complete one is
    /// buffered.
    ///
    /// The emitted frame is stamped with the phase the connection was in
    /// when the frame arrived; a handshake frame's own transition applies
    /// after stamping.
    pub fn decode_frame(&self, src: &mut BytesMut) -> Result<Option<Frame>> {
        let Some(mut body) = framing::split_frame(src, self.max_frame_size)? else {
            return Ok(None);
        };
        let frame_len = body.len();

        let id = framing::read_varint(&mut body)?;
        let phase = self.context.phase();
        let payload = self
            .table
            .decode(phase, Direction::Serverbound, id, &mut body)?;

        if let PacketPayload::Handshake { intent, .. } = &payload {
            self.context.handle_handshake(*intent);
        }

        self.metrics.frame_decoded(frame_len as u64);
        trace!(phase = %phase, id, bytes = frame_len, "Frame decoded");

        Ok(Some(Frame {
            phase,
            direction: Direction::Serverbound,
            payload,
            identity: self.context.identity(),
        }))
    }
}

impl Decoder for InterceptDecoder {
    type Item = Frame;
    type Error = InterceptError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        self.decode_frame(src)
    }
}

impl crate::host::pipeline::Stage for InterceptDecoder {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Outbound half: serializes clientbound payloads into length-prefixed
/// frames.
#[derive(Clone)]
pub struct InterceptEncoder {
    context: Arc<ConnectionContext>,
    table: Arc<dyn PacketTable>,
    max_frame_size: usize,
    metrics: Arc<Metrics>,
}

impl InterceptEncoder {
    pub fn new(
        context: Arc<ConnectionContext>,
        table: Arc<dyn PacketTable>,
        max_frame_size: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            context,
            table,
            max_frame_size,
            metrics,
        }
    }

    /// The shared state cell for this connection.
    pub fn context(&self) -> Arc<ConnectionContext> {
        self.context.clone()
    }

    /// Serialize one payload into `dst`.
    ///
    /// Until the handshake has resolved the conversation into a concrete
    /// direction, bytes pass through untransformed: opaque bodies are
    /// written raw, and structured payloads are a phase violation.
    pub fn encode_frame(&self, payload: &PacketPayload, dst: &mut BytesMut) -> Result<()> {
        if self.context.phase() == ProtocolPhase::Handshake {
            return match payload {
                PacketPayload::Opaque { body, .. } => {
                    dst.extend_from_slice(body);
                    self.metrics.frame_encoded(body.len() as u64);
                    Ok(())
                }
                other => Err(InterceptError::PhaseViolation(format!(
                    "structured payload {other:?} before handshake resolution"
                ))),
            };
        }

        let mut body = BytesMut::new();
        let id = self
            .table
            .encode(self.context.phase(), Direction::Clientbound, payload, &mut body)?;

        let mut framed_body = BytesMut::with_capacity(framing::varint_len(id) + body.len());
        framing::write_varint(&mut framed_body, id);
        framed_body.extend_from_slice(&body);

        framing::emit_frame(dst, &framed_body, self.max_frame_size)?;
        self.metrics.frame_encoded(framed_body.len() as u64);
        trace!(phase = %self.context.phase(), id, bytes = framed_body.len(), "Frame encoded");
        Ok(())
    }
}

impl Encoder<Frame> for InterceptEncoder {
    type Error = InterceptError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        self.encode_frame(&frame.payload, dst)
    }
}

impl Encoder<PacketPayload> for InterceptEncoder {
    type Error = InterceptError;

    fn encode(&mut self, payload: PacketPayload, dst: &mut BytesMut) -> Result<()> {
        self.encode_frame(&payload, dst)
    }
}

impl crate::host::pipeline::Stage for InterceptEncoder {
    fn as_any(&self) -> &dyn Any {
        self
    }
}
