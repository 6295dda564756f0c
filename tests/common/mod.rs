//! Shared fixtures for the integration suites: an in-memory host server, a
//! minimal packet table, and a recording event sink.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use bytes::{Buf, BufMut, BytesMut};
use network_interceptor::core::observable::{SharedCollection, VecCollection};
use network_interceptor::error::{InterceptError, Result};
use network_interceptor::event::{EventSink, LoginEvent};
use network_interceptor::host::{ConnectionChannel, ListenerChannel, ServerAccess};
use network_interceptor::protocol::framing;
use network_interceptor::protocol::packet::{PacketPayload, PacketTable};
use network_interceptor::protocol::phase::{Direction, HandshakeIntent, ProtocolPhase};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub fn addr(port: u16) -> SocketAddr {
    format!("127.0.0.1:{port}").parse().unwrap()
}

/// In-memory stand-in for the host server: a listening-channel collection
/// slot and a list of tracked connections.
pub struct TestServer {
    slot: Mutex<Option<SharedCollection<ListenerChannel>>>,
    connections: Mutex<Vec<ConnectionChannel>>,
}

impl TestServer {
    /// A server that has not bound any socket yet.
    pub fn unbound() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(None),
            connections: Mutex::new(Vec::new()),
        })
    }

    /// A server with an (empty) listening-channel collection in place.
    pub fn bound() -> Arc<Self> {
        let collection: SharedCollection<ListenerChannel> = Arc::new(VecCollection::new());
        Arc::new(Self {
            slot: Mutex::new(Some(collection)),
            connections: Mutex::new(Vec::new()),
        })
    }

    /// Bind a new listener and append it through the current collection
    /// handle, exactly as the host's bind path would.
    pub fn bind(&self, local: SocketAddr) -> ListenerChannel {
        let listener = ListenerChannel::new(local);
        self.push_listener(&listener);
        listener
    }

    /// Append an externally prepared listener (e.g. with a pre-populated
    /// pipeline) through the current collection handle.
    pub fn push_listener(&self, listener: &ListenerChannel) {
        let slot = self
            .slot
            .lock()
            .unwrap()
            .clone()
            .expect("server has no listening-channel collection");
        slot.push(listener.clone());
    }

    /// Accept a connection on `listener`: track it and fire the listener's
    /// accept stages, as the host's accept loop would.
    pub fn accept(&self, listener: &ListenerChannel, peer: SocketAddr) -> ConnectionChannel {
        let conn = ConnectionChannel::new(listener.local_addr(), peer);
        self.connections.lock().unwrap().push(conn.clone());
        listener.accept(&conn);
        conn
    }

    /// Track a connection that was accepted before any instrumentation
    /// existed (no accept stages fire).
    pub fn add_existing(&self, local: SocketAddr, peer: SocketAddr) -> ConnectionChannel {
        let conn = ConnectionChannel::new(local, peer);
        self.connections.lock().unwrap().push(conn.clone());
        conn
    }

    /// The collection handle currently installed, for identity checks.
    pub fn current_collection(&self) -> Option<SharedCollection<ListenerChannel>> {
        self.slot.lock().unwrap().clone()
    }
}

impl ServerAccess for TestServer {
    fn listening_channels(&self) -> Option<SharedCollection<ListenerChannel>> {
        self.slot.lock().unwrap().clone()
    }

    fn install_listening_channels(&self, collection: SharedCollection<ListenerChannel>) {
        *self.slot.lock().unwrap() = Some(collection);
    }

    fn open_connections(&self) -> Vec<ConnectionChannel> {
        self.connections.lock().unwrap().clone()
    }
}

pub const HANDSHAKE_ID: i32 = 0x00;
pub const LOGIN_SUCCESS_ID: i32 = 0x02;

fn read_string(body: &mut BytesMut) -> Result<String> {
    let len = framing::read_varint(body)? as usize;
    if body.len() < len {
        return Err(InterceptError::MalformedFrame("string past frame end".into()));
    }
    let raw = body.split_to(len);
    String::from_utf8(raw.to_vec())
        .map_err(|_| InterceptError::MalformedFrame("string not utf-8".into()))
}

fn write_string(dst: &mut BytesMut, value: &str) {
    framing::write_varint(dst, value.len() as i32);
    dst.put_slice(value.as_bytes());
}

/// Packet table covering exactly what the interception core needs to see:
/// the handshake and login success. Everything else round-trips opaque.
pub struct TestPacketTable;

impl PacketTable for TestPacketTable {
    fn decode(
        &self,
        phase: ProtocolPhase,
        direction: Direction,
        id: i32,
        body: &mut BytesMut,
    ) -> Result<PacketPayload> {
        match (phase, direction, id) {
            // Serverbound id 0x00 is the handshake wherever it appears; a
            // client restarting its conversation resends it mid-stream.
            (_, Direction::Serverbound, HANDSHAKE_ID) => {
                let protocol_version = framing::read_varint(body)?;
                let server_address = read_string(body)?;
                if body.len() < 2 {
                    return Err(InterceptError::MalformedFrame("handshake truncated".into()));
                }
                let server_port = body.get_u16();
                let intent = match framing::read_varint(body)? {
                    1 => HandshakeIntent::Status,
                    2 => HandshakeIntent::Login,
                    other => {
                        return Err(InterceptError::PacketTable(format!(
                            "unknown handshake intent {other}"
                        )))
                    }
                };
                Ok(PacketPayload::Handshake {
                    protocol_version,
                    server_address,
                    server_port,
                    intent,
                })
            }
            (ProtocolPhase::Login, Direction::Clientbound, LOGIN_SUCCESS_ID) => {
                if body.len() < 16 {
                    return Err(InterceptError::MalformedFrame("login success truncated".into()));
                }
                let mut raw = [0u8; 16];
                raw.copy_from_slice(&body.split_to(16));
                let unique_id = Uuid::from_bytes(raw);
                let name = read_string(body)?;
                Ok(PacketPayload::LoginSuccess { name, unique_id })
            }
            _ => Ok(PacketPayload::Opaque {
                id,
                body: body.split().freeze(),
            }),
        }
    }

    fn encode(
        &self,
        _phase: ProtocolPhase,
        _direction: Direction,
        payload: &PacketPayload,
        dst: &mut BytesMut,
    ) -> Result<i32> {
        match payload {
            PacketPayload::Handshake {
                protocol_version,
                server_address,
                server_port,
                intent,
            } => {
                framing::write_varint(dst, *protocol_version);
                write_string(dst, server_address);
                dst.put_u16(*server_port);
                framing::write_varint(
                    dst,
                    match intent {
                        HandshakeIntent::Status => 1,
                        HandshakeIntent::Login => 2,
                    },
                );
                Ok(HANDSHAKE_ID)
            }
            PacketPayload::LoginSuccess { name, unique_id } => {
                dst.put_slice(unique_id.as_bytes());
                write_string(dst, name);
                Ok(LOGIN_SUCCESS_ID)
            }
            PacketPayload::Opaque { id, body } => {
                dst.put_slice(body);
                Ok(*id)
            }
        }
    }
}

/// Build the wire bytes for one serverbound handshake frame.
pub fn handshake_frame(intent: HandshakeIntent) -> BytesMut {
    let payload = PacketPayload::Handshake {
        protocol_version: 767,
        server_address: "localhost".into(),
        server_port: 25565,
        intent,
    };
    let mut body = BytesMut::new();
    let id = TestPacketTable
        .encode(ProtocolPhase::Handshake, Direction::Serverbound, &payload, &mut body)
        .unwrap();

    let mut framed_body = BytesMut::new();
    framing::write_varint(&mut framed_body, id);
    framed_body.extend_from_slice(&body);

    let mut wire = BytesMut::new();
    framing::emit_frame(&mut wire, &framed_body, 1024).unwrap();
    wire
}

/// Build the wire bytes for one opaque frame.
pub fn opaque_frame(id: i32, body: &[u8]) -> BytesMut {
    let mut framed_body = BytesMut::new();
    framing::write_varint(&mut framed_body, id);
    framed_body.extend_from_slice(body);

    let mut wire = BytesMut::new();
    framing::emit_frame(&mut wire, &framed_body, 1 << 20).unwrap();
    wire
}

/// Event sink that remembers every login notification.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LoginEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn last_name(&self) -> Option<String> {
        self.events
            .lock()
            .unwrap()
            .last()
            .and_then(|event| event.identity.name())
    }
}

impl EventSink for RecordingSink {
    fn on_login(&self, event: LoginEvent) {
        self.events.lock().unwrap().push(event);
    }
}
