//! Protocol phases and traffic direction.

use serde::{Deserialize, Serialize};

/// The phase a connection's protocol conversation is in.
///
/// Phases only move forward (by ordinal), with one exception: a new
/// handshake frame is an explicit reset transition back to `Handshake`,
/// never a bypass of the ordering rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolPhase {
    /// Initial phase; the client has not yet declared its intent.
    Handshake,
    /// Server list ping / status queries.
    Status,
    /// Authentication in progress.
    Login,
    /// Post-login negotiation (registries, resource packs).
    Configuration,
    /// The main gameplay phase.
    Play,
}

impl ProtocolPhase {
    /// Position in the forward ordering.
    pub fn ordinal(self) -> u8 {
        match self {
            ProtocolPhase::Handshake => 0,
            ProtocolPhase::Status => 1,
            ProtocolPhase::Login => 2,
            ProtocolPhase::Configuration => 3,
            ProtocolPhase::Play => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProtocolPhase::Handshake => "handshake",
            ProtocolPhase::Status => "status",
            ProtocolPhase::Login => "login",
            ProtocolPhase::Configuration => "configuration",
            ProtocolPhase::Play => "play",
        }
    }

    /// Whether moving to `next` is a legal forward step.
    pub fn can_advance_to(self, next: ProtocolPhase) -> bool {
        next.ordinal() > self.ordinal()
    }
}

impl std::fmt::Display for ProtocolPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which way a frame is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Client to server.
    Serverbound,
    /// Server to client.
    Clientbound,
}

/// The follow-up phase a handshake frame declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeIntent {
    Status,
    Login,
}

impl HandshakeIntent {
    /// The phase this intent resolves the connection into.
    pub fn phase(self) -> ProtocolPhase {
        match self {
            HandshakeIntent::Status => ProtocolPhase::Status,
            HandshakeIntent::Login => ProtocolPhase::Login,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_strictly_forward() {
        assert!(ProtocolPhase::Handshake.can_advance_to(ProtocolPhase::Status));
        assert!(ProtocolPhase::Login.can_advance_to(ProtocolPhase::Play));
        assert!(ProtocolPhase::Login.can_advance_to(ProtocolPhase::Configuration));
        assert!(ProtocolPhase::Configuration.can_advance_to(ProtocolPhase::Play));

        assert!(!ProtocolPhase::Play.can_advance_to(ProtocolPhase::Login));
        assert!(!ProtocolPhase::Status.can_advance_to(ProtocolPhase::Status));
        assert!(!ProtocolPhase::Play.can_advance_to(ProtocolPhase::Handshake));
    }

    #[test]
    fn intent_maps_to_phase() {
        assert_eq!(HandshakeIntent::Status.phase(), ProtocolPhase::Status);
        assert_eq!(HandshakeIntent::Login.phase(), ProtocolPhase::Login);
    }
}
