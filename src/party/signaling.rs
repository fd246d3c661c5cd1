use serde_json::Value;

use super::hub::ConnectionHub;
use super::protocol::ServerMessage;
use crate::error::Result;

/// The three WebRTC handshake envelopes the relay forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    /// Wraps the untouched payload in the outbound event of the same kind.
    pub fn envelope(self, sender_id: &str, payload: Value) -> ServerMessage {
        let sender_id = sender_id.to_string();
        match self {
            SignalKind::Offer => ServerMessage::WebrtcOffer {
                sender_id,
                offer: payload,
            },
            SignalKind::Answer => ServerMessage::WebrtcAnswer {
                sender_id,
                answer: payload,
            },
            SignalKind::IceCandidate => ServerMessage::IceCandidate {
                sender_id,
                candidate: payload,
            },
        }
    }
}

/// Stateless pass-through between two connections. Payloads are not inspected
/// and nothing is remembered between calls; peers sequence offer, answer and
/// candidates themselves.
pub async fn relay(
    hub: &ConnectionHub,
    kind: SignalKind,
    sender_id: &str,
    target_id: &str,
    payload: Value,
) -> Result<()> {
    tracing::debug!(
        kind = ?kind,
        sender_id = %sender_id,
        target_id = %target_id,
        "Relaying signaling message"
    );
    hub.send(target_id, &kind.envelope(sender_id, payload)).await
}
