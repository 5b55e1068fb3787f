//! Wire events exchanged with clients.
//!
//! Every frame is `{"event": "<name>", "data": <payload>}`; `data` is absent
//! for events that carry nothing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::{ConnectionId, SessionId};
use super::sessions::Message;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Text,
    Video,
}

/// What a client tells us about itself when it starts searching. Anything
/// besides `mode` is kept as-is and shown to the partner.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub mode: Mode,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    pub fn new(mode: Mode) -> Self {
        Self { mode, extra: Map::new() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    Ice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    StartRequest(Profile),
    WithdrawRequest,
    SelfStop,
    SelfNewPartnerRequest,
    SignalOffer(Value),
    SignalAnswer(Value),
    SignalIce(Value),
    SendMessage(String),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartRequest(_) => "start-request",
            Self::WithdrawRequest => "withdraw-request",
            Self::SelfStop => "self-stop",
            Self::SelfNewPartnerRequest => "self-new-partner-request",
            Self::SignalOffer(_) => "signal-offer",
            Self::SignalAnswer(_) => "signal-answer",
            Self::SignalIce(_) => "signal-ice",
            Self::SendMessage(_) => "send-message",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: ConnectionId },
    #[serde(rename_all = "camelCase")]
    Matched { session_id: SessionId, peer_profile: Profile },
    PeerLeft,
    WithdrawnAck,
    SearchingAck,
    ChatClosed,
    SignalOffer(Value),
    SignalAnswer(Value),
    SignalIce(Value),
    NewMessage(Message),
}

impl ServerEvent {
    pub fn signal(kind: SignalKind, payload: Value) -> Self {
        match kind {
            SignalKind::Offer => Self::SignalOffer(payload),
            SignalKind::Answer => Self::SignalAnswer(payload),
            SignalKind::Ice => Self::SignalIce(payload),
        }
    }
}
