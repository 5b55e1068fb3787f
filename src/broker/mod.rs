//! Anonymous pairing and relaying between two-party sessions.
//!
//! The [`Broker`] owns the waiting pool and the session table and never
//! touches the transport: every operation returns the events to deliver as
//! [`Outbound`] intents, which the caller hands to an [`Outbox`]. Events must
//! be fed to it one at a time.

pub mod ids;
pub mod pool;
pub mod protocol;
pub mod sessions;

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use ids::{Clock, ConnectionId, IdSource, MessageId, SessionId, SystemClock, UuidV7};
pub use pool::{WaitingEntry, WaitingPool};
pub use protocol::{ClientEvent, Mode, Profile, ServerEvent, SignalKind};
pub use sessions::{Message, Participant, Session, SessionTable};

use ids::unix_millis;

pub const DEFAULT_HISTORY_LIMIT: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),
    #[error("connection {0} is already waiting for a partner")]
    AlreadyWaiting(ConnectionId),
    #[error("connection {0} is already paired in session {1}")]
    AlreadyPaired(ConnectionId, SessionId),
    #[error("connection {0} cannot be paired with itself")]
    SelfPairing(ConnectionId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: ConnectionId,
    pub event: ServerEvent,
}

impl Outbound {
    pub fn new(to: ConnectionId, event: ServerEvent) -> Self {
        Self { to, event }
    }
}

/// Delivery side of the connection boundary. Sends are fire-and-forget.
pub trait Outbox {
    fn send(&mut self, to: &ConnectionId, event: ServerEvent);

    fn dispatch(&mut self, outbound: Vec<Outbound>) {
        for Outbound { to, event } in outbound {
            self.send(&to, event);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unknown,
    Idle,
    Waiting,
    Paired(SessionId),
}

/// Why a session ends, and which participant ended it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCause {
    SelfStop(ConnectionId),
    SelfNewPartner(ConnectionId),
    PeerDisconnected(ConnectionId),
}

impl CloseCause {
    pub fn initiator(&self) -> ConnectionId {
        match *self {
            Self::SelfStop(id) | Self::SelfNewPartner(id) | Self::PeerDisconnected(id) => id,
        }
    }

    /// Only an explicit stop sends the remaining participant back to the pool.
    pub fn requeues_peer(&self) -> bool {
        matches!(self, Self::SelfStop(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfStop(_) => "self-stop",
            Self::SelfNewPartner(_) => "self-new-partner-request",
            Self::PeerDisconnected(_) => "peer-disconnected-transport",
        }
    }
}

pub struct Broker {
    pool: WaitingPool,
    sessions: SessionTable,
    /// Live connections and the profile each last searched with.
    live: HashMap<ConnectionId, Option<Profile>>,
    clock: Box<dyn Clock>,
    ids: Box<dyn IdSource>,
    history_limit: usize,
}

impl Broker {
    pub fn new(history_limit: usize) -> Self {
        Self::with_sources(Box::new(SystemClock), Box::new(UuidV7), history_limit)
    }

    pub fn with_sources(clock: Box<dyn Clock>, ids: Box<dyn IdSource>, history_limit: usize) -> Self {
        Self {
            pool: WaitingPool::default(),
            sessions: SessionTable::default(),
            live: HashMap::new(),
            clock,
            ids,
            history_limit,
        }
    }

    pub fn pool(&self) -> &WaitingPool {
        &self.pool
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn state_of(&self, id: &ConnectionId) -> ConnectionState {
        if !self.live.contains_key(id) {
            ConnectionState::Unknown
        } else if let Some(session) = self.sessions.lookup_by_participant(id) {
            ConnectionState::Paired(session.id)
        } else if self.pool.contains(id) {
            ConnectionState::Waiting
        } else {
            ConnectionState::Idle
        }
    }

    pub fn connect(&mut self, id: ConnectionId) -> Vec<Outbound> {
        if self.live.contains_key(&id) {
            warn!(connection = %id, "connection registered twice");
            return Vec::new();
        }
        self.live.insert(id, None);
        debug!(connection = %id, live = self.live.len(), "connection registered");
        vec![Outbound::new(id, ServerEvent::Connected { connection_id: id })]
    }

    pub fn handle(&mut self, from: &ConnectionId, event: ClientEvent) -> Vec<Outbound> {
        if !self.live.contains_key(from) {
            warn!(connection = %from, event = event.name(), "event from unregistered connection dropped");
            return Vec::new();
        }

        match event {
            ClientEvent::StartRequest(profile) => self.start(from, profile),
            ClientEvent::WithdrawRequest => self.withdraw(from),
            ClientEvent::SelfStop => self.stop(from),
            ClientEvent::SelfNewPartnerRequest => self.new_partner(from),
            ClientEvent::SignalOffer(payload) => self.relay_signal(from, SignalKind::Offer, payload),
            ClientEvent::SignalAnswer(payload) => self.relay_signal(from, SignalKind::Answer, payload),
            ClientEvent::SignalIce(payload) => self.relay_signal(from, SignalKind::Ice, payload),
            ClientEvent::SendMessage(text) => self.relay_message(from, text),
        }
    }

    /// Adds a connection to the tail of the pool and attempts a match.
    pub fn enqueue(&mut self, id: ConnectionId, profile: Profile) -> Result<Vec<Outbound>, BrokerError> {
        if !self.live.contains_key(&id) {
            return Err(BrokerError::UnknownConnection(id));
        }
        if let Some(session) = self.sessions.lookup_by_participant(&id) {
            return Err(BrokerError::AlreadyPaired(id, session.id));
        }

        self.pool.enqueue(WaitingEntry {
            connection_id: id,
            profile: profile.clone(),
            enqueued_at: self.clock.now(),
        })?;
        self.live.insert(id, Some(profile));
        debug!(connection = %id, waiting = self.pool.len(), "enqueued");

        Ok(self.try_match())
    }

    pub fn withdraw(&mut self, id: &ConnectionId) -> Vec<Outbound> {
        match self.pool.withdraw(id) {
            Some(_) => {
                debug!(connection = %id, waiting = self.pool.len(), "withdrawn");
                vec![Outbound::new(*id, ServerEvent::WithdrawnAck)]
            }
            None => Vec::new(),
        }
    }

    /// Pairs the two oldest waiting connections. A live survivor of a stale
    /// pair goes back to the head of the pool.
    pub fn try_match(&mut self) -> Vec<Outbound> {
        let mut outbound = Vec::new();

        while let Some((first, second)) = self.pool.pop_pair() {
            let (a, b) = (first.connection_id, second.connection_id);
            if !self.live.contains_key(&a) || !self.live.contains_key(&b) {
                warn!(%a, %b, "stale pairing attempt");
                for entry in [second, first] {
                    if self.live.contains_key(&entry.connection_id) {
                        if let Err(err) = self.pool.requeue_front(entry) {
                            warn!(%err, "could not requeue survivor");
                        }
                    }
                }
                continue;
            }

            let session_id = SessionId(self.ids.next_id());
            let to_a = ServerEvent::Matched { session_id, peer_profile: second.profile.clone() };
            let to_b = ServerEvent::Matched { session_id, peer_profile: first.profile.clone() };
            let session = Session::new(
                session_id,
                Participant { id: a, profile: first.profile },
                Participant { id: b, profile: second.profile },
                self.clock.now(),
                self.history_limit,
            );

            match self.sessions.insert(session) {
                Ok(()) => {
                    info!(session = %session_id, %a, %b, live_sessions = self.sessions.len(), "matched");
                    outbound.push(Outbound::new(a, to_a));
                    outbound.push(Outbound::new(b, to_b));
                }
                Err(err) => warn!(%err, "pairing rejected"),
            }
        }

        outbound
    }

    /// Forwards a negotiation payload untouched to the sender's partner.
    pub fn relay_signal(&mut self, from: &ConnectionId, kind: SignalKind, payload: Value) -> Vec<Outbound> {
        let Some(peer) = self
            .sessions
            .lookup_by_participant(from)
            .and_then(|session| session.peer_of(from))
        else {
            debug!(connection = %from, ?kind, "signal without session dropped");
            return Vec::new();
        };

        vec![Outbound::new(peer.id, ServerEvent::signal(kind, payload))]
    }

    /// Stamps a chat message, logs it and echoes it to both participants.
    pub fn relay_message(&mut self, from: &ConnectionId, text: String) -> Vec<Outbound> {
        let Some(session) = self.sessions.lookup_by_participant_mut(from) else {
            debug!(connection = %from, "message without session dropped");
            return Vec::new();
        };

        let message = Message {
            id: MessageId(self.ids.next_id()),
            text,
            sender_connection_id: *from,
            timestamp: unix_millis(self.clock.now()),
        };
        session.push_message(message.clone());

        session
            .participants()
            .into_iter()
            .map(|p| Outbound::new(p.id, ServerEvent::NewMessage(message.clone())))
            .collect()
    }

    pub fn close_session(&mut self, session_id: &SessionId, cause: CloseCause) -> Vec<Outbound> {
        let initiator = cause.initiator();
        let Some(peer) = self
            .sessions
            .get(session_id)
            .and_then(|session| session.peer_of(&initiator))
            .cloned()
        else {
            return Vec::new();
        };
        self.sessions.remove(session_id);
        info!(session = %session_id, %initiator, cause = cause.as_str(), "session closed");

        let mut outbound = Vec::new();
        if !self.live.contains_key(&peer.id) {
            return outbound;
        }
        outbound.push(Outbound::new(peer.id, ServerEvent::PeerLeft));

        if cause.requeues_peer() {
            match self.enqueue(peer.id, peer.profile) {
                Ok(more) => outbound.extend(more),
                Err(err) => warn!(connection = %peer.id, %err, "could not requeue peer"),
            }
        }

        outbound
    }

    /// Forgets a connection whose transport went away.
    pub fn disconnect(&mut self, id: &ConnectionId) -> Vec<Outbound> {
        if self.live.remove(id).is_none() {
            return Vec::new();
        }
        self.pool.withdraw(id);

        let session_id = self.sessions.lookup_by_participant(id).map(|s| s.id);
        let outbound = match session_id {
            Some(session_id) => self.close_session(&session_id, CloseCause::PeerDisconnected(*id)),
            None => Vec::new(),
        };
        debug!(connection = %id, live = self.live.len(), "connection gone");
        outbound
    }

    fn start(&mut self, from: &ConnectionId, profile: Profile) -> Vec<Outbound> {
        match self.enqueue(*from, profile) {
            Ok(outbound) => outbound,
            Err(err) => {
                warn!(connection = %from, %err, "start-request rejected");
                Vec::new()
            }
        }
    }

    fn stop(&mut self, from: &ConnectionId) -> Vec<Outbound> {
        let Some(session_id) = self.sessions.lookup_by_participant(from).map(|s| s.id) else {
            debug!(connection = %from, "self-stop without session ignored");
            return Vec::new();
        };

        let mut outbound = self.close_session(&session_id, CloseCause::SelfStop(*from));
        outbound.push(Outbound::new(*from, ServerEvent::ChatClosed));
        outbound
    }

    fn new_partner(&mut self, from: &ConnectionId) -> Vec<Outbound> {
        let session_id = self.sessions.lookup_by_participant(from).map(|s| s.id);
        let mut outbound = match session_id {
            Some(session_id) => self.close_session(&session_id, CloseCause::SelfNewPartner(*from)),
            None => Vec::new(),
        };

        let profile = self.live.get(from).cloned().flatten().unwrap_or_default();
        match self.enqueue(*from, profile) {
            Ok(more) => {
                outbound.push(Outbound::new(*from, ServerEvent::SearchingAck));
                outbound.extend(more);
            }
            Err(err) => warn!(connection = %from, %err, "new-partner request rejected"),
        }
        outbound
    }
}
