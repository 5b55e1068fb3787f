use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::BrokerError;
use super::ids::{ConnectionId, MessageId, SessionId};
use super::protocol::Profile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub sender_connection_id: ConnectionId,
    /// Unix milliseconds.
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: ConnectionId,
    pub profile: Profile,
}

/// A live pairing of two distinct connections.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub a: Participant,
    pub b: Participant,
    pub created_at: OffsetDateTime,
    messages: VecDeque<Message>,
    history_limit: usize,
}

impl Session {
    pub fn new(
        id: SessionId,
        a: Participant,
        b: Participant,
        created_at: OffsetDateTime,
        history_limit: usize,
    ) -> Self {
        Self {
            id,
            a,
            b,
            created_at,
            messages: VecDeque::new(),
            history_limit,
        }
    }

    pub fn has(&self, id: &ConnectionId) -> bool {
        self.a.id == *id || self.b.id == *id
    }

    pub fn peer_of(&self, id: &ConnectionId) -> Option<&Participant> {
        if self.a.id == *id {
            Some(&self.b)
        } else if self.b.id == *id {
            Some(&self.a)
        } else {
            None
        }
    }

    pub fn participants(&self) -> [&Participant; 2] {
        [&self.a, &self.b]
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Appends to the log, evicting the oldest entries past the history limit.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push_back(message);
        while self.messages.len() > self.history_limit {
            self.messages.pop_front();
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<SessionId, Session>,
    by_participant: HashMap<ConnectionId, SessionId>,
}

impl SessionTable {
    pub fn insert(&mut self, session: Session) -> Result<(), BrokerError> {
        if session.a.id == session.b.id {
            return Err(BrokerError::SelfPairing(session.a.id));
        }
        for participant in session.participants() {
            if let Some(existing) = self.by_participant.get(&participant.id) {
                return Err(BrokerError::AlreadyPaired(participant.id, *existing));
            }
        }

        self.by_participant.insert(session.a.id, session.id);
        self.by_participant.insert(session.b.id, session.id);
        self.sessions.insert(session.id, session);
        Ok(())
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn lookup_by_participant(&self, id: &ConnectionId) -> Option<&Session> {
        self.by_participant.get(id).and_then(|sid| self.sessions.get(sid))
    }

    pub fn lookup_by_participant_mut(&mut self, id: &ConnectionId) -> Option<&mut Session> {
        let sid = self.by_participant.get(id)?;
        self.sessions.get_mut(sid)
    }

    pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
        let session = self.sessions.remove(id)?;
        self.by_participant.remove(&session.a.id);
        self.by_participant.remove(&session.b.id);
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }
}
