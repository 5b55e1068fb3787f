use std::collections::{HashSet, VecDeque};

use time::OffsetDateTime;

use super::BrokerError;
use super::ids::ConnectionId;
use super::protocol::Profile;

#[derive(Debug, Clone, PartialEq)]
pub struct WaitingEntry {
    pub connection_id: ConnectionId,
    pub profile: Profile,
    pub enqueued_at: OffsetDateTime,
}

/// Strict FIFO of connections looking for a partner.
#[derive(Debug, Default)]
pub struct WaitingPool {
    entries: VecDeque<WaitingEntry>,
    members: HashSet<ConnectionId>,
}

impl WaitingPool {
    pub fn enqueue(&mut self, entry: WaitingEntry) -> Result<(), BrokerError> {
        if !self.members.insert(entry.connection_id) {
            return Err(BrokerError::AlreadyWaiting(entry.connection_id));
        }
        self.entries.push_back(entry);
        Ok(())
    }

    /// Puts an entry back at the head so it keeps its place in line.
    pub fn requeue_front(&mut self, entry: WaitingEntry) -> Result<(), BrokerError> {
        if !self.members.insert(entry.connection_id) {
            return Err(BrokerError::AlreadyWaiting(entry.connection_id));
        }
        self.entries.push_front(entry);
        Ok(())
    }

    pub fn withdraw(&mut self, id: &ConnectionId) -> Option<WaitingEntry> {
        if !self.members.remove(id) {
            return None;
        }
        let index = self.entries.iter().position(|e| e.connection_id == *id)?;
        self.entries.remove(index)
    }

    /// Pops the two oldest entries, or nothing if fewer than two are waiting.
    pub fn pop_pair(&mut self) -> Option<(WaitingEntry, WaitingEntry)> {
        if self.entries.len() < 2 {
            return None;
        }
        let first = self.entries.pop_front()?;
        let second = self.entries.pop_front()?;
        self.members.remove(&first.connection_id);
        self.members.remove(&second.connection_id);
        Some((first, second))
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WaitingEntry> {
        self.entries.iter()
    }
}
