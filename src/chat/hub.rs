use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::broker::{Broker, ClientEvent, ConnectionId, Outbox, ServerEvent};

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

enum Command {
    Connect { id: ConnectionId, events: EventSender },
    Inbound { from: ConnectionId, event: ClientEvent },
    Disconnect { id: ConnectionId },
}

/// Handle to the task that owns the broker. Every connection funnels its
/// events through here, so the broker only ever sees one event at a time.
#[derive(Clone)]
pub struct Hub {
    tx: mpsc::UnboundedSender<Command>,
}

impl Hub {
    pub fn spawn(broker: Broker) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(broker, rx));
        Self { tx }
    }

    pub fn connect(&self, id: ConnectionId, events: EventSender) {
        self.submit(Command::Connect { id, events });
    }

    pub fn inbound(&self, from: ConnectionId, event: ClientEvent) {
        self.submit(Command::Inbound { from, event });
    }

    pub fn disconnect(&self, id: ConnectionId) {
        self.submit(Command::Disconnect { id });
    }

    fn submit(&self, command: Command) {
        if self.tx.send(command).is_err() {
            error!("hub is not running");
        }
    }
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, EventSender>,
}

impl Outbox for Registry {
    fn send(&mut self, to: &ConnectionId, event: ServerEvent) {
        let Some(events) = self.connections.get(to) else {
            debug!(connection = %to, "dropping event for unreachable connection");
            return;
        };
        if events.send(event).is_err() {
            debug!(connection = %to, "connection stopped reading");
        }
    }
}

async fn run(mut broker: Broker, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut registry = Registry::default();
    info!("hub started");

    while let Some(command) = rx.recv().await {
        let outbound = match command {
            Command::Connect { id, events } => {
                registry.connections.insert(id, events);
                broker.connect(id)
            }
            Command::Inbound { from, event } => broker.handle(&from, event),
            Command::Disconnect { id } => {
                registry.connections.remove(&id);
                broker.disconnect(&id)
            }
        };
        registry.dispatch(outbound);
    }

    info!("hub stopped");
}
