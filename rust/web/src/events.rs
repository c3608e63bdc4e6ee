use crate::protocol::ServerEvent;
use crate::registry::{ConnectionId, RoomId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;

// Bounded so a stalled socket cannot grow memory without limit; frames for a
// full channel are dropped.
const OUTBOUND_CHANNEL_BUFFER: usize = 1000;

pub type OutboundSender = mpsc::Sender<ServerEvent>;
pub type OutboundReceiver = mpsc::Receiver<ServerEvent>;

/// Creates the channel a connection's writer drains.
pub fn outbound_channel() -> (OutboundSender, OutboundReceiver) {
    mpsc::channel(OUTBOUND_CHANNEL_BUFFER)
}

/// Transport-level delivery: who is connected and which broadcast scopes
/// ("socket rooms") they joined. Independent of seat bookkeeping, so deleting
/// a room record leaves scope membership alone.
#[derive(Debug, Clone, Default)]
pub struct ConnectionHub {
    inner: Arc<HubInner>,
}

#[derive(Debug, Default)]
struct HubInner {
    connections: RwLock<HashMap<ConnectionId, OutboundSender>>,
    scopes: RwLock<HashMap<RoomId, HashSet<ConnectionId>>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, conn_id: &str, sender: OutboundSender) {
        self.connections_mut().insert(conn_id.to_string(), sender);
        tracing::debug!(conn_id = %conn_id, "connection attached");
    }

    /// Forgets the connection and removes it from every scope.
    pub fn detach(&self, conn_id: &str) {
        self.connections_mut().remove(conn_id);

        let mut scopes = self.scopes_mut();
        scopes.retain(|_, members| {
            members.remove(conn_id);
            !members.is_empty()
        });

        tracing::debug!(conn_id = %conn_id, "connection detached");
    }

    pub fn join(&self, room_id: &str, conn_id: &str) {
        self.scopes_mut()
            .entry(room_id.trim().to_string())
            .or_default()
            .insert(conn_id.to_string());
    }

    /// Returns whether the event was queued.
    pub fn send_to(&self, conn_id: &str, event: ServerEvent) -> bool {
        let sender = self.connections().get(conn_id).cloned();
        match sender {
            Some(sender) => self.deliver(conn_id, &sender, event),
            None => {
                tracing::debug!(
                    conn_id = %conn_id,
                    event = event.name(),
                    "no such connection"
                );
                false
            }
        }
    }

    /// Sends to every member of the scope except `sender_id`. Returns the
    /// number of connections the event was queued for.
    pub fn broadcast_except(&self, room_id: &str, sender_id: &str, event: ServerEvent) -> usize {
        let targets: Vec<(ConnectionId, OutboundSender)> = {
            let scopes = self.scopes();
            let connections = self.connections();
            scopes
                .get(room_id.trim())
                .map(|members| {
                    members
                        .iter()
                        .filter(|id| id.as_str() != sender_id)
                        .filter_map(|id| connections.get(id).map(|tx| (id.clone(), tx.clone())))
                        .collect()
                })
                .unwrap_or_default()
        };

        tracing::trace!(
            room_id = %room_id,
            event = event.name(),
            recipients = targets.len(),
            "broadcasting to room"
        );

        targets
            .iter()
            .filter(|(id, tx)| self.deliver(id, tx, event.clone()))
            .count()
    }

    pub fn members(&self, room_id: &str) -> Vec<ConnectionId> {
        let mut members: Vec<_> = self
            .scopes()
            .get(room_id.trim())
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    pub fn connection_count(&self) -> usize {
        self.connections().len()
    }

    pub fn scope_count(&self) -> usize {
        self.scopes().len()
    }

    fn deliver(&self, conn_id: &str, sender: &OutboundSender, event: ServerEvent) -> bool {
        let name = event.name();
        match sender.try_send(event) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    conn_id = %conn_id,
                    event = name,
                    error = %err,
                    "failed to queue event for connection"
                );
                false
            }
        }
    }

    // A panic while a guard is held leaves the maps consistent (every update
    // is a single insert or remove), so poisoning is ignored.
    fn connections(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, OutboundSender>> {
        self.inner
            .connections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn connections_mut(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionId, OutboundSender>> {
        self.inner
            .connections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn scopes(&self) -> RwLockReadGuard<'_, HashMap<RoomId, HashSet<ConnectionId>>> {
        self.inner
            .scopes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn scopes_mut(&self) -> RwLockWriteGuard<'_, HashMap<RoomId, HashSet<ConnectionId>>> {
        self.inner
            .scopes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
