//! Identity room registry.
//!
//! Maps an authenticated actor identity to the set of currently-open
//! transport connections. The registry is the single shared mutable resource
//! of the fan-out core: it serialises its own map mutations behind a mutex
//! and the lock is never held across an external call — dispatch snapshots a
//! room's senders and writes outside the lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::event::NotificationEvent;

/// Per-connection outbound queue. Bounded so a stalled connection sheds
/// events instead of blocking the dispatcher.
pub type EventSender = mpsc::Sender<NotificationEvent>;

/// Registry-assigned handle for one transport connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Room addressing. Connections that never resolved an identity are accepted
/// but parked under `Anonymous`: they receive nothing targeted, and all
/// events in this system are targeted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoomKey {
    Identity(Uuid),
    Anonymous,
}

impl RoomKey {
    pub fn from_identity(identity: Option<Uuid>) -> Self {
        match identity {
            Some(id) => RoomKey::Identity(id),
            None => RoomKey::Anonymous,
        }
    }
}

/// An explicit, independently instantiable service object owning the
/// identity-to-connections map. Constructed once in `main` and injected into
/// both the connection-accepting layer and the dispatcher.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<RoomKey, HashMap<ConnectionId, EventSender>>>,
    next_connection: AtomicU64,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a live connection under the given identity, or under the
    /// anonymous room when identity resolution failed (fail-open).
    pub fn register(&self, identity: Option<Uuid>, sender: EventSender) -> ConnectionId {
        let connection = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed));
        let key = RoomKey::from_identity(identity);

        self.rooms()
            .entry(key)
            .or_default()
            .insert(connection, sender);
        tracing::debug!(%connection, room = ?key, "connection registered");
        connection
    }

    /// Removes a connection from its room. Idempotent: unknown connections
    /// and already-empty rooms are no-ops, never errors.
    pub fn unregister(&self, identity: Option<Uuid>, connection: ConnectionId) {
        let key = RoomKey::from_identity(identity);
        let mut rooms = self.rooms();
        if let Some(room) = rooms.get_mut(&key) {
            room.remove(&connection);
            if room.is_empty() {
                rooms.remove(&key);
            }
        }
    }

    /// Number of live connections for an identity.
    pub fn connection_count(&self, identity: Option<Uuid>) -> usize {
        self.rooms()
            .get(&RoomKey::from_identity(identity))
            .map_or(0, HashMap::len)
    }

    /// Snapshot of a room's senders, taken under the lock so dispatch can
    /// write without holding it.
    pub(crate) fn senders(&self, key: &RoomKey) -> Vec<(ConnectionId, EventSender)> {
        self.rooms()
            .get(key)
            .map(|room| room.iter().map(|(id, tx)| (*id, tx.clone())).collect())
            .unwrap_or_default()
    }

    fn rooms(&self) -> std::sync::MutexGuard<'_, HashMap<RoomKey, HashMap<ConnectionId, EventSender>>> {
        self.rooms.lock().unwrap_or_else(|e| e.into_inner())
    }
}
