//! Client registry tracking live subscriber connections

use std::collections::HashMap;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::debug;

use super::broadcast::Subscriber;
use crate::types::ClientId;

pub(crate) type Clients = HashMap<ClientId, Box<dyn Subscriber>>;

/// Membership set of live subscribers.
///
/// Guarded by a reader/writer lock: fan-out holds a read guard while delivery
/// attempts are in flight, and every mutation (register, unregister, prune)
/// takes the write guard. Status queries such as [`len`](Self::len) may run
/// from any task. Iteration is only exposed to the broadcaster.
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<Clients>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection.
    ///
    /// Registering an id that is already present keeps the existing connection
    /// and releases the new handle. Returns whether the connection was added.
    pub async fn register(&self, id: ClientId, subscriber: Box<dyn Subscriber>) -> bool {
        let mut clients = self.clients.write().await;
        if clients.contains_key(&id) {
            drop(clients);
            debug!(client = %id, "Client already registered, releasing duplicate handle");
            subscriber.close().await;
            return false;
        }

        clients.insert(id, subscriber);
        debug!(client = %id, total = clients.len(), "Client registered");
        true
    }

    /// Remove and release a connection. Absent ids are a no-op.
    pub async fn unregister(&self, id: ClientId) -> bool {
        let removed = self.clients.write().await.remove(&id);
        match removed {
            Some(subscriber) => {
                subscriber.close().await;
                debug!(client = %id, "Client unregistered");
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    pub async fn contains(&self, id: ClientId) -> bool {
        self.clients.read().await.contains_key(&id)
    }

    /// Shared read view for a fan-out pass
    pub(super) async fn read_view(&self) -> RwLockReadGuard<'_, Clients> {
        self.clients.read().await
    }

    /// Remove failed connections after a read pass has completed.
    ///
    /// All removals happen under a single write guard; the removed handles are
    /// released after the guard is dropped. Returns the number removed.
    pub(super) async fn prune(&self, ids: &[ClientId]) -> usize {
        let removed: Vec<_> = {
            let mut clients = self.clients.write().await;
            ids.iter().filter_map(|id| clients.remove(id)).collect()
        };

        for subscriber in &removed {
            subscriber.close().await;
        }
        removed.len()
    }

    /// Release every connection
    pub(super) async fn close_all(&self) -> usize {
        let drained: Vec<_> = self.clients.write().await.drain().collect();
        for (_, subscriber) in &drained {
            subscriber.close().await;
        }
        drained.len()
    }
}
