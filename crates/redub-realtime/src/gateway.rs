//! The subscription gateway: client registration and message fan-out.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::{ClientHandle, ClientId};
use crate::message::ServerMessage;
use crate::registry::SubscriptionRegistry;

/// Outbound buffer per client connection.
const CLIENT_BUFFER: usize = 128;

/// Fans aggregated events out to subscribed clients.
#[derive(Debug, Default)]
pub struct SubscriptionGateway {
    clients: DashMap<ClientId, Arc<ClientHandle>>,
    registry: SubscriptionRegistry,
}

impl SubscriptionGateway {
    /// Creates an empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client connection. Returns the handle and the
    /// receiver the transport task drains.
    pub fn register(&self) -> (Arc<ClientHandle>, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
        let handle = Arc::new(ClientHandle::new(Uuid::new_v4(), tx));
        self.clients.insert(handle.id, Arc::clone(&handle));
        info!(client_id = %handle.id, "Client registered");
        (handle, rx)
    }

    /// Unregister a disconnected client and drop all its subscriptions.
    pub fn unregister(&self, client: ClientId) {
        self.registry.clear(client);
        self.clients.remove(&client);
        info!(client_id = %client, "Client unregistered");
    }

    /// Subscribe a client to a set of jobs (reference-counted).
    pub fn subscribe(&self, client: ClientId, job_ids: &[Uuid]) {
        for &job_id in job_ids {
            if self.registry.subscribe(client, job_id) {
                debug!(client_id = %client, job_id = %job_id, "Joined job room");
            }
        }
    }

    /// Unsubscribe a client from a set of jobs.
    pub fn unsubscribe(&self, client: ClientId, job_ids: &[Uuid]) {
        for &job_id in job_ids {
            if self.registry.unsubscribe(client, job_id) {
                debug!(client_id = %client, job_id = %job_id, "Left job room");
            }
        }
    }

    /// Deliver one copy of a message to every member of a job's room.
    pub async fn forward_to_room(&self, job_id: Uuid, message: ServerMessage) {
        // Snapshot the handles so no map guard is held across a send.
        let handles: Vec<Arc<ClientHandle>> = self
            .registry
            .room_members(job_id)
            .into_iter()
            .filter_map(|id| self.clients.get(&id).map(|e| Arc::clone(e.value())))
            .collect();
        for handle in handles {
            handle.send(message.clone()).await;
        }
    }

    /// Deliver a message to every connected client.
    pub async fn broadcast_all(&self, message: ServerMessage) {
        let handles: Vec<Arc<ClientHandle>> = self
            .clients
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for handle in handles {
            handle.send(message.clone()).await;
        }
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}
