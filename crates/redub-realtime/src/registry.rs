//! Reference-counted subscription tracking.

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use uuid::Uuid;

use crate::client::ClientId;

/// Tracks which clients follow which jobs.
///
/// Subscriptions are reference-counted per (client, job): only the 0->1
/// transition joins the client into the job's fan-out room, and only the
/// 1->0 transition leaves it.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    /// Job id -> member clients (the fan-out room).
    rooms: DashMap<Uuid, HashSet<ClientId>>,
    /// Client id -> per-job reference counts (reverse index).
    counts: DashMap<ClientId, HashMap<Uuid, usize>>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a subscription. Returns true when the client joined the room.
    pub fn subscribe(&self, client: ClientId, job_id: Uuid) -> bool {
        let mut counts = self.counts.entry(client).or_default();
        let count = counts.entry(job_id).or_insert(0);
        *count += 1;
        if *count == 1 {
            self.rooms.entry(job_id).or_default().insert(client);
            true
        } else {
            false
        }
    }

    /// Remove one subscription reference. Returns true when the client
    /// left the room.
    pub fn unsubscribe(&self, client: ClientId, job_id: Uuid) -> bool {
        let mut left = false;
        if let Some(mut counts) = self.counts.get_mut(&client) {
            if let Some(count) = counts.get_mut(&job_id) {
                *count -= 1;
                if *count == 0 {
                    counts.remove(&job_id);
                    left = true;
                }
            }
        }
        if left {
            self.leave_room(client, job_id);
        }
        left
    }

    /// Drop every subscription for a disconnected client.
    pub fn clear(&self, client: ClientId) {
        if let Some((_, counts)) = self.counts.remove(&client) {
            for job_id in counts.into_keys() {
                self.leave_room(client, job_id);
            }
        }
    }

    /// Members of a job's fan-out room.
    pub fn room_members(&self, job_id: Uuid) -> Vec<ClientId> {
        self.rooms
            .get(&job_id)
            .map(|room| room.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Current reference count for (client, job).
    pub fn count(&self, client: ClientId, job_id: Uuid) -> usize {
        self.counts
            .get(&client)
            .and_then(|counts| counts.get(&job_id).copied())
            .unwrap_or(0)
    }

    fn leave_room(&self, client: ClientId, job_id: Uuid) {
        if let Some(mut room) = self.rooms.get_mut(&job_id) {
            room.remove(&client);
            if room.is_empty() {
                drop(room);
                self.rooms.remove(&job_id);
            }
        }
    }
}
