use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::one::RefMut;

use super::bucket::TokenBucket;

/// Per-client state: the bucket plus when the client was last seen.
#[derive(Debug)]
pub struct Client {
    pub bucket: TokenBucket,
    pub last_seen: Instant,
}

/// Concurrent map from client identity to [`Client`].
///
/// Backed by a sharded [`DashMap`]: an identity's shard is write-locked for
/// the whole get-or-create-and-consume step, and [`sweep`](Self::sweep)
/// takes the same shard locks, so an entry is never evicted while a request
/// is consulting it.
pub struct ClientRegistry {
    clients: DashMap<String, Client>,
    rate: f64,
    burst: u32,
}

impl ClientRegistry {
    /// * `rate`  - tokens per second for every new bucket
    /// * `burst` - capacity of every new bucket
    pub fn new(rate: f64, burst: u32) -> Self {
        Self { clients: DashMap::new(), rate, burst }
    }

    /// Returns the entry for `identity`, inserting a full bucket if absent.
    ///
    /// The returned guard holds the shard lock; drop it promptly.
    pub fn get_or_create(&self, identity: &str, now: Instant) -> RefMut<'_, String, Client> {
        if let Some(entry) = self.clients.get_mut(identity) {
            return entry;
        }
        self.clients
            .entry(identity.to_owned())
            .or_insert_with(|| Client {
                bucket: TokenBucket::new(self.rate, self.burst, now),
                last_seen: now,
            })
    }

    /// Records that `identity` was seen at `now`. Unknown identities are ignored.
    pub fn touch(&self, identity: &str, now: Instant) {
        if let Some(mut client) = self.clients.get_mut(identity) {
            client.last_seen = now;
        }
    }

    /// One token-bucket consultation for `identity`: create if needed,
    /// mark as seen, spend a token. Atomic with respect to other callers for
    /// the same identity.
    pub fn consume(&self, identity: &str, now: Instant) -> bool {
        let mut client = self.get_or_create(identity, now);
        client.last_seen = now;
        client.bucket.consume(now)
    }

    /// Drops every client not seen within `idle` of `now`. Returns how many
    /// were removed.
    pub fn sweep(&self, now: Instant, idle: Duration) -> usize {
        let before = self.clients.len();
        self.clients
            .retain(|_, client| now.saturating_duration_since(client.last_seen) < idle);
        let removed = before.saturating_sub(self.clients.len());

        tracing::debug!(removed, remaining = self.clients.len(), "client registry sweep");
        removed
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.clients.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
