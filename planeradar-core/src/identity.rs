//! Identity cache: bounded FIFO of active aircraft identities.
//!
//! Identities are created on the first identification record for a hex
//! address that has no identity active within the rolling window. Counter
//! and enrichment changes stay in memory; an identity is written back when
//! it falls out of the cache (strict insertion order, not access order).

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use crate::sbs::IdentificationMsg;
use crate::store::RadarStore;
use crate::types::{AircraftIdentity, AircraftInfo, Result};

/// Default number of identities held in memory.
pub const CACHE_CAPACITY: usize = 30;

/// An identity counts as active for this long after its last message.
pub const ACTIVE_WINDOW_SECS: i64 = 3600;

/// Start of the rolling window ending at `now`.
pub fn active_since(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::seconds(ACTIVE_WINDOW_SECS)
}

// ---------------------------------------------------------------------------
// FIFO container
// ---------------------------------------------------------------------------

/// Bounded FIFO. Inserting into a full cache hands the oldest entry to the
/// eviction hook before the new entry is stored.
#[derive(Debug, Clone)]
pub struct FifoCache<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> FifoCache<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        FifoCache {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item`, evicting the earliest-inserted entry first if full.
    /// Returns the index of the inserted item.
    pub fn insert(&mut self, item: T, on_evict: impl FnOnce(T)) -> usize {
        if self.items.len() >= self.capacity {
            if let Some(oldest) = self.items.pop_front() {
                on_evict(oldest);
            }
        }
        self.items.push_back(item);
        self.items.len() - 1
    }

    /// Index of the most recently inserted entry matching `pred`.
    pub fn rposition(&self, pred: impl Fn(&T) -> bool) -> Option<usize> {
        self.items.iter().rposition(pred)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Remove every entry, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Identity cache
// ---------------------------------------------------------------------------

/// Active identities, backed by a [`RadarStore`] for creation and
/// write-back.
#[derive(Debug, Clone)]
pub struct IdentityCache {
    cache: FifoCache<AircraftIdentity>,
    pub created: u64,
    pub evicted: u64,
}

impl IdentityCache {
    pub fn new(capacity: usize) -> Self {
        IdentityCache {
            cache: FifoCache::new(capacity),
            created: 0,
            evicted: 0,
        }
    }

    /// Insert, persisting whatever gets evicted. A failed write-back is
    /// logged; the evicted state is lost but the insert still happens.
    pub fn insert<S: RadarStore + ?Sized>(
        &mut self,
        identity: AircraftIdentity,
        store: &mut S,
    ) -> usize {
        let mut evicted = false;
        let idx = self.cache.insert(identity, |old| {
            evicted = true;
            if let Err(e) = store.update_identity(&old) {
                log::error!(
                    "failed to persist evicted identity {} ({}): {e}",
                    old.id,
                    old.hex_ident
                );
            } else {
                log::debug!("evicted identity {} ({})", old.id, old.hex_ident);
            }
        });
        if evicted {
            self.evicted += 1;
        }
        idx
    }

    /// Cache index of the active identity for `hex_ident`, looking in the
    /// store when the cache misses. A store hit is pulled back into the
    /// cache.
    pub fn resolve<S: RadarStore + ?Sized>(
        &mut self,
        hex_ident: &str,
        now: DateTime<Utc>,
        store: &mut S,
    ) -> Result<Option<usize>> {
        let since = active_since(now);
        if let Some(idx) = self.cached_index(hex_ident, since) {
            return Ok(Some(idx));
        }
        match store.find_recent_identity(hex_ident, since)? {
            Some(identity) => {
                log::debug!("identity {} ({hex_ident}) reloaded from store", identity.id);
                Ok(Some(self.insert(identity, store)))
            }
            None => Ok(None),
        }
    }

    /// Apply an identification record: find or create the identity, then
    /// bump its counters and refresh enrichment.
    pub fn handle_identification<S: RadarStore + ?Sized>(
        &mut self,
        msg: &IdentificationMsg,
        info: Option<&AircraftInfo>,
        now: DateTime<Utc>,
        store: &mut S,
    ) -> Result<&AircraftIdentity> {
        let idx = match self.resolve(&msg.hex_ident, now, store)? {
            Some(idx) => idx,
            None => {
                let mut identity =
                    AircraftIdentity::new(&msg.hex_ident, &msg.callsign, msg.generated, now, info);
                identity.id = store.create_identity(&identity)?;
                log::info!(
                    "Callsign added (id: {}, hex_ident: {}, callsign: {})",
                    identity.id,
                    identity.hex_ident,
                    identity.callsign
                );
                self.created += 1;
                self.insert(identity, store)
            }
        };

        let identity = self
            .cache
            .get_mut(idx)
            .ok_or_else(|| crate::types::RadarError::Store("cache index out of range".into()))?;
        identity.last_generated = msg.generated;
        identity.last_received = now;
        identity.message_count += 1;
        identity.apply_info(info);
        Ok(identity)
    }

    fn cached_index(&self, hex_ident: &str, since: DateTime<Utc>) -> Option<usize> {
        let idx = self.cache.rposition(|i| i.hex_ident == hex_ident)?;
        let identity = self.cache.get(idx)?;
        identity.is_active_since(since).then_some(idx)
    }

    pub fn get(&self, index: usize) -> Option<&AircraftIdentity> {
        self.cache.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut AircraftIdentity> {
        self.cache.get_mut(index)
    }

    /// Active cached identity for `hex_ident`, without touching the store.
    pub fn find(&self, hex_ident: &str, now: DateTime<Utc>) -> Option<&AircraftIdentity> {
        self.cached_index(hex_ident, active_since(now))
            .and_then(|idx| self.cache.get(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AircraftIdentity> {
        self.cache.iter()
    }

    /// Write every cached identity to the store and empty the cache.
    /// Returns the number written successfully.
    pub fn flush<S: RadarStore + ?Sized>(&mut self, store: &mut S) -> usize {
        let mut written = 0;
        for identity in self.cache.drain() {
            match store.update_identity(&identity) {
                Ok(()) => written += 1,
                Err(e) => log::error!(
                    "failed to persist identity {} ({}): {e}",
                    identity.id,
                    identity.hex_ident
                ),
            }
        }
        written
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for IdentityCache {
    fn default() -> Self {
        IdentityCache::new(CACHE_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
