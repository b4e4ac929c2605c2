//! Adaptive winner/loser cache
//!
//! A bounded map that splits its capacity into two halves:
//! - Winners: entries that were hit (or written) recently and are protected
//!   from eviction
//! - Losers: entries that were inserted but not yet proven useful
//!
//! New keys enter as winners while the winner half has room, otherwise as
//! losers. A hit on a loser promotes it and demotes the oldest winner, so the
//! halves stay balanced. When the cache is full the oldest loser is evicted.
//! Entries are ordered by a monotonically increasing serial number that is
//! refreshed on every touch.
//!
//! The same structure caches directory entries, decompressed clusters and open
//! file handles. It is not synchronized; callers that share it must lock.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
struct Slot<V> {
    winner: bool,
    serial: u32,
    value: V,
}

/// Cache statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Current number of entries
    pub len: usize,
    /// Number of entries currently in the winner half
    pub winners: usize,
    /// Total capacity
    pub capacity: usize,
}

impl CacheStats {
    /// Hits divided by lookups, 0.0 when nothing was looked up
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Occupied share of the capacity
    pub fn fill_factor(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.len as f64 / self.capacity as f64
        }
    }
}

/// Bounded winner/loser cache
#[derive(Debug)]
pub struct AdaptiveCache<K, V> {
    data: HashMap<K, Slot<V>>,
    /// Always even, 0 disables the cache
    capacity: usize,
    winners: usize,
    serial: u32,
    hits: u64,
    misses: u64,
}

fn even(capacity: usize) -> usize {
    capacity + (capacity & 1)
}

impl<K, V> AdaptiveCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a cache holding at most `capacity` entries (rounded up to even)
    pub fn new(capacity: usize) -> Self {
        let capacity = even(capacity);
        AdaptiveCache {
            data: HashMap::with_capacity(capacity),
            capacity,
            winners: 0,
            serial: 1,
            hits: 0,
            misses: 0,
        }
    }

    fn next_serial(&mut self) -> u32 {
        if self.serial == u32::MAX {
            for slot in self.data.values_mut() {
                slot.serial = 0;
            }
            self.serial = 1;
        }
        let serial = self.serial;
        self.serial += 1;
        serial
    }

    fn find_key(&self, winner: bool, newest: bool) -> Option<K> {
        let candidates = self.data.iter().filter(|(_, slot)| slot.winner == winner);
        let found = if newest {
            candidates.max_by_key(|(_, slot)| slot.serial)
        } else {
            candidates.min_by_key(|(_, slot)| slot.serial)
        };
        found.map(|(key, _)| key.clone())
    }

    fn set_winner(&mut self, key: &K, winner: bool) {
        if let Some(slot) = self.data.get_mut(key) {
            if slot.winner != winner {
                slot.winner = winner;
                if winner {
                    self.winners += 1;
                } else {
                    self.winners -= 1;
                }
            }
        }
    }

    /// Move the oldest winner to the loser half with a fresh serial, so it is
    /// the last loser in line for eviction.
    fn demote_oldest_winner(&mut self) {
        if let Some(key) = self.find_key(true, false) {
            let serial = self.next_serial();
            if let Some(slot) = self.data.get_mut(&key) {
                slot.serial = serial;
            }
            self.set_winner(&key, false);
        }
    }

    fn promote_newest_loser(&mut self) -> bool {
        match self.find_key(false, true) {
            Some(key) => {
                self.set_winner(&key, true);
                true
            }
            None => false,
        }
    }

    fn remove_slot(&mut self, key: &K) -> Option<Slot<V>> {
        let slot = self.data.remove(key)?;
        if slot.winner {
            self.winners -= 1;
        }
        Some(slot)
    }

    fn evict_one(&mut self) {
        let victim = self.find_key(false, false).or_else(|| self.find_key(true, false));
        if let Some(key) = victim {
            self.remove_slot(&key);
        }
    }

    /// Refresh `key` and make it a winner, demoting the oldest other winner if
    /// the winner half overflows.
    fn touch(&mut self, key: &K) {
        let serial = self.next_serial();
        let was_winner = match self.data.get_mut(key) {
            Some(slot) => {
                slot.serial = serial;
                slot.winner
            }
            None => return,
        };
        if !was_winner {
            self.set_winner(key, true);
            if self.winners > self.capacity / 2 {
                // The touched key holds the newest serial, so it is never the
                // oldest winner here.
                self.demote_oldest_winner();
            }
        }
    }

    fn lookup(&mut self, key: &K) -> bool {
        if self.data.contains_key(key) {
            self.hits += 1;
            self.touch(key);
            true
        } else {
            self.misses += 1;
            false
        }
    }

    /// Look up a value, counting a hit or a miss
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.lookup(key) {
            self.data.get(key).map(|slot| &slot.value)
        } else {
            None
        }
    }

    /// Mutable lookup, counting a hit or a miss
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.lookup(key) {
            self.data.get_mut(key).map(|slot| &mut slot.value)
        } else {
            None
        }
    }

    /// Check for a key without touching statistics or ordering
    pub fn contains(&self, key: &K) -> bool {
        self.data.contains_key(key)
    }

    /// Insert or replace a value
    ///
    /// Replacing an existing key promotes it like a hit but does not count as
    /// one.
    pub fn put(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }

        if let Some(slot) = self.data.get_mut(&key) {
            slot.value = value;
            self.touch(&key);
            return;
        }

        let winner = if self.data.len() < self.capacity {
            self.winners < self.capacity / 2
        } else {
            self.evict_one();
            false
        };

        let serial = self.next_serial();
        if winner {
            self.winners += 1;
        }
        self.data.insert(
            key,
            Slot {
                winner,
                serial,
                value,
            },
        );
    }

    /// Insert a value directly into the winner half
    pub fn put_top(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }

        if self.data.contains_key(&key) {
            self.put(key, value);
            return;
        }

        if self.data.len() >= self.capacity {
            self.evict_one();
        }

        let serial = self.next_serial();
        self.data.insert(
            key,
            Slot {
                winner: true,
                serial,
                value,
            },
        );
        self.winners += 1;
        if self.winners > self.capacity / 2 {
            self.demote_oldest_winner();
        }
    }

    /// Remove a key, returning whether it was present
    ///
    /// Removing a winner promotes the newest loser into the freed slot.
    pub fn erase(&mut self, key: &K) -> bool {
        match self.remove_slot(key) {
            Some(slot) => {
                if slot.winner {
                    self.promote_newest_loser();
                }
                true
            }
            None => false,
        }
    }

    /// Drop every entry (statistics are kept)
    pub fn clear(&mut self) {
        self.data.clear();
        self.winners = 0;
    }

    /// Reset hit and miss counters
    pub fn clear_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
    }

    /// Change the capacity (rounded up to even)
    pub fn resize(&mut self, capacity: usize) {
        let capacity = even(capacity);

        if capacity < self.capacity {
            self.capacity = capacity;
            while self.data.len() > capacity {
                for _ in 0..2 {
                    if self.data.len() > capacity {
                        self.evict_one();
                    }
                }
                self.demote_oldest_winner();
            }
            while self.winners > capacity / 2 {
                self.demote_oldest_winner();
            }
        } else {
            self.capacity = capacity;
            while self.winners < capacity / 2 {
                if !self.promote_newest_loser() {
                    break;
                }
            }
        }
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Number of entries in the winner half
    pub fn winners(&self) -> usize {
        self.winners
    }

    pub fn hit_ratio(&self) -> f64 {
        self.stats().hit_ratio()
    }

    pub fn fill_factor(&self) -> f64 {
        self.stats().fill_factor()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            len: self.data.len(),
            winners: self.winners,
            capacity: self.capacity,
        }
    }

    #[cfg(test)]
    fn is_winner(&self, key: &K) -> Option<bool> {
        self.data.get(key).map(|slot| slot.winner)
    }

    #[cfg(test)]
    fn force_serial(&mut self, serial: u32) {
        self.serial = serial;
    }

    #[cfg(test)]
    fn serial_of(&self, key: &K) -> Option<u32> {
        self.data.get(key).map(|slot| slot.serial)
    }
}
