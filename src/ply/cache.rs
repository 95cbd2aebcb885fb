// SPDX-FileCopyrightText: 2026 Mesh Stream Contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Stream-position cache (spec §4.2.1, §9): a bounded index from
//! vertex-instance number to byte offset, so faces referencing earlier
//! vertices can seek back without rescanning the file. Bounded by
//! `maxStreamPositions`; eviction is LRU by instance index.

use std::collections::HashMap;

pub struct PositionCache {
    capacity: usize,
    entries: HashMap<u64, (u64, u64)>,
    tick: u64,
}

impl PositionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            tick: 0,
        }
    }

    pub fn insert(&mut self, instance: u64, offset: u64) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&instance) {
            self.evict_oldest();
        }
        self.tick += 1;
        self.entries.insert(instance, (offset, self.tick));
    }

    pub fn get(&mut self, instance: u64) -> Option<u64> {
        self.tick += 1;
        let tick = self.tick;
        if let Some(entry) = self.entries.get_mut(&instance) {
            entry.1 = tick;
            Some(entry.0)
        } else {
            None
        }
    }

    fn evict_oldest(&mut self) {
        if let Some((&oldest, _)) = self
            .entries
            .iter()
            .min_by_key(|(_, &(_, last_used))| last_used)
        {
            self.entries.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used_past_capacity() {
        let mut cache = PositionCache::new(2);
        cache.insert(0, 100);
        cache.insert(1, 200);
        assert_eq!(cache.get(0), Some(100));
        cache.insert(2, 300);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(1), None);
        assert_eq!(cache.get(0), Some(100));
        assert_eq!(cache.get(2), Some(300));
    }

    #[test]
    fn refreshing_an_entry_protects_it_from_eviction() {
        let mut cache = PositionCache::new(1);
        cache.insert(0, 100);
        cache.insert(0, 150);
        assert_eq!(cache.get(0), Some(150));
    }
}
