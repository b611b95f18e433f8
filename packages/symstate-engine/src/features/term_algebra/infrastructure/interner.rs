//! Insert-or-get arena keyed by structural hash

use rustc_hash::FxHashMap;
use std::hash::Hash;

/// Append-only arena; equal values share one slot
#[derive(Debug, Clone)]
pub struct Interner<T: Hash + Eq + Clone> {
    items: Vec<T>,
    index: FxHashMap<T, u32>,
}

impl<T: Hash + Eq + Clone> Default for Interner<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<T: Hash + Eq + Clone> Interner<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot of `item`, allocating one on first sight
    pub fn intern(&mut self, item: T) -> u32 {
        if let Some(&slot) = self.index.get(&item) {
            return slot;
        }
        let slot = self.items.len() as u32;
        self.items.push(item.clone());
        self.index.insert(item, slot);
        slot
    }

    pub fn lookup(&self, item: &T) -> Option<u32> {
        self.index.get(item).copied()
    }

    pub fn get(&self, slot: u32) -> &T {
        &self.items[slot as usize]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
