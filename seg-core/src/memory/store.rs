//! The ordered memory collection and every mutation on it.
//!
//! Newest memories sit at the front. Mutations touch only the addressed
//! entry; every other memory keeps its fields and position.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Memory, normalize_tags};
use crate::types::{MemoryId, Timestamp, clamp01};

/// Ordered collection of [`Memory`] records owned by one persona state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryStore {
    memories: Vec<Memory>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from existing memories, keeping their order.
    ///
    /// Duplicate ids are re-issued so ids stay unique within the store.
    #[must_use]
    pub fn from_memories(memories: Vec<Memory>) -> Self {
        let mut store = Self::new();
        for memory in memories {
            store.push_back(memory);
        }
        store
    }

    /// Number of memories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memories.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    /// Number of core anchors.
    #[must_use]
    pub fn anchor_count(&self) -> usize {
        self.memories.iter().filter(|m| m.immutable).count()
    }

    /// Iterate in store order (newest first).
    pub fn iter(&self) -> std::slice::Iter<'_, Memory> {
        self.memories.iter()
    }

    /// Borrow all memories as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Memory] {
        &self.memories
    }

    /// Look up a memory by id.
    #[must_use]
    pub fn get(&self, id: &MemoryId) -> Option<&Memory> {
        self.memories.iter().find(|m| &m.id == id)
    }

    /// Whether a memory with this id exists.
    #[must_use]
    pub fn contains(&self, id: &MemoryId) -> bool {
        self.get(id).is_some()
    }

    fn get_mut(&mut self, id: &MemoryId) -> Option<&mut Memory> {
        self.memories.iter_mut().find(|m| &m.id == id)
    }

    fn ensure_unique_id(&self, memory: &mut Memory) {
        while self.contains(&memory.id) {
            let prefix = memory
                .id
                .as_str()
                .split('_')
                .next()
                .filter(|p| !p.is_empty())
                .unwrap_or("m")
                .to_string();
            memory.id = MemoryId::generate(&prefix);
        }
    }

    fn push_back(&mut self, mut memory: Memory) {
        self.ensure_unique_id(&mut memory);
        self.memories.push(memory);
    }

    /// Insert a memory at the front of the store and return its id.
    ///
    /// If the id is already taken a fresh one is generated.
    pub fn insert(&mut self, mut memory: Memory) -> MemoryId {
        self.ensure_unique_id(&mut memory);
        let id = memory.id.clone();
        debug!(
            memory = %id,
            source = %memory.source,
            salience = memory.salience,
            anchor = memory.immutable,
            "Inserted memory"
        );
        self.memories.insert(0, memory);
        id
    }

    /// Add `amount` to a memory's salience (clamped into `[0, 1]`) and mark
    /// it reinforced.
    ///
    /// `last_reinforced` always moves strictly forward: it becomes `now`, or
    /// one millisecond past its previous value if `now` is not later.
    /// Returns `false` if the id is unknown.
    pub fn reinforce(&mut self, id: &MemoryId, amount: f32, now: Timestamp) -> bool {
        let Some(memory) = self.get_mut(id) else {
            return false;
        };
        memory.salience = clamp01(memory.salience + amount);
        memory.last_reinforced = now.max(memory.last_reinforced.plus_millis(1));
        debug!(memory = %id, amount, salience = memory.salience, "Reinforced memory");
        true
    }

    /// Reinforce by a fraction of the remaining headroom:
    /// `salience += fraction * (1 - salience)`.
    pub fn reinforce_headroom(&mut self, id: &MemoryId, fraction: f32, now: Timestamp) -> bool {
        let Some(current) = self.get(id).map(|m| m.salience) else {
            return false;
        };
        self.reinforce(id, fraction * (1.0 - current), now)
    }

    /// Remove a memory.
    ///
    /// Core anchors are left in place. Returns `true` only if something was
    /// removed.
    pub fn prune(&mut self, id: &MemoryId) -> bool {
        let Some(index) = self.memories.iter().position(|m| &m.id == id) else {
            return false;
        };
        if self.memories[index].immutable {
            debug!(memory = %id, "Refused to prune core anchor");
            return false;
        }
        self.memories.remove(index);
        debug!(memory = %id, remaining = self.memories.len(), "Pruned memory");
        true
    }

    /// Remove a memory even if it is a core anchor (explicit user override).
    pub fn force_remove(&mut self, id: &MemoryId) -> Option<Memory> {
        let index = self.memories.iter().position(|m| &m.id == id)?;
        Some(self.memories.remove(index))
    }

    /// Set or clear the core-anchor flag. Returns `false` if the id is unknown.
    pub fn set_immutable(&mut self, id: &MemoryId, immutable: bool) -> bool {
        match self.get_mut(id) {
            Some(memory) => {
                memory.immutable = immutable;
                true
            }
            None => false,
        }
    }

    /// Replace a memory's text and tags, keeping id and timestamps.
    pub fn edit(&mut self, id: &MemoryId, text: impl Into<String>, tags: Vec<String>) -> bool {
        match self.get_mut(id) {
            Some(memory) => {
                memory.text = text.into();
                memory.tags = normalize_tags(tags);
                true
            }
            None => false,
        }
    }

    /// Memories matching a predicate, in store order.
    pub fn filter<F>(&self, predicate: F) -> Vec<&Memory>
    where
        F: Fn(&Memory) -> bool,
    {
        self.memories.iter().filter(|m| predicate(m)).collect()
    }

    /// All memories sorted by salience, highest first. Ties keep store order.
    #[must_use]
    pub fn sorted_by_salience(&self) -> Vec<&Memory> {
        let mut sorted: Vec<&Memory> = self.memories.iter().collect();
        sorted.sort_by(|a, b| b.salience.total_cmp(&a.salience));
        sorted
    }

    /// The `n` most salient memories.
    #[must_use]
    pub fn top_salient(&self, n: usize) -> Vec<&Memory> {
        let mut sorted = self.sorted_by_salience();
        sorted.truncate(n);
        sorted
    }

    /// Salience-sorted memories whose text or tags contain `query`
    /// (case-insensitive). An empty query returns everything.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Memory> {
        let q = query.trim().to_lowercase();
        self.sorted_by_salience()
            .into_iter()
            .filter(|m| {
                q.is_empty()
                    || m.text.to_lowercase().contains(&q)
                    || m.tags.iter().any(|t| t.contains(&q))
            })
            .collect()
    }

    /// Apply `f` to every memory in place. Used by the decay engine.
    pub fn for_each_mut<F>(&mut self, f: F)
    where
        F: FnMut(&mut Memory),
    {
        self.memories.iter_mut().for_each(f);
    }
}

impl<'a> IntoIterator for &'a MemoryStore {
    type Item = &'a Memory;
    type IntoIter = std::slice::Iter<'a, Memory>;

    fn into_iter(self) -> Self::IntoIter {
        self.memories.iter()
    }
}
