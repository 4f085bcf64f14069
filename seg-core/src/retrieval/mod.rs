//! Memory ranking: which memories surface in a reply.
//!
//! Every memory is scored by [`scoring`]'s multiplicative formula, sorted
//! descending with a stable sort (ties keep store order), and the top K are
//! returned together with their ids. Given the same store, utterance and
//! clock the result is always identical.

pub mod scoring;

use std::time::Instant;

use tracing::debug;

use crate::memory::{Memory, MemoryStore};
use crate::types::{MemoryId, RankScore, Timestamp};

/// How many memories surface in subtlety mode.
pub const SUBTLE_TOP_K: usize = 2;
/// How many memories surface otherwise.
pub const DIRECT_TOP_K: usize = 3;

/// Selection count for the given mode.
#[must_use]
pub fn top_k_for(subtlety_mode: bool) -> usize {
    if subtlety_mode { SUBTLE_TOP_K } else { DIRECT_TOP_K }
}

/// One ranked memory with its score breakdown.
#[derive(Debug, Clone)]
pub struct RankedMemory {
    /// The memory (cloned out of the store).
    pub memory: Memory,
    /// Combined score.
    pub score: RankScore,
    /// Per-factor breakdown (useful for inspection and tests).
    pub breakdown: ScoreBreakdown,
}

/// Breakdown of a ranking score into its factors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreBreakdown {
    /// Memory salience.
    pub salience: f64,
    /// Lexical relatedness to the utterance.
    pub relatedness: f64,
    /// Emotion weight.
    pub emotion: f64,
    /// Subtlety factor.
    pub subtlety: f64,
    /// Recency decay.
    pub recency: f64,
}

impl ScoreBreakdown {
    /// Multiply the factors into a final score.
    #[must_use]
    pub fn combined(&self) -> f64 {
        self.salience * (0.4 + 0.6 * self.relatedness) * self.emotion * self.subtlety * self.recency
    }
}

/// Result of a ranking pass.
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    /// Ranked memories, best first.
    pub memories: Vec<RankedMemory>,
}

impl Ranking {
    /// Ids of the ranked memories, in rank order.
    #[must_use]
    pub fn ids(&self) -> Vec<MemoryId> {
        self.memories.iter().map(|r| r.memory.id.clone()).collect()
    }

    /// Texts of the ranked memories, in rank order.
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        self.memories.iter().map(|r| r.memory.text.as_str()).collect()
    }

    /// Whether nothing was ranked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }
}

/// Ranks memories against an utterance.
#[derive(Debug, Clone)]
pub struct Ranker {
    subtlety_mode: bool,
    top_k: usize,
    recency_window_days: f64,
}

impl Ranker {
    /// A ranker for the given mode: K = 2 in subtlety mode, 3 otherwise.
    #[must_use]
    pub fn new(subtlety_mode: bool) -> Self {
        Self {
            subtlety_mode,
            top_k: top_k_for(subtlety_mode),
            recency_window_days: scoring::RECENCY_WINDOW_DAYS,
        }
    }

    /// Override the recency window (days).
    #[must_use]
    pub fn with_recency_window(mut self, days: f64) -> Self {
        self.recency_window_days = days;
        self
    }

    /// Score one memory.
    #[must_use]
    pub fn breakdown(
        &self,
        utterance: &str,
        tokens: &std::collections::HashSet<String>,
        memory: &Memory,
        now: Timestamp,
    ) -> ScoreBreakdown {
        ScoreBreakdown {
            salience: f64::from(memory.salience),
            relatedness: f64::from(scoring::relatedness_with_tokens(utterance, tokens, memory)),
            emotion: scoring::emotion_weight(memory),
            subtlety: scoring::subtlety_factor(memory, self.subtlety_mode),
            recency: scoring::recency(memory, now, self.recency_window_days),
        }
    }

    /// Rank the store against `utterance` at time `now` and keep the top K.
    #[must_use]
    pub fn rank(&self, store: &MemoryStore, utterance: &str, now: Timestamp) -> Ranking {
        let start = Instant::now();
        let tokens = scoring::tokenize(utterance);

        let mut scored: Vec<RankedMemory> = store
            .iter()
            .map(|memory| {
                let breakdown = self.breakdown(utterance, &tokens, memory, now);
                RankedMemory {
                    memory: memory.clone(),
                    score: RankScore::new(breakdown.combined()),
                    breakdown,
                }
            })
            .collect();

        // Stable sort: equal scores keep store order.
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored.truncate(self.top_k);

        debug!(
            candidates = store.len(),
            selected = scored.len(),
            subtlety_mode = self.subtlety_mode,
            elapsed_us = start.elapsed().as_micros(),
            "Ranked memories"
        );

        Ranking { memories: scored }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DAY_MS, Emotion, MemorySource};

    fn mem(text: &str, tags: &[&str], salience: f32, subtlety: f32) -> Memory {
        Memory::new(
            text,
            tags.iter().map(|t| (*t).to_string()),
            salience,
            Emotion::new(0.2, 0.4, None),
            MemorySource::Persona,
            Timestamp(DAY_MS),
        )
        .with_subtlety(subtlety)
        .with_association(1.0)
    }

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert(mem("Smell of glue after rain", &["scent", "rain"], 0.74, 0.9));
        store.insert(mem("A coastline at low tide", &["courage", "coastline"], 0.5, 0.4));
        store.insert(mem("Ben laughing by the river", &["ben", "river", "loss"], 0.92, 0.8));
        store.insert(mem("Bought bread", &[], 0.3, 0.1));
        store
    }

    #[test]
    fn k_depends_on_mode() {
        let s = store();
        let now = Timestamp(DAY_MS);
        assert_eq!(Ranker::new(true).rank(&s, "hello", now).memories.len(), 2);
        assert_eq!(Ranker::new(false).rank(&s, "hello", now).memories.len(), 3);
    }

    #[test]
    fn relatedness_lifts_a_memory() {
        let s = store();
        let now = Timestamp(DAY_MS);
        let ranking = Ranker::new(false).rank(&s, "tell me about courage on the coastline", now);
        assert!(ranking.texts().contains(&"A coastline at low tide"));
    }

    #[test]
    fn ranking_is_deterministic() {
        let s = store();
        let now = Timestamp(DAY_MS * 4);
        let ranker = Ranker::new(true);
        let a = ranker.rank(&s, "the river and the rain", now).ids();
        let b = ranker.rank(&s, "the river and the rain", now).ids();
        assert_eq!(a, b);
    }

    #[test]
    fn ties_keep_store_order() {
        let mut s = MemoryStore::new();
        let older = s.insert(mem("same", &[], 0.5, 0.5));
        let newer = s.insert(mem("same", &[], 0.5, 0.5));
        let ranking = Ranker::new(false).rank(&s, "nothing", Timestamp(DAY_MS));
        assert_eq!(ranking.ids(), vec![newer, older]);
    }

    #[test]
    fn empty_store_ranks_nothing() {
        let ranking = Ranker::new(true).rank(&MemoryStore::new(), "hi", Timestamp(0));
        assert!(ranking.is_empty());
    }

    #[test]
    fn breakdown_multiplies() {
        let b = ScoreBreakdown {
            salience: 0.5,
            relatedness: 1.0,
            emotion: 1.2,
            subtlety: 0.5,
            recency: 1.0,
        };
        assert!((b.combined() - 0.3).abs() < 1e-9);
    }
}
