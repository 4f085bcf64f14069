//! The complete state of one narrative organism.
//!
//! [`SegState`] owns its persona and memories outright. It is the unit that
//! is exported, imported and guarded by a [`crate::session::Session`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ReplyConfig;
use crate::decay::{DecayParams, decay_store};
use crate::dream::{self, DreamOutcome};
use crate::error::Result;
use crate::memory::{Memory, MemoryStore, word_tags};
use crate::persona::{Persona, seed_memories};
use crate::random::RandomSource;
use crate::types::{DAY_MS, Emotion, MemoryId, MemorySource, Timestamp};

/// Version string written into exports.
pub const STATE_VERSION: &str = "seg-v3-mvp-0.1";

/// Per-state reply settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplySettings {
    /// How strongly the persona colours replies.
    pub persona_opacity: f32,
    /// Tendency toward metaphorical language.
    pub metaphor_bias: f32,
    /// Chance of interjecting a core belief.
    pub belief_interjection_prob: f32,
    /// Chance of a meta-awareness aside or prompt line.
    pub self_reference_prob: f32,
    /// Character cap on woven memory text in template replies.
    pub max_weave_chars: usize,
    /// Whether dreams are narrated back.
    pub narrate_dreams: bool,
    /// Fewer, more oblique memories per reply.
    pub subtlety_mode: bool,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self::from(&ReplyConfig::default())
    }
}

impl From<&ReplyConfig> for ReplySettings {
    fn from(config: &ReplyConfig) -> Self {
        Self {
            persona_opacity: config.persona_opacity,
            metaphor_bias: config.metaphor_bias,
            belief_interjection_prob: config.belief_interjection_prob,
            self_reference_prob: config.self_reference_prob,
            max_weave_chars: config.max_weave_chars,
            narrate_dreams: config.narrate_dreams,
            subtlety_mode: config.subtlety_mode,
        }
    }
}

/// Persona, memories, clock and settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegState {
    /// Format version, compared informationally on import.
    pub version: String,
    /// The simulated identity.
    pub persona: Persona,
    /// Memory store, newest first.
    pub memories: MemoryStore,
    /// The logical clock.
    pub last_tick: Timestamp,
    /// Reply settings.
    pub settings: ReplySettings,
}

impl SegState {
    /// A state for `persona` at `now`, seeded with its initial memories.
    pub fn new(persona: Persona, now: Timestamp, rng: &mut dyn RandomSource) -> Self {
        let memories = seed_memories(&persona, now, rng);
        Self {
            version: STATE_VERSION.to_string(),
            persona,
            memories,
            last_tick: now,
            settings: ReplySettings::default(),
        }
    }

    /// The built-in fallback persona at the wall clock.
    pub fn default_with(rng: &mut dyn RandomSource) -> Self {
        let persona = Persona::fallback(rng);
        Self::new(persona, Timestamp::wall_clock(), rng)
    }

    /// Replace the settings bundle.
    #[must_use]
    pub fn with_settings(mut self, settings: ReplySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Current logical time.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.last_tick
    }

    /// Move the clock forward one millisecond and return the new time.
    pub fn stamp(&mut self) -> Timestamp {
        self.last_tick = self.last_tick.plus_millis(1);
        self.last_tick
    }

    /// Advance simulated time by `elapsed_ms`.
    ///
    /// Decay runs against the clock as it stood before the advance, then the
    /// clock moves forward and the mood takes one random-walk step.
    pub fn advance_time(&mut self, elapsed_ms: u64, params: &DecayParams, rng: &mut dyn RandomSource) {
        decay_store(&mut self.memories, self.last_tick, elapsed_ms, params);
        self.last_tick = self.last_tick.plus_millis(elapsed_ms);
        self.persona.drift_mood(rng);
        debug!(elapsed_ms, now = self.last_tick.0, mood = self.persona.mood.display_label(), "Advanced time");
    }

    /// Advance simulated time by a number of days.
    pub fn tick_days(&mut self, days: f64, params: &DecayParams, rng: &mut dyn RandomSource) {
        let elapsed_ms = (days.max(0.0) * DAY_MS as f64) as u64;
        self.advance_time(elapsed_ms, params, rng);
    }

    /// Insert a user-authored memory.
    ///
    /// Tags are the first distinct words of the text.
    pub fn add_memory(&mut self, text: &str, source: MemorySource) -> Option<MemoryId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let now = self.stamp();
        let memory = Memory::new(
            text,
            word_tags(text),
            0.5,
            Emotion::new(0.1, 0.4, Some("noted")),
            source,
            now,
        );
        Some(self.memories.insert(memory))
    }

    /// Insert a fully formed memory.
    pub fn insert_memory(&mut self, memory: Memory) -> MemoryId {
        self.memories.insert(memory)
    }

    /// Replace a memory's text and tags.
    pub fn edit_memory(&mut self, id: &MemoryId, text: &str, tags: Vec<String>) -> bool {
        self.memories.edit(id, text, tags)
    }

    /// Reinforce a memory by a fixed amount.
    pub fn reinforce(&mut self, id: &MemoryId, amount: f32) -> bool {
        let now = self.stamp();
        self.memories.reinforce(id, amount, now)
    }

    /// Prune a memory. Anchors are refused.
    pub fn prune(&mut self, id: &MemoryId) -> bool {
        self.memories.prune(id)
    }

    /// Toggle the anchor flag.
    pub fn set_immutable(&mut self, id: &MemoryId, immutable: bool) -> bool {
        self.memories.set_immutable(id, immutable)
    }

    /// Salience-sorted memories matching `query`.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Memory> {
        self.memories.search(query)
    }

    /// Synthesize and insert a dream.
    ///
    /// # Errors
    ///
    /// [`crate::SegError::EmptyMemoryPool`] if there are no memories.
    pub fn dream(&mut self, intensity: f32, pool_size: usize, rng: &mut dyn RandomSource) -> Result<DreamOutcome> {
        let now = self.stamp();
        dream::dream(
            &mut self.memories,
            intensity,
            pool_size,
            self.settings.narrate_dreams,
            now,
            rng,
        )
    }

    /// Replace the persona and reseed memories from it.
    pub fn regenerate_persona(&mut self, persona: Persona, rng: &mut dyn RandomSource) {
        let now = self.now();
        self.memories = seed_memories(&persona, now, rng);
        info!(
            name = %persona.name,
            archetype = %persona.archetype,
            memories = self.memories.len(),
            "Persona regenerated"
        );
        self.persona = persona;
    }

    /// Toggle the persona's meta-awareness.
    pub fn set_meta_aware(&mut self, meta_aware: bool) {
        self.persona.set_meta_aware(meta_aware);
    }

    /// Replace the persona's core beliefs.
    pub fn set_core_beliefs(&mut self, beliefs: Vec<String>) {
        self.persona.set_core_beliefs(beliefs);
    }
}
