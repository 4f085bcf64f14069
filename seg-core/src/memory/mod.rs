//! The [`Memory`] record and the [`MemoryStore`] that owns them.
//!
//! A memory is a discrete unit of simulated episodic content: some text, a
//! handful of lowercase tags, a salience (retrieval strength), an emotion
//! and a provenance. Core anchors (`immutable`) are protected from pruning
//! and decay roughly twenty times slower than ordinary memories.

pub mod store;

pub use store::MemoryStore;

use serde::{Deserialize, Serialize};

use crate::types::{Emotion, MemoryId, MemorySource, Timestamp, clamp01};

/// Maximum number of tags a memory carries.
pub const MAX_TAGS: usize = 6;

/// A single memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    /// Unique identifier, fixed at creation.
    pub id: MemoryId,
    /// Free-form content.
    pub text: String,
    /// Lowercase keywords, at most [`MAX_TAGS`].
    pub tags: Vec<String>,
    /// Current retrieval strength (0.0 to 1.0).
    pub salience: f32,
    /// Emotion associated with the content.
    pub emotion: Emotion,
    /// When the memory was formed.
    pub created_at: Timestamp,
    /// When the memory was last reinforced. Never earlier than `created_at`.
    pub last_reinforced: Timestamp,
    /// Core anchor: never pruned, decays slowly.
    #[serde(default)]
    pub immutable: bool,
    /// Who produced this memory.
    pub source: MemorySource,
    /// How obliquely the memory should surface (0 = literal, 1 = oblique).
    #[serde(default = "default_half")]
    pub subtlety: f32,
    /// Multiplier on lexical relatedness contributions.
    #[serde(default = "default_half")]
    pub association_strength: f32,
}

fn default_half() -> f32 {
    0.5
}

impl Memory {
    /// Create a memory formed at `now` with neutral subtlety and association.
    ///
    /// Tags are lowercased, de-duplicated and capped at [`MAX_TAGS`];
    /// salience is clamped into `[0, 1]`.
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        tags: impl IntoIterator<Item = String>,
        salience: f32,
        emotion: Emotion,
        source: MemorySource,
        now: Timestamp,
    ) -> Self {
        Self {
            id: MemoryId::generate("m"),
            text: text.into(),
            tags: normalize_tags(tags),
            salience: clamp01(salience),
            emotion,
            created_at: now,
            last_reinforced: now,
            immutable: false,
            source,
            subtlety: 0.5,
            association_strength: 0.5,
        }
    }

    /// Mark this memory as a core anchor.
    #[must_use]
    pub fn anchored(mut self) -> Self {
        self.immutable = true;
        self
    }

    /// Set the subtlety (clamped).
    #[must_use]
    pub fn with_subtlety(mut self, subtlety: f32) -> Self {
        self.subtlety = clamp01(subtlety);
        self
    }

    /// Set the association strength (clamped).
    #[must_use]
    pub fn with_association(mut self, strength: f32) -> Self {
        self.association_strength = clamp01(strength);
        self
    }

    /// Back-date the creation time. `last_reinforced` is left alone, so the
    /// memory still reads as recently rehearsed.
    #[must_use]
    pub fn created(mut self, at: Timestamp) -> Self {
        self.created_at = at.min(self.last_reinforced);
        self
    }

    /// Set the last reinforcement time, never earlier than creation.
    #[must_use]
    pub fn reinforced_at(mut self, at: Timestamp) -> Self {
        self.last_reinforced = at.max(self.created_at);
        self
    }

    /// Replace the id prefix (dreams use `d_…`).
    #[must_use]
    pub fn with_id_prefix(mut self, prefix: &str) -> Self {
        self.id = MemoryId::generate(prefix);
        self
    }

    /// Whether any tag matches case-insensitively.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Lowercase, trim, drop empties and duplicates (first occurrence wins),
/// cap at [`MAX_TAGS`].
pub fn normalize_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(MAX_TAGS);
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || out.contains(&tag) {
            continue;
        }
        out.push(tag);
        if out.len() == MAX_TAGS {
            break;
        }
    }
    out
}

/// Tags for a free-text memory typed in by a user: the first distinct words.
#[must_use]
pub fn word_tags(text: &str) -> Vec<String> {
    normalize_tags(
        text.split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| !w.is_empty())
            .map(str::to_string),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_normalized_and_capped() {
        let tags = normalize_tags(
            ["Rain", "rain", " Map ", "", "a", "b", "c", "d", "e"]
                .into_iter()
                .map(String::from),
        );
        assert_eq!(tags, vec!["rain", "map", "a", "b", "c", "d"]);
    }

    #[test]
    fn word_tags_split_on_punctuation() {
        let tags = word_tags("The smell of glue, after rain!");
        assert_eq!(tags, vec!["the", "smell", "of", "glue", "after", "rain"]);
    }

    #[test]
    fn new_memory_clamps_salience() {
        let m = Memory::new("x", vec![], 3.0, Emotion::default(), MemorySource::User, Timestamp(5));
        assert!((m.salience - 1.0).abs() < f32::EPSILON);
        assert_eq!(m.created_at, m.last_reinforced);
        assert!(!m.immutable);
    }

    #[test]
    fn created_never_after_reinforced() {
        let m = Memory::new("x", vec![], 0.5, Emotion::default(), MemorySource::User, Timestamp(100))
            .created(Timestamp(500));
        assert!(m.last_reinforced >= m.created_at);
    }

    #[test]
    fn older_exports_default_subtlety_and_association() {
        let json = r#"{
            "id": "m_old", "text": "Smell of glue", "tags": ["scent"],
            "salience": 0.74, "emotion": {"valence": 0.3, "arousal": 0.2},
            "createdAt": 1, "lastReinforced": 2, "source": "persona"
        }"#;
        let m: Memory = serde_json::from_str(json).expect("parse");
        assert!((m.subtlety - 0.5).abs() < f32::EPSILON);
        assert!((m.association_strength - 0.5).abs() < f32::EPSILON);
        assert!(!m.immutable);
    }
}
