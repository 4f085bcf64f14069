//! Core type definitions shared by every SEG module.
//!
//! All types are serializable; the JSON shape (camelCase) is the export
//! format of a [`SegState`](crate::state::SegState).

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Milliseconds in one simulated day.
pub const DAY_MS: u64 = 86_400_000;

/// Clamp a value into `[0, 1]`.
#[must_use]
pub fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Opaque, immutable identifier of a memory.
///
/// Serialized as a plain string so exported state keeps ids stable across
/// an export/import round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(pub String);

impl MemoryId {
    /// Create a fresh random id with the given prefix (`m_…`, `d_…`).
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        Self(format!("{prefix}_{}", &raw[..12]))
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemoryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A point on the simulated logical clock, in milliseconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Wall-clock "now" as epoch milliseconds. Only used to seed a new clock.
    #[must_use]
    pub fn wall_clock() -> Self {
        Self(u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0))
    }

    /// Milliseconds elapsed since `earlier` (zero if `earlier` is later).
    #[must_use]
    pub fn millis_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Simulated days elapsed since `earlier`.
    #[must_use]
    pub fn days_since(self, earlier: Self) -> f64 {
        self.millis_since(earlier) as f64 / DAY_MS as f64
    }

    /// This timestamp moved forward by `ms`.
    #[must_use]
    pub fn plus_millis(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    /// This timestamp moved back by `ms`, saturating at zero.
    #[must_use]
    pub fn minus_millis(self, ms: u64) -> Self {
        Self(self.0.saturating_sub(ms))
    }
}

// ---------------------------------------------------------------------------
// Emotion
// ---------------------------------------------------------------------------

/// Valence/arousal emotion attached to memories and to the persona's mood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emotion {
    /// Unpleasant (-1.0) to pleasant (+1.0).
    pub valence: f32,
    /// Calm (0.0) to excited (1.0).
    pub arousal: f32,
    /// Optional human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Emotion {
    /// Build an emotion, clamping valence to `[-1, 1]` and arousal to `[0, 1]`.
    #[must_use]
    pub fn new(valence: f32, arousal: f32, label: Option<&str>) -> Self {
        Self {
            valence: valence.clamp(-1.0, 1.0),
            arousal: clamp01(arousal),
            label: label.map(str::to_string),
        }
    }

    /// Label derived from the fixed valence/arousal quadrant rule.
    #[must_use]
    pub fn quadrant_label(valence: f32, arousal: f32) -> &'static str {
        let positive = valence >= 0.0;
        if arousal < 0.2 {
            if positive { "calm" } else { "somber" }
        } else if arousal < 0.5 {
            if positive { "reflective" } else { "wistful" }
        } else if positive {
            "energized"
        } else {
            "agitated"
        }
    }

    /// The label to show for this emotion, falling back to "neutral".
    #[must_use]
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("neutral")
    }
}

impl Default for Emotion {
    fn default() -> Self {
        Self {
            valence: 0.0,
            arousal: 0.0,
            label: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Who produced a memory. Never changes after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    /// Injected by the person talking to the persona.
    User,
    /// Part of the persona: backstory, sensory anchors, dreams.
    Persona,
    /// Synthesized by the engine after an interaction.
    System,
}

impl fmt::Display for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Persona => "persona",
            Self::System => "system",
        })
    }
}

// ---------------------------------------------------------------------------
// Ranking score
// ---------------------------------------------------------------------------

/// Composite score used to rank memories for a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RankScore(pub OrderedFloat<f64>);

impl RankScore {
    /// Create a rank score from a raw f64.
    #[must_use]
    pub fn new(score: f64) -> Self {
        Self(OrderedFloat(score))
    }

    /// Get the raw score value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadrant_labels() {
        assert_eq!(Emotion::quadrant_label(0.1, 0.1), "calm");
        assert_eq!(Emotion::quadrant_label(-0.1, 0.1), "somber");
        assert_eq!(Emotion::quadrant_label(0.0, 0.3), "reflective");
        assert_eq!(Emotion::quadrant_label(-0.4, 0.49), "wistful");
        assert_eq!(Emotion::quadrant_label(0.9, 0.5), "energized");
        assert_eq!(Emotion::quadrant_label(-0.9, 0.9), "agitated");
    }

    #[test]
    fn generated_ids_are_unique_and_prefixed() {
        let a = MemoryId::generate("m");
        let b = MemoryId::generate("m");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("m_"));
    }

    #[test]
    fn timestamp_days() {
        let t0 = Timestamp(0);
        let t1 = t0.plus_millis(DAY_MS * 3);
        assert!((t1.days_since(t0) - 3.0).abs() < 1e-9);
        assert_eq!(t0.days_since(t1), 0.0);
    }

    #[test]
    fn memory_source_serializes_lowercase() {
        let json = serde_json::to_string(&MemorySource::Persona).expect("serialize");
        assert_eq!(json, "\"persona\"");
    }
}
