//! The persona: a stable identity spine plus a transient mood.
//!
//! Identity fields are fixed when a persona is generated. They only change
//! through explicit edits (beliefs, meta-awareness) or by replacing the
//! whole persona. Mood random-walks each time the caller advances time.

pub mod archetype;
pub mod generator;
pub mod seed;

pub use archetype::{ARCHETYPES, Archetype};
pub use generator::{PersonaGenerator, PersonaParse};
pub use seed::seed_memories;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::random::{RandomSource, pick};
use crate::types::{Emotion, clamp01};

/// Four sensory anchors that ground the persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensoryAnchors {
    /// Dominant scent memory.
    pub scent: String,
    /// Sound that evokes home.
    pub sound: String,
    /// Tactile association.
    pub touch: String,
    /// Taste tied to identity.
    pub taste: String,
}

impl SensoryAnchors {
    /// `(sense, anchor)` pairs in a fixed order.
    #[must_use]
    pub fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            ("scent", self.scent.as_str()),
            ("sound", self.sound.as_str()),
            ("touch", self.touch.as_str()),
            ("taste", self.taste.as_str()),
        ]
    }
}

/// Response-style sliders, each in `[0, 1]`, fixed at generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStyle {
    /// Lower means more oblique.
    pub directness: f32,
    /// Tendency toward metaphor.
    pub metaphor_tendency: f32,
    /// Tendency toward self-reflection.
    pub introspection: f32,
    /// Lower means more concise.
    pub verbosity: f32,
}

impl Default for ResponseStyle {
    fn default() -> Self {
        Self {
            directness: 0.4,
            metaphor_tendency: 0.7,
            introspection: 0.6,
            verbosity: 0.3,
        }
    }
}

impl ResponseStyle {
    /// Random sliders biased toward subtle, concise personas.
    pub fn random(rng: &mut dyn RandomSource) -> Self {
        Self {
            directness: (0.3 + rng.next_unit() * 0.4) as f32,
            metaphor_tendency: (0.4 + rng.next_unit() * 0.4) as f32,
            introspection: (0.3 + rng.next_unit() * 0.5) as f32,
            verbosity: (0.2 + rng.next_unit() * 0.4) as f32,
        }
    }
}

/// The simulated identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    /// Display name.
    pub name: String,
    /// Age in years.
    pub age: u32,
    /// Trade or calling.
    pub profession: String,
    /// Where they live.
    pub location: String,
    /// Life-earned principles.
    pub core_beliefs: Vec<String>,
    /// Characteristic phrases.
    pub linguistic_tics: Vec<String>,
    /// Defining emotional theme.
    pub emotional_core: String,
    /// Whether the persona may acknowledge its constructed nature.
    pub meta_aware: bool,
    /// Current transient mood.
    pub mood: Emotion,
    /// Sensory grounding.
    pub sensory_anchors: SensoryAnchors,
    /// Archetype category.
    pub archetype: String,
    /// Formative experiences; each becomes a core anchor memory.
    pub backstory_elements: Vec<String>,
    /// Style sliders.
    #[serde(default)]
    pub response_style: ResponseStyle,
}

impl Persona {
    /// The built-in persona used when nothing else is available.
    pub fn fallback(rng: &mut dyn RandomSource) -> Self {
        let archetype = pick(rng, &ARCHETYPES).map_or("wanderer", |a| a.category);
        Self {
            name: "River Sage".to_string(),
            age: 58,
            profession: "contemplative wanderer".to_string(),
            location: "mountain valley library".to_string(),
            core_beliefs: strings(&[
                "Understanding emerges in quiet moments",
                "Every story contains infinite stories",
                "Wisdom flows like water, finding its level",
            ]),
            linguistic_tics: strings(&["flowing through", "catching light", "settling into silence"]),
            emotional_core: "A deep well of experience that colors everything with gentle wisdom"
                .to_string(),
            meta_aware: true,
            mood: Emotion::new(0.2, 0.3, Some("contemplative")),
            sensory_anchors: SensoryAnchors {
                scent: "mountain pine and old parchment".to_string(),
                sound: "distant water over stones".to_string(),
                touch: "smooth river rocks".to_string(),
                taste: "green tea and morning air".to_string(),
            },
            archetype: archetype.to_string(),
            backstory_elements: strings(&[
                "Years spent listening to travelers' stories",
                "A library built from contributions of passing wanderers",
                "Understanding gained through patient observation",
            ]),
            response_style: ResponseStyle::default(),
        }
    }

    /// Random-walk the mood one step.
    ///
    /// `valence' = clamp01(valence + U(-0.1, 0.1)) × (±1)`,
    /// `arousal' = clamp01(arousal + U(-0.1, 0.1))`, and the label is
    /// recomputed from the new values by the quadrant rule.
    ///
    /// The valence clamp runs before the random sign, so a negative mood
    /// is pulled up to at most 0.1 before the coin flip.
    pub fn drift_mood(&mut self, rng: &mut dyn RandomSource) {
        let valence_step = rng.range(-0.1, 0.1) as f32;
        let sign = rng.sign();
        let arousal_step = rng.range(-0.1, 0.1) as f32;

        let valence = clamp01(self.mood.valence + valence_step) * sign;
        let arousal = clamp01(self.mood.arousal + arousal_step);
        let label = Emotion::quadrant_label(valence, arousal);

        debug!(
            from = self.mood.display_label(),
            to = label,
            valence,
            arousal,
            "Mood drifted"
        );
        self.mood = Emotion {
            valence,
            arousal,
            label: Some(label.to_string()),
        };
    }

    /// Toggle meta-awareness.
    pub fn set_meta_aware(&mut self, meta_aware: bool) {
        self.meta_aware = meta_aware;
    }

    /// Replace the core beliefs, dropping blank entries.
    pub fn set_core_beliefs(&mut self, beliefs: Vec<String>) {
        self.core_beliefs = beliefs
            .into_iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();
    }

    /// One-line summary, e.g. for library descriptions.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "A {} with {}",
            self.profession,
            self.core_beliefs.join(", ").to_lowercase()
        )
    }
}

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
