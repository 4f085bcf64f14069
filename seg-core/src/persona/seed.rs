//! Initial memories derived from a persona.

use crate::interaction::concept_tags;
use crate::memory::{Memory, MemoryStore};
use crate::persona::Persona;
use crate::random::RandomSource;
use crate::types::{DAY_MS, Emotion, MemorySource, Timestamp};

const YEAR_MS: u64 = DAY_MS * 365;

/// Build the starting store for `persona` at `now`.
///
/// Each backstory element becomes a core anchor backdated `10 + 5i` years.
/// Each sensory anchor becomes an ordinary, very subtle memory backdated
/// thirty days. Anchors come first.
pub fn seed_memories(persona: &Persona, now: Timestamp, rng: &mut dyn RandomSource) -> MemoryStore {
    let mut memories = Vec::with_capacity(persona.backstory_elements.len() + 4);

    for (i, element) in persona.backstory_elements.iter().enumerate() {
        let salience = 0.8 + rng.next_unit() as f32 * 0.2;
        let valence = -0.1 + rng.next_unit() as f32 * 0.4;
        let arousal = 0.2 + rng.next_unit() as f32 * 0.3;
        let years = 10 + 5 * i as u64;
        memories.push(
            Memory::new(
                element.clone(),
                concept_tags(element),
                salience,
                Emotion::new(valence, arousal, Some("foundational")),
                MemorySource::Persona,
                now,
            )
            .created(now.minus_millis(YEAR_MS * years))
            .anchored()
            .with_subtlety(0.8)
            .with_association(0.9),
        );
    }

    for (sense, anchor) in persona.sensory_anchors.pairs() {
        memories.push(
            Memory::new(
                format!("The {sense} of {anchor} carries deep resonance"),
                [sense, "sensory", "anchor"].map(String::from),
                0.7,
                Emotion::new(0.3, 0.2, Some("grounding")),
                MemorySource::Persona,
                now,
            )
            .created(now.minus_millis(DAY_MS * 30))
            .with_subtlety(0.9)
            .with_association(0.8),
        );
    }

    MemoryStore::from_memories(memories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SequenceRandom;

    #[test]
    fn seeds_anchors_then_senses() {
        let mut rng = SequenceRandom::constant(0.5);
        let persona = Persona::fallback(&mut rng);
        let now = Timestamp(YEAR_MS * 40);
        let store = seed_memories(&persona, now, &mut rng);

        assert_eq!(store.len(), 7);
        assert_eq!(store.anchor_count(), 3);

        let first = &store.as_slice()[0];
        assert!(first.immutable);
        assert_eq!(first.created_at, now.minus_millis(YEAR_MS * 10));
        assert_eq!(first.last_reinforced, now);
        assert!((first.salience - 0.9).abs() < 1e-6);
        assert_eq!(first.emotion.label.as_deref(), Some("foundational"));

        let third = &store.as_slice()[2];
        assert_eq!(third.created_at, now.minus_millis(YEAR_MS * 20));

        let scent = &store.as_slice()[3];
        assert!(!scent.immutable);
        assert_eq!(
            scent.text,
            "The scent of mountain pine and old parchment carries deep resonance"
        );
        assert_eq!(scent.tags, vec!["scent", "sensory", "anchor"]);
        assert!((scent.subtlety - 0.9).abs() < 1e-6);
    }
}
