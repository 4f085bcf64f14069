//! Dream synthesis: recombining salient memories into a new one.
//!
//! Three memories are drawn (with replacement) from the most salient few and
//! braided into a single sentence. The result is an ordinary persona memory;
//! it can be ranked, reinforced and pruned like any other.

use tracing::info;

use crate::error::{Result, SegError};
use crate::memory::{Memory, MemoryStore, normalize_tags};
use crate::random::RandomSource;
use crate::types::{Emotion, MemoryId, MemorySource, Timestamp, clamp01};

/// Default number of top-salience memories sampled from.
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Tag every dream carries (unless crowded out by the cap).
pub const DREAM_TAG: &str = "dream";

/// Label of a dream's emotion.
pub const DREAM_LABEL: &str = "dreamt";

/// A dream after insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct DreamOutcome {
    /// Id of the inserted memory.
    pub id: MemoryId,
    /// The dream memory as inserted.
    pub memory: Memory,
    /// `"I dreamt: ..."`, when dream narration is on.
    pub narration: Option<String>,
}

/// Narration line for a dream memory.
#[must_use]
pub fn narrate(memory: &Memory) -> String {
    format!("I dreamt: {}", memory.text)
}

/// Synthesize a dream from `store` without inserting it.
///
/// `salience = clamp01(mean(picks) × (0.7 + 0.3 × intensity))`, valence is
/// the mean of the first two picks and arousal is fixed at 0.6.
///
/// # Errors
///
/// [`SegError::EmptyMemoryPool`] if the store is empty.
pub fn synthesize(
    store: &MemoryStore,
    intensity: f32,
    pool_size: usize,
    now: Timestamp,
    rng: &mut dyn RandomSource,
) -> Result<Memory> {
    let pool = store.top_salient(pool_size.max(1));
    if pool.is_empty() {
        return Err(SegError::EmptyMemoryPool { operation: "dream" });
    }

    let a = pool[rng.index(pool.len())];
    let b = pool[rng.index(pool.len())];
    let c = pool[rng.index(pool.len())];

    let opening = a.text.split('.').next().unwrap_or_default().trim();
    let text = format!(
        "{opening}, braided with {}, and then {} like a coastline redrawn.",
        b.text.to_lowercase(),
        c.text.to_lowercase()
    );

    let tags = normalize_tags(
        a.tags
            .iter()
            .chain(&b.tags)
            .chain(&c.tags)
            .cloned()
            .chain(std::iter::once(DREAM_TAG.to_string())),
    );

    let intensity = clamp01(intensity);
    let mean = (a.salience + b.salience + c.salience) / 3.0;
    let salience = clamp01(mean * (0.7 + 0.3 * intensity));
    let valence = (a.emotion.valence + b.emotion.valence) / 2.0;

    Ok(Memory::new(
        text,
        tags,
        salience,
        Emotion::new(valence, 0.6, Some(DREAM_LABEL)),
        MemorySource::Persona,
        now,
    )
    .with_id_prefix("d"))
}

/// Synthesize a dream and insert it at the front of `store`.
///
/// # Errors
///
/// [`SegError::EmptyMemoryPool`] if the store is empty.
pub fn dream(
    store: &mut MemoryStore,
    intensity: f32,
    pool_size: usize,
    narrate_dreams: bool,
    now: Timestamp,
    rng: &mut dyn RandomSource,
) -> Result<DreamOutcome> {
    let memory = synthesize(store, intensity, pool_size, now, rng)?;
    let narration = narrate_dreams.then(|| narrate(&memory));
    let id = store.insert(memory.clone());
    info!(memory = %id, salience = memory.salience, tags = ?memory.tags, "Dreamt");
    Ok(DreamOutcome {
        id: id.clone(),
        memory: Memory { id, ..memory },
        narration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{SeededRandom, SequenceRandom};

    fn memory(text: &str, tags: &[&str], salience: f32, valence: f32) -> Memory {
        Memory::new(
            text,
            tags.iter().map(|t| (*t).to_string()),
            salience,
            Emotion::new(valence, 0.2, None),
            MemorySource::Persona,
            Timestamp(0),
        )
    }

    fn store() -> MemoryStore {
        MemoryStore::from_memories(vec![
            memory("The lighthouse hums. It never sleeps.", &["light", "sea"], 0.9, 0.4),
            memory("Salt On The Window", &["salt", "window"], 0.8, -0.2),
            memory("A gull with one foot", &["gull"], 0.7, 0.0),
            memory("faint", &["low"], 0.1, 0.0),
        ])
    }

    #[test]
    fn empty_store_is_an_error() {
        let err = synthesize(&MemoryStore::new(), 0.6, 5, Timestamp(0), &mut SequenceRandom::constant(0.0));
        assert!(matches!(err, Err(SegError::EmptyMemoryPool { .. })));
    }

    #[test]
    fn braids_three_picks() {
        // picks: index 0, 1, 2 of the salience-sorted pool
        let mut rng = SequenceRandom::new(vec![0.0, 0.4, 0.7]);
        let dream = synthesize(&store(), 1.0, 3, Timestamp(7), &mut rng).expect("dream");
        assert_eq!(
            dream.text,
            "The lighthouse hums, braided with salt on the window, and then a gull with one foot like a coastline redrawn."
        );
        assert_eq!(dream.tags, vec!["light", "sea", "salt", "window", "gull", "dream"]);
        assert!((dream.salience - 0.8).abs() < 1e-5);
        assert!((dream.emotion.valence - 0.1).abs() < 1e-6);
        assert!((dream.emotion.arousal - 0.6).abs() < 1e-6);
        assert_eq!(dream.emotion.label.as_deref(), Some("dreamt"));
        assert_eq!(dream.source, MemorySource::Persona);
        assert!(!dream.immutable);
        assert!(dream.id.as_str().starts_with("d_"));
    }

    #[test]
    fn low_intensity_dims_the_dream() {
        let mut rng = SequenceRandom::constant(0.0);
        let dream = synthesize(&store(), 0.0, 5, Timestamp(0), &mut rng).expect("dream");
        assert!((dream.salience - 0.9 * 0.7).abs() < 1e-5);
    }

    #[test]
    fn dream_tag_can_be_crowded_out() {
        let mut s = MemoryStore::new();
        s.insert(memory("x", &["a", "b", "c", "d", "e", "f"], 0.9, 0.0));
        let dream = synthesize(&s, 0.5, 5, Timestamp(0), &mut SequenceRandom::constant(0.0)).expect("dream");
        assert_eq!(dream.tags.len(), 6);
        assert!(!dream.has_tag(DREAM_TAG));
    }

    #[test]
    fn dream_inserts_and_narrates() {
        let mut s = store();
        let before = s.len();
        let outcome = dream(&mut s, 0.6, 5, true, Timestamp(3), &mut SeededRandom::seeded(1)).expect("dream");
        assert_eq!(s.len(), before + 1);
        assert_eq!(s.as_slice()[0].id, outcome.id);
        assert_eq!(outcome.narration, Some(format!("I dreamt: {}", outcome.memory.text)));

        let quiet = dream(&mut s, 0.6, 5, false, Timestamp(4), &mut SeededRandom::seeded(2)).expect("dream");
        assert!(quiet.narration.is_none());
    }
}
