//! Property-based tests for the memory engine.
//!
//! Salience bounds, anchor protection, ranking size and dream shape must
//! hold for arbitrary inputs and random sequences.

use proptest::prelude::*;

use seg_core::decay::{DecayParams, decay_store};
use seg_core::dream::synthesize;
use seg_core::memory::{MAX_TAGS, Memory, MemoryStore};
use seg_core::retrieval::Ranker;
use seg_core::retrieval::scoring::relatedness;
use seg_core::{DAY_MS, Emotion, MemorySource, SeededRandom, Timestamp};

const T0: Timestamp = Timestamp(1_000_000_000_000);

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_tags() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{2,8}", 0..10)
}

fn arb_memory() -> impl Strategy<Value = Memory> {
    (
        "[a-z ]{1,60}",
        arb_tags(),
        0.0..1.0f32,
        -1.0..1.0f32,
        0.0..1.0f32,
        any::<bool>(),
        0..(400 * DAY_MS),
        0.0..1.0f32,
        0.0..1.0f32,
    )
        .prop_map(|(text, tags, salience, valence, arousal, immutable, age, subtlety, assoc)| {
            let mut memory = Memory::new(
                text,
                tags,
                salience,
                Emotion::new(valence, arousal, None),
                MemorySource::User,
                T0.minus_millis(age),
            )
            .with_subtlety(subtlety)
            .with_association(assoc);
            memory.immutable = immutable;
            memory
        })
}

fn arb_store() -> impl Strategy<Value = MemoryStore> {
    prop::collection::vec(arb_memory(), 0..30).prop_map(MemoryStore::from_memories)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn tags_are_capped_and_lowercase(memory in arb_memory()) {
        prop_assert!(memory.tags.len() <= MAX_TAGS);
        for tag in &memory.tags {
            prop_assert_eq!(tag, &tag.to_lowercase());
        }
    }

    #[test]
    fn decay_keeps_salience_in_bounds(mut store in arb_store(), days in 0u64..2000) {
        let params = DecayParams::default();
        decay_store(&mut store, T0, days * DAY_MS, &params);
        for memory in store.iter() {
            prop_assert!((params.floor..=1.0).contains(&memory.salience));
        }
    }

    #[test]
    fn prune_never_removes_anchors(mut store in arb_store()) {
        let ids: Vec<_> = store.iter().map(|m| (m.id.clone(), m.immutable)).collect();
        for (id, immutable) in &ids {
            prop_assert_eq!(store.prune(id), !immutable);
        }
        prop_assert!(store.iter().all(|m| m.immutable));
        prop_assert_eq!(store.len(), ids.iter().filter(|(_, i)| *i).count());
    }

    #[test]
    fn reinforcement_moves_time_forward(mut store in arb_store(), amount in 0.0..1.0f32) {
        let ids: Vec<_> = store.iter().map(|m| m.id.clone()).collect();
        for id in &ids {
            let before = store.get(id).map(|m| (m.salience, m.last_reinforced));
            prop_assert!(store.reinforce(id, amount, T0.minus_millis(DAY_MS)));
            let (salience, reinforced) = before.expect("present");
            let after = store.get(id).expect("present");
            prop_assert!(after.salience >= salience);
            prop_assert!(after.salience <= 1.0);
            prop_assert!(after.last_reinforced > reinforced);
        }
    }

    #[test]
    fn relatedness_is_a_unit_score(memory in arb_memory(), utterance in "[a-zA-Z ,.!?]{0,80}") {
        let score = relatedness(&utterance, &memory);
        prop_assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn ranking_is_bounded_and_sorted(
        store in arb_store(),
        utterance in "[a-z ]{0,40}",
        subtle in any::<bool>(),
    ) {
        let ranking = Ranker::new(subtle).rank(&store, &utterance, T0);
        let k = if subtle { 2 } else { 3 };
        prop_assert_eq!(ranking.memories.len(), store.len().min(k));
        for pair in ranking.memories.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn dreams_are_well_formed(
        memories in prop::collection::vec(arb_memory(), 1..20),
        intensity in 0.0..1.0f32,
        seed in any::<u64>(),
    ) {
        let store = MemoryStore::from_memories(memories);
        let mut rng = SeededRandom::seeded(seed);
        let dream = synthesize(&store, intensity, 5, T0, &mut rng).expect("non-empty pool");
        prop_assert!(dream.tags.len() <= MAX_TAGS);
        prop_assert!((0.0..=1.0).contains(&dream.salience));
        prop_assert!((dream.emotion.arousal - 0.6).abs() < f32::EPSILON);
        prop_assert_eq!(dream.source, MemorySource::Persona);
        prop_assert!(!dream.immutable);
    }

    #[test]
    fn same_seed_same_dream_text(
        memories in prop::collection::vec(arb_memory(), 1..10),
        seed in any::<u64>(),
    ) {
        let store = MemoryStore::from_memories(memories);
        let a = synthesize(&store, 0.5, 5, T0, &mut SeededRandom::seeded(seed)).expect("dream");
        let b = synthesize(&store, 0.5, 5, T0, &mut SeededRandom::seeded(seed)).expect("dream");
        prop_assert_eq!(a.text, b.text);
        prop_assert_eq!(a.tags, b.tags);
    }
}
