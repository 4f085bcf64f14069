//! Fixtures shared by the SEG benchmarks.

use seg_core::memory::{Memory, MemoryStore};
use seg_core::{DAY_MS, Emotion, MemorySource, Persona, SegState, SequenceRandom, Timestamp};

/// Clock used by every fixture.
pub const NOW: Timestamp = Timestamp(1_700_000_000_000);

const WORDS: [&str; 12] = [
    "river", "lantern", "harbor", "glue", "rain", "library", "stone", "bread", "pine", "salt",
    "bell", "ledger",
];

/// A deterministic memory: text and tags drawn from a fixed vocabulary.
#[must_use]
pub fn memory(i: usize) -> Memory {
    let a = WORDS[i % WORDS.len()];
    let b = WORDS[(i * 7 + 3) % WORDS.len()];
    let c = WORDS[(i * 5 + 1) % WORDS.len()];
    let age = (i as u64 % 400) * DAY_MS / 3;
    let mut m = Memory::new(
        format!("The {a} by the {b}, and a {c} I cannot forget. Entry {i}."),
        [a.to_string(), b.to_string()],
        (i % 10) as f32 / 10.0,
        Emotion::new(((i % 7) as f32 / 3.5) - 1.0, (i % 5) as f32 / 5.0, None),
        MemorySource::User,
        NOW.minus_millis(age),
    )
    .with_subtlety((i % 9) as f32 / 9.0)
    .with_association(0.3 + (i % 4) as f32 / 6.0);
    m.immutable = i % 11 == 0;
    m
}

/// A store of `n` fixture memories.
#[must_use]
pub fn store(n: usize) -> MemoryStore {
    MemoryStore::from_memories((0..n).map(memory).collect())
}

/// The fallback persona's state with `extra` fixture memories added.
#[must_use]
pub fn state(extra: usize) -> SegState {
    let mut rng = SequenceRandom::new(vec![0.1, 0.4, 0.7, 0.25, 0.9]);
    let persona = Persona::fallback(&mut rng);
    let mut state = SegState::new(persona, NOW, &mut rng);
    for i in 0..extra {
        state.insert_memory(memory(i));
    }
    state
}
