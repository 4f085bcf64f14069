//! Per-factor scoring functions for memory ranking.
//!
//! Score = salience × (0.4 + 0.6·Relatedness) × EmotionWeight × Subtlety × Recency
//!
//! Where:
//!   Relatedness(m)   = lexical overlap between the utterance and the memory
//!   EmotionWeight(m) = 1 + 0.3·arousal + 0.2·|valence|
//!   Subtlety(m)      = m.subtlety in subtlety mode, else a neutral 0.5
//!   Recency(m)       = exp(-ΔT / 30 days)
//!
//! Relatedness is a cheap bag-of-words heuristic, not semantic search. It
//! only sees literal token overlap; synonyms, inflections and paraphrase
//! score zero. That ceiling is accepted for an in-memory, sub-millisecond
//! ranker.

use std::collections::HashSet;

use crate::memory::Memory;
use crate::types::{DAY_MS, Timestamp};

/// Contribution of each tag found in the utterance.
pub const TAG_HIT_WEIGHT: f32 = 0.15;
/// Contribution of each memory-text word found in the utterance.
pub const WORD_HIT_WEIGHT: f32 = 0.02;
/// Emotional-vocabulary bonus, scaled by the memory's arousal.
pub const EMOTION_BONUS_WEIGHT: f32 = 0.1;
/// Words that make an utterance emotionally charged.
pub const EMOTIONAL_VOCABULARY: [&str; 5] = ["feel", "emotion", "mood", "heart", "soul"];
/// Neutral subtlety factor used outside subtlety mode.
pub const NEUTRAL_SUBTLETY: f64 = 0.5;
/// Default recency window for the ranker.
pub const RECENCY_WINDOW_DAYS: f64 = 30.0;

/// Lowercase, replace everything but `[a-z0-9]` and whitespace with spaces,
/// split on whitespace, collapse duplicates.
#[must_use]
pub fn tokenize(text: &str) -> HashSet<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().map(str::to_string).collect()
}

/// Relatedness of `memory` to `utterance`, in `[0, 1]`.
///
/// Every tag present in the utterance's token set adds
/// `0.15 × associationStrength`; every word of the memory's own text
/// (split on non-word characters) present in the token set adds
/// `0.02 × associationStrength`; an utterance containing emotional
/// vocabulary adds `0.1 × arousal`.
#[must_use]
pub fn relatedness(utterance: &str, memory: &Memory) -> f32 {
    let tokens = tokenize(utterance);
    relatedness_with_tokens(utterance, &tokens, memory)
}

/// [`relatedness`] with a pre-tokenized utterance, for ranking many memories.
#[must_use]
pub fn relatedness_with_tokens(utterance: &str, tokens: &HashSet<String>, memory: &Memory) -> f32 {
    let assoc = memory.association_strength;
    let mut score = 0.0_f32;

    for tag in &memory.tags {
        if tokens.contains(&tag.to_lowercase()) {
            score += TAG_HIT_WEIGHT * assoc;
        }
    }

    let text = memory.text.to_lowercase();
    for word in text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
    {
        if tokens.contains(word) {
            score += WORD_HIT_WEIGHT * assoc;
        }
    }

    if is_emotionally_charged(utterance) {
        score += EMOTION_BONUS_WEIGHT * memory.emotion.arousal;
    }

    score.clamp(0.0, 1.0)
}

/// Whether the utterance contains any emotional-vocabulary word (substring).
#[must_use]
pub fn is_emotionally_charged(utterance: &str) -> bool {
    let lower = utterance.to_lowercase();
    EMOTIONAL_VOCABULARY.iter().any(|w| lower.contains(w))
}

/// `1 + 0.3·arousal + 0.2·|valence|`.
#[must_use]
pub fn emotion_weight(memory: &Memory) -> f64 {
    1.0 + 0.3 * f64::from(memory.emotion.arousal) + 0.2 * f64::from(memory.emotion.valence.abs())
}

/// The memory's subtlety in subtlety mode, otherwise [`NEUTRAL_SUBTLETY`].
#[must_use]
pub fn subtlety_factor(memory: &Memory, subtlety_mode: bool) -> f64 {
    if subtlety_mode {
        f64::from(memory.subtlety)
    } else {
        NEUTRAL_SUBTLETY
    }
}

/// `exp(-(now - lastReinforced) / window)`.
#[must_use]
pub fn recency(memory: &Memory, now: Timestamp, window_days: f64) -> f64 {
    let window_ms = window_days.max(f64::EPSILON) * DAY_MS as f64;
    let elapsed = now.millis_since(memory.last_reinforced) as f64;
    (-elapsed / window_ms).exp()
}
