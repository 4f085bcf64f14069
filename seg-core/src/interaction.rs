//! Turning a finished exchange into a new memory.

use std::sync::LazyLock;

use regex::Regex;

use crate::memory::{MAX_TAGS, Memory};
use crate::persona::Persona;
use crate::random::RandomSource;
use crate::types::{Emotion, MemorySource, Timestamp};

/// Reply text kept in an interaction memory, in characters.
pub const MAX_MEMORY_TEXT_CHARS: usize = 200;

/// Concept vocabulary scanned for tags.
pub const CONCEPTS: [&str; 24] = [
    "memory",
    "time",
    "change",
    "loss",
    "growth",
    "understanding",
    "beauty",
    "truth",
    "connection",
    "solitude",
    "journey",
    "home",
    "work",
    "art",
    "nature",
    "people",
    "learning",
    "wisdom",
    "fear",
    "hope",
    "love",
    "meaning",
    "purpose",
    "death",
];

/// Tags that mark a weighty exchange and push subtlety up.
const DEEP_TAGS: [&str; 5] = ["philosophy", "meaning", "purpose", "death", "love"];

static NOSTALGIA: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(miss|lost|gone|past|remember)\b").ok());
static ANTICIPATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(future|hope|dream|will|might)\b").ok());
static CHALLENGE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(difficult|hard|struggle|pain)\b").ok());

/// Extract concept and affect tags from free text.
///
/// A concept matches when the lowercased text contains the concept, its
/// plural, or the concept minus its last character (a crude stem, so "art"
/// also matches "are"). Affect tags (`nostalgia`, `anticipation`,
/// `challenge`) come from whole-word cues. At most [`MAX_TAGS`] are kept,
/// concepts first.
#[must_use]
pub fn concept_tags(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut tags: Vec<String> = CONCEPTS
        .iter()
        .filter(|concept| {
            let stem = &concept[..concept.len() - 1];
            lower.contains(*concept) || lower.contains(&format!("{concept}s")) || lower.contains(stem)
        })
        .map(|c| (*c).to_string())
        .collect();

    for (pattern, tag) in [
        (&NOSTALGIA, "nostalgia"),
        (&ANTICIPATION, "anticipation"),
        (&CHALLENGE, "challenge"),
    ] {
        if pattern.as_ref().is_some_and(|re| re.is_match(&lower)) {
            tags.push(tag.to_string());
        }
    }

    tags.truncate(MAX_TAGS);
    tags
}

/// Truncate to `max` characters, appending `...` if anything was cut.
#[must_use]
pub fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

/// Build the memory recording one exchange.
///
/// Tags and subtlety are computed from `"{user} → {reply}"`; the stored text
/// is the reply alone, truncated. Subtlety rises with introspection, a calm
/// mood and weighty topics:
/// `min(0.9, 0.4·introspection + (arousal < 0.3 ? 0.4 : 0.2) + (deep ? 0.3 : 0.1))`.
pub fn interaction_memory(
    utterance: &str,
    reply: &str,
    persona: &Persona,
    now: Timestamp,
    rng: &mut dyn RandomSource,
) -> Memory {
    let combined = format!("{utterance} → {reply}");
    let tags = concept_tags(&combined);

    let deep = tags.iter().any(|t| DEEP_TAGS.contains(&t.as_str()));
    let calm_bonus = if persona.mood.arousal < 0.3 { 0.4 } else { 0.2 };
    let topic_bonus = if deep { 0.3 } else { 0.1 };
    let subtlety = (persona.response_style.introspection * 0.4 + calm_bonus + topic_bonus).min(0.9);

    let salience = 0.6 + rng.next_unit() as f32 * 0.3;
    let valence = persona.mood.valence * 0.7 + (rng.next_unit() as f32 - 0.5) * 0.3;
    let arousal = persona.mood.arousal * 0.8 + rng.next_unit() as f32 * 0.2;
    let association = 0.5 + rng.next_unit() as f32 * 0.3;

    Memory::new(
        truncate_with_ellipsis(reply, MAX_MEMORY_TEXT_CHARS),
        tags,
        salience,
        Emotion::new(valence, arousal, persona.mood.label.as_deref()),
        MemorySource::System,
        now,
    )
    .with_subtlety(subtlety)
    .with_association(association)
}
