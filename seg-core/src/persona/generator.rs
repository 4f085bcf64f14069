//! Persona generation through the external text generator.
//!
//! The generator is asked for a JSON object. Whatever comes back is parsed
//! leniently: the first `{...}` block is extracted, every field is read on
//! its own and replaced by an explicit default when missing or mistyped.
//! Any failure along the way yields an archetype-driven fallback persona.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

use super::archetype::{ARCHETYPES, Archetype, find};
use super::{Persona, ResponseStyle, SensoryAnchors, strings};
use crate::generator::{ChatMessage, TextGenerator};
use crate::prompt::{
    DEFAULT_PERSONA_CONTEXT, PERSONA_GENERATION_SYSTEM, PERSONA_GENERATION_USER, render_template,
};
use crate::random::{RandomSource, pick};
use crate::types::Emotion;

/// Probability that a generated persona is meta-aware.
pub const META_AWARE_PROBABILITY: f64 = 0.3;

const FIRST_NAMES: [&str; 10] = [
    "River", "Sage", "Quinn", "Cedar", "Iris", "Gray", "Luna", "Ash", "Wren", "Vale",
];
const LAST_NAMES: [&str; 10] = [
    "Stone", "Rivers", "Woods", "Fields", "Cross", "Moon", "Hill", "West", "North", "Hart",
];
const FALLBACK_BELIEFS: [&str; 3] = [
    "Every moment contains infinite depth if we pause to notice",
    "Understanding emerges through patient observation",
    "True wisdom comes from embracing uncertainty",
];
const FALLBACK_TICS: [&str; 3] = [
    "weaving through possibility",
    "catching light at the edges",
    "following the grain of things",
];

static JSON_BLOCK: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").ok());

/// Outcome of parsing generator output.
#[derive(Debug, Clone, PartialEq)]
pub enum PersonaParse {
    /// A persona with every missing field filled in.
    Parsed(Box<Persona>),
    /// The output held no usable JSON object.
    Failure(String),
}

/// Builds personas, with or without an external generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonaGenerator;

impl PersonaGenerator {
    /// Generate a persona.
    ///
    /// An unknown or absent `archetype` picks one at random. Without a
    /// generator, or when generation or parsing fails, an archetype-driven
    /// fallback persona is returned. Never fails.
    pub async fn generate(
        generator: Option<&dyn TextGenerator>,
        archetype: Option<&str>,
        context: Option<&str>,
        rng: &mut dyn RandomSource,
    ) -> Persona {
        let selected = Self::select_archetype(archetype, rng);

        let Some(generator) = generator else {
            info!(archetype = selected.category, "No generator, building fallback persona");
            return Self::fallback(selected, rng);
        };

        let system_prompt = Self::build_prompt(selected, context);
        let reply = generator
            .generate_response(&[ChatMessage::user(PERSONA_GENERATION_USER)], Some(&system_prompt))
            .await;

        let Some(text) = reply.usable_text() else {
            warn!(
                generator = generator.name(),
                error = reply.error.as_deref().unwrap_or("empty reply"),
                "Persona generation failed, using fallback"
            );
            return Self::fallback(selected, rng);
        };

        match Self::parse(text, selected, rng) {
            PersonaParse::Parsed(persona) => {
                info!(name = %persona.name, archetype = %persona.archetype, "Generated persona");
                *persona
            }
            PersonaParse::Failure(reason) => {
                warn!(%reason, "Failed to parse persona response, using fallback");
                Self::fallback(selected, rng)
            }
        }
    }

    /// Resolve an archetype name, or pick one at random.
    pub fn select_archetype(
        archetype: Option<&str>,
        rng: &mut dyn RandomSource,
    ) -> &'static Archetype {
        if let Some(found) = archetype.and_then(find) {
            return found;
        }
        pick(rng, &ARCHETYPES).unwrap_or(&ARCHETYPES[0])
    }

    /// The system prompt asking for a persona of `archetype`.
    #[must_use]
    pub fn build_prompt(archetype: &Archetype, context: Option<&str>) -> String {
        let context = context
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_PERSONA_CONTEXT);
        let age_min = archetype.age_range.0.to_string();
        let age_max = archetype.age_range.1.to_string();
        let professions = archetype.professions.join(", ");
        let locations = archetype.locations.join(", ");
        render_template(
            PERSONA_GENERATION_SYSTEM,
            &[
                ("archetype", archetype.category),
                ("context", context),
                ("age_min", age_min.as_str()),
                ("age_max", age_max.as_str()),
                ("professions", professions.as_str()),
                ("locations", locations.as_str()),
            ],
        )
    }

    /// Parse generator output into a persona.
    ///
    /// Draws from `rng` for defaulted fields, meta-awareness and the
    /// response-style sliders.
    pub fn parse(response: &str, archetype: &Archetype, rng: &mut dyn RandomSource) -> PersonaParse {
        let Some(block) = JSON_BLOCK
            .as_ref()
            .and_then(|re| re.find(response))
            .map(|m| m.as_str())
        else {
            return PersonaParse::Failure("no JSON object in response".to_string());
        };
        let parsed: Value = match serde_json::from_str(block) {
            Ok(Value::Object(map)) => Value::Object(map),
            Ok(_) => return PersonaParse::Failure("response JSON is not an object".to_string()),
            Err(e) => return PersonaParse::Failure(e.to_string()),
        };

        let name = text_field(&parsed, "name").unwrap_or_else(|| fallback_name(rng));
        let age = age_field(&parsed).unwrap_or_else(|| random_age(archetype, rng));
        let profession = text_field(&parsed, "profession")
            .unwrap_or_else(|| pick_str(rng, archetype.professions));
        let location =
            text_field(&parsed, "location").unwrap_or_else(|| pick_str(rng, archetype.locations));
        let core_beliefs =
            list_field(&parsed, "coreBeliefs").unwrap_or_else(|| strings(&FALLBACK_BELIEFS));
        let linguistic_tics =
            list_field(&parsed, "linguisticTics").unwrap_or_else(|| strings(&FALLBACK_TICS));
        let emotional_core = text_field(&parsed, "emotionalCore").unwrap_or_else(|| {
            "A quiet resilience shaped by years of dedicated practice".to_string()
        });
        let meta_aware = rng.chance(META_AWARE_PROBABILITY);
        let mood = mood_field(parsed.get("mood"));
        let sensory_anchors = anchors_field(parsed.get("sensoryAnchors"));
        let backstory_elements = list_field(&parsed, "backstoryElements").unwrap_or_else(|| {
            strings(&[
                "A mentor who shaped early understanding",
                "A place of solitude and reflection",
                "A moment of profound realization",
            ])
        });

        PersonaParse::Parsed(Box::new(Persona {
            name,
            age,
            profession,
            location,
            core_beliefs,
            linguistic_tics,
            emotional_core,
            meta_aware,
            mood,
            sensory_anchors,
            archetype: archetype.category.to_string(),
            backstory_elements,
            response_style: ResponseStyle::random(rng),
        }))
    }

    /// A persona built from `archetype` alone.
    pub fn fallback(archetype: &Archetype, rng: &mut dyn RandomSource) -> Persona {
        let name = fallback_name(rng);
        let age = random_age(archetype, rng);
        let profession = pick_str(rng, archetype.professions);
        let location = pick_str(rng, archetype.locations);
        let meta_aware = rng.chance(META_AWARE_PROBABILITY);
        Persona {
            name,
            age,
            profession,
            location,
            core_beliefs: strings(&FALLBACK_BELIEFS),
            linguistic_tics: strings(&FALLBACK_TICS),
            emotional_core: "A defining moment that reshaped understanding of what truly matters"
                .to_string(),
            meta_aware,
            mood: Emotion::new(0.1, 0.3, Some("reflective")),
            sensory_anchors: SensoryAnchors {
                scent: "rain-soaked earth and old wood".to_string(),
                sound: "distant ocean waves".to_string(),
                touch: "smooth river stones".to_string(),
                taste: "morning coffee and contemplation".to_string(),
            },
            archetype: archetype.category.to_string(),
            backstory_elements: strings(&[
                "A teacher who opened new perspectives",
                "A place of solitude that became sacred",
                "A loss that deepened appreciation for presence",
            ]),
            response_style: ResponseStyle::random(rng),
        }
    }
}

fn fallback_name(rng: &mut dyn RandomSource) -> String {
    let first = pick(rng, &FIRST_NAMES).copied().unwrap_or("River");
    let last = pick(rng, &LAST_NAMES).copied().unwrap_or("Stone");
    format!("{first} {last}")
}

fn random_age(archetype: &Archetype, rng: &mut dyn RandomSource) -> u32 {
    let (lo, hi) = archetype.age_range;
    lo + (rng.next_unit() * f64::from(hi - lo)) as u32
}

fn pick_str(rng: &mut dyn RandomSource, items: &[&str]) -> String {
    pick(rng, items).copied().unwrap_or_default().to_string()
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn age_field(value: &Value) -> Option<u32> {
    let age = value.get("age")?;
    let years = age
        .as_f64()
        .or_else(|| age.as_str().and_then(|s| s.trim().parse::<f64>().ok()))?;
    (years >= 1.0 && years < 150.0).then_some(years as u32)
}

fn list_field(value: &Value, key: &str) -> Option<Vec<String>> {
    let items: Vec<String> = value
        .get(key)?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}

fn mood_field(mood: Option<&Value>) -> Emotion {
    let Some(mood) = mood.filter(|m| m.is_object()) else {
        return Emotion::new(0.1, 0.3, Some("contemplative"));
    };
    let valence = mood.get("valence").and_then(Value::as_f64).unwrap_or(0.1) as f32;
    let arousal = mood.get("arousal").and_then(Value::as_f64).unwrap_or(0.3) as f32;
    let label = text_field(mood, "label").unwrap_or_else(|| "contemplative".to_string());
    Emotion::new(valence, arousal, Some(label.as_str()))
}

fn anchors_field(anchors: Option<&Value>) -> SensoryAnchors {
    let get = |key: &str, default: &str| {
        anchors
            .and_then(|a| text_field(a, key))
            .unwrap_or_else(|| default.to_string())
    };
    SensoryAnchors {
        scent: get("scent", "old books and rain"),
        sound: get("sound", "distant wind chimes"),
        touch: get("touch", "worn wooden surfaces"),
        taste: get("taste", "herbal tea and memory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{FixedGenerator, GeneratorReply};
    use crate::random::{SeededRandom, SequenceRandom};

    const FULL: &str = r#"Here you go:
{
  "name": "Mara Quell",
  "age": 62,
  "profession": "lighthouse keeper",
  "location": "coastal lighthouse",
  "coreBeliefs": ["The sea keeps its own calendar"],
  "linguisticTics": ["as the tide allows"],
  "emotionalCore": "A storm that took a brother",
  "sensoryAnchors": {"scent": "salt and lamp oil", "sound": "foghorn", "touch": "cold brass", "taste": "bitter tea"},
  "backstoryElements": ["Kept the light through the winter of '88"],
  "mood": {"valence": -0.2, "arousal": 0.4, "label": "watchful"}
}
Hope that helps."#;

    fn guardian() -> &'static Archetype {
        find("guardian").expect("guardian archetype")
    }

    #[test]
    fn parses_wrapped_json() {
        let mut rng = SequenceRandom::constant(0.5);
        let PersonaParse::Parsed(persona) = PersonaGenerator::parse(FULL, guardian(), &mut rng) else {
            panic!("expected a parsed persona");
        };
        assert_eq!(persona.name, "Mara Quell");
        assert_eq!(persona.age, 62);
        assert_eq!(persona.sensory_anchors.sound, "foghorn");
        assert_eq!(persona.mood.label.as_deref(), Some("watchful"));
        assert!((persona.mood.valence + 0.2).abs() < 1e-6);
        assert_eq!(persona.archetype, "guardian");
        // 0.5 is not below 0.3
        assert!(!persona.meta_aware);
        assert!((persona.response_style.directness - 0.5).abs() < 1e-6);
    }

    #[test]
    fn missing_fields_get_explicit_defaults() {
        let mut rng = SequenceRandom::constant(0.0);
        let PersonaParse::Parsed(persona) =
            PersonaGenerator::parse(r#"{"name": "Only Name", "age": "sixty"}"#, guardian(), &mut rng)
        else {
            panic!("expected a parsed persona");
        };
        assert_eq!(persona.name, "Only Name");
        assert_eq!(persona.age, 40);
        assert_eq!(persona.profession, "park ranger");
        assert_eq!(persona.core_beliefs.len(), 3);
        assert_eq!(persona.sensory_anchors.scent, "old books and rain");
        assert_eq!(persona.mood.label.as_deref(), Some("contemplative"));
        assert_eq!(persona.backstory_elements[0], "A mentor who shaped early understanding");
        assert!(persona.meta_aware);
    }

    #[test]
    fn garbage_is_a_failure() {
        let mut rng = SequenceRandom::constant(0.5);
        assert!(matches!(
            PersonaGenerator::parse("no json here", guardian(), &mut rng),
            PersonaParse::Failure(_)
        ));
        assert!(matches!(
            PersonaGenerator::parse("{ not json }", guardian(), &mut rng),
            PersonaParse::Failure(_)
        ));
    }

    #[test]
    fn prompt_names_the_archetype_bounds() {
        let prompt = PersonaGenerator::build_prompt(guardian(), None);
        assert!(prompt.contains("**Archetype**: guardian"));
        assert!(prompt.contains("**Context**: General conversation companion"));
        assert!(prompt.contains("between 40 and 80"));
        assert!(prompt.contains("lighthouse keeper"));
    }

    #[test]
    fn fallback_respects_archetype() {
        let mut rng = SeededRandom::seeded(3);
        for archetype in &ARCHETYPES {
            let persona = PersonaGenerator::fallback(archetype, &mut rng);
            assert_eq!(persona.archetype, archetype.category);
            assert!(persona.age >= archetype.age_range.0 && persona.age < archetype.age_range.1);
            assert!(archetype.professions.contains(&persona.profession.as_str()));
            let style = persona.response_style;
            assert!((0.3..=0.7).contains(&style.directness));
            assert!((0.2..=0.6).contains(&style.verbosity));
        }
    }

    #[tokio::test]
    async fn generator_failure_falls_back() {
        let generator = FixedGenerator::new(GeneratorReply::failed("connection refused"));
        let mut rng = SeededRandom::seeded(9);
        let persona =
            PersonaGenerator::generate(Some(&generator), Some("mystic"), None, &mut rng).await;
        assert_eq!(persona.archetype, "mystic");
        assert_eq!(persona.emotional_core, "A defining moment that reshaped understanding of what truly matters");
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn generator_output_is_used() {
        let generator = FixedGenerator::new(GeneratorReply::ok(FULL));
        let mut rng = SeededRandom::seeded(9);
        let persona =
            PersonaGenerator::generate(Some(&generator), Some("guardian"), Some("harbor town"), &mut rng)
                .await;
        assert_eq!(persona.name, "Mara Quell");
        let prompt = generator.last_system_prompt().expect("prompt");
        assert!(prompt.contains("**Context**: harbor town"));
    }

    #[tokio::test]
    async fn no_generator_uses_fallback() {
        let mut rng = SequenceRandom::constant(0.0);
        let persona = PersonaGenerator::generate(None, Some("unknown"), None, &mut rng).await;
        assert_eq!(persona.archetype, "scholar");
        assert_eq!(persona.name, "River Stone");
    }
}
