//! Reply composition.
//!
//! A reply is built in two halves so the state lock never spans the
//! generator call:
//!
//! 1. [`draft`] ranks memories and, when a generator is attached, renders the
//!    system prompt. Read-only.
//! 2. [`commit`] takes the generator's answer (if any), falls back to the
//!    template path when it is missing or unusable, then records the
//!    exchange: a new interaction memory, reinforcement of the memories that
//!    were drawn on, and a fresh clock stamp.
//!
//! [`compose`] runs both halves back to back for callers that own the state.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::generator::{ChatMessage, GeneratorReply, TextGenerator};
use crate::interaction::interaction_memory;
use crate::persona::Persona;
use crate::prompt::{META_AWARENESS_LINE, NO_MEMORIES, REPLY_SYSTEM, SUBTLETY_LINE, render_template};
use crate::random::{RandomSource, pick};
use crate::retrieval::{Ranker, Ranking};
use crate::state::{ReplySettings, SegState};
use crate::types::MemoryId;

/// Tic used when the persona has none.
pub const DEFAULT_TIC: &str = "finding the path";
/// Belief used when the persona has none.
pub const DEFAULT_BELIEF: &str = "Understanding comes in its own time";

/// Memories with subtlety above this are marked `[subtle]` in prompts.
pub const SUBTLE_MARK_THRESHOLD: f32 = 0.7;

const META_ASIDES: [&str; 3] = [
    " (I notice familiar patterns stirring.)",
    " (Something in me recognizes this territory.)",
    " (These words feel both new and ancient.)",
];

static PROFOUND: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(meaning|purpose|why|death|love|truth)\b").ok());

/// Where a reply's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOrigin {
    /// The external generator.
    Generated,
    /// The deterministic template path.
    Template,
}

/// A composed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Reply text.
    pub text: String,
    /// Ids of the ranked memories the reply drew on.
    pub used: Vec<MemoryId>,
    /// Id of the interaction memory recorded for this exchange.
    pub recorded: MemoryId,
    /// Which path produced the text.
    pub origin: ReplyOrigin,
}

/// Knobs not carried in [`ReplySettings`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposerOptions {
    /// Fraction of remaining headroom added to each used memory.
    pub reinforcement_headroom: f32,
    /// Ranker recency window, in days.
    pub recency_window_days: f64,
}

impl Default for ComposerOptions {
    fn default() -> Self {
        Self {
            reinforcement_headroom: 0.1,
            recency_window_days: crate::retrieval::scoring::RECENCY_WINDOW_DAYS,
        }
    }
}

/// First half of a reply: ranking plus an optional generator prompt.
#[derive(Debug, Clone)]
pub struct Draft {
    /// The trimmed utterance.
    pub utterance: String,
    /// Memories selected for this reply.
    pub ranking: Ranking,
    /// Rendered system prompt, present when a generator will be called.
    pub system_prompt: Option<String>,
}

impl Draft {
    /// Messages to send alongside the system prompt.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![ChatMessage::user(self.utterance.clone())]
    }
}

/// Rank memories for `utterance` and prepare a prompt if `with_generator`.
///
/// Returns `None` for a blank utterance.
pub fn draft(
    state: &SegState,
    utterance: &str,
    with_generator: bool,
    options: &ComposerOptions,
    rng: &mut dyn RandomSource,
) -> Option<Draft> {
    let utterance = utterance.trim();
    if utterance.is_empty() {
        return None;
    }
    let ranking = Ranker::new(state.settings.subtlety_mode)
        .with_recency_window(options.recency_window_days)
        .rank(&state.memories, utterance, state.now());
    let system_prompt = with_generator
        .then(|| build_system_prompt(&state.persona, &state.settings, &ranking, utterance, rng));
    Some(Draft {
        utterance: utterance.to_string(),
        ranking,
        system_prompt,
    })
}

/// Finish a reply and record it in `state`.
///
/// `generated` is the generator's answer, or `None` when no generator was
/// called. Errors and blank answers fall back to the template path with the
/// same ranked memories.
pub fn commit(
    state: &mut SegState,
    draft: Draft,
    generated: Option<GeneratorReply>,
    options: &ComposerOptions,
    rng: &mut dyn RandomSource,
) -> Reply {
    let used = draft.ranking.ids();

    let generated_text = generated.as_ref().and_then(|reply| match reply.usable_text() {
        Some(text) => Some(text.to_string()),
        None => {
            warn!(
                error = reply.error.as_deref().unwrap_or("empty reply"),
                "Generator reply unusable, falling back to template"
            );
            None
        }
    });

    let (text, origin) = match generated_text {
        Some(text) => (text, ReplyOrigin::Generated),
        None => (
            template_reply(&state.persona, &draft.ranking, &state.settings, rng),
            ReplyOrigin::Template,
        ),
    };

    let now = state.stamp();
    let memory = interaction_memory(&draft.utterance, &text, &state.persona, now, rng);
    let recorded = state.memories.insert(memory);
    for id in &used {
        state
            .memories
            .reinforce_headroom(id, options.reinforcement_headroom, now);
    }

    debug!(
        used = used.len(),
        memory = %recorded,
        origin = ?origin,
        "Reply committed"
    );
    Reply {
        text,
        used,
        recorded,
        origin,
    }
}

/// Rank, generate (or fall back) and record a reply in one call.
///
/// Returns `None` for a blank utterance, leaving `state` untouched.
pub async fn compose(
    state: &mut SegState,
    utterance: &str,
    generator: Option<&dyn TextGenerator>,
    options: &ComposerOptions,
    rng: &mut dyn RandomSource,
) -> Option<Reply> {
    let draft = draft(state, utterance, generator.is_some(), options, rng)?;
    let generated = match (generator, draft.system_prompt.as_deref()) {
        (Some(generator), Some(prompt)) => Some(
            generator
                .generate_response(&draft.messages(), Some(prompt))
                .await,
        ),
        _ => None,
    };
    Some(commit(state, draft, generated, options, rng))
}

/// Render the in-character system prompt.
///
/// Draws one value from `rng` when the persona is meta-aware, to decide
/// whether the meta-awareness line is included.
pub fn build_system_prompt(
    persona: &Persona,
    settings: &ReplySettings,
    ranking: &Ranking,
    utterance: &str,
    rng: &mut dyn RandomSource,
) -> String {
    let memory_context = ranking
        .memories
        .iter()
        .map(|r| {
            let mark = if r.memory.subtlety > SUBTLE_MARK_THRESHOLD {
                "subtle"
            } else {
                "direct"
            };
            format!("[{mark}] {}", r.memory.text)
        })
        .collect::<Vec<_>>()
        .join(" · ");
    let memory_context = if memory_context.is_empty() {
        NO_MEMORIES.to_string()
    } else {
        memory_context
    };

    let meta_line = if persona.meta_aware && rng.chance(f64::from(settings.self_reference_prob)) {
        META_AWARENESS_LINE
    } else {
        ""
    };
    let subtlety_line = if settings.subtlety_mode { SUBTLETY_LINE } else { "" };

    let style = persona.response_style;
    let percent = |x: f32| format!("{:.0}", x * 100.0);
    let age = persona.age.to_string();
    let beliefs = persona.core_beliefs.join("; ");
    let tics = persona.linguistic_tics.join(", ");
    let valence = format!("{:.2}", persona.mood.valence);
    let arousal = format!("{:.2}", persona.mood.arousal);
    let directness = percent(style.directness);
    let metaphor = percent(style.metaphor_tendency);
    let introspection = percent(style.introspection);
    let verbosity = percent(style.verbosity);
    let guidance = response_guidance(persona, settings.subtlety_mode, utterance);

    render_template(
        REPLY_SYSTEM,
        &[
            ("name", persona.name.as_str()),
            ("age", age.as_str()),
            ("profession", persona.profession.as_str()),
            ("location", persona.location.as_str()),
            ("beliefs", beliefs.as_str()),
            ("emotional_core", persona.emotional_core.as_str()),
            ("tics", tics.as_str()),
            ("mood_label", persona.mood.display_label()),
            ("valence", valence.as_str()),
            ("arousal", arousal.as_str()),
            ("directness", directness.as_str()),
            ("metaphor", metaphor.as_str()),
            ("introspection", introspection.as_str()),
            ("verbosity", verbosity.as_str()),
            ("memory_context", memory_context.as_str()),
            ("guidance", guidance.as_str()),
            ("meta_line", meta_line),
            ("subtlety_line", subtlety_line),
        ],
    )
    .trim_end()
    .to_string()
}

/// Guidance sentences derived from style sliders, subtlety mode and topic.
///
/// Joined with `". "` and terminated with a period.
#[must_use]
pub fn response_guidance(persona: &Persona, subtlety_mode: bool, utterance: &str) -> String {
    let style = persona.response_style;
    let mut guidance: Vec<&str> = Vec::new();

    if style.verbosity < 0.3 {
        guidance.push("Keep responses concise and thoughtful");
    } else if style.verbosity > 0.7 {
        guidance.push("You may elaborate with rich detail when moved to do so");
    }
    if style.metaphor_tendency > 0.6 {
        guidance.push("Draw naturally from metaphors related to your experience");
    }
    if style.directness < 0.4 {
        guidance.push("Approach topics obliquely, letting meaning emerge through implication");
    }
    if style.introspection > 0.6 {
        guidance.push("Feel free to reflect on the deeper currents beneath surface questions");
    }
    if subtlety_mode {
        guidance.push("Let wisdom emerge through understatement rather than declaration");
        guidance.push("Trust silences and pauses as much as words");
    }
    if PROFOUND.as_ref().is_some_and(|re| re.is_match(utterance)) {
        guidance.push("This touches something profound - respond from your deepest understanding");
    }

    format!("{}.", guidance.join(". "))
}

/// The deterministic reply used without a generator or after it fails.
///
/// Ranked memory texts are woven together (`" ... "` in subtlety mode,
/// `" · "` otherwise), cut to `max_weave_chars`, and dropped into one of
/// four templates with a tic and a belief. Meta-aware personas sometimes
/// add an aside.
pub fn template_reply(
    persona: &Persona,
    ranking: &Ranking,
    settings: &ReplySettings,
    rng: &mut dyn RandomSource,
) -> String {
    let tic = pick(rng, &persona.linguistic_tics).map_or(DEFAULT_TIC, String::as_str);
    let belief = pick(rng, &persona.core_beliefs).map_or(DEFAULT_BELIEF, String::as_str);

    let separator = if settings.subtlety_mode { " ... " } else { " · " };
    let weave: String = ranking
        .texts()
        .join(separator)
        .chars()
        .take(settings.max_weave_chars)
        .collect();

    let mut reply = match rng.index(4) {
        0 => format!("{tic}, I sense {weave}. {belief}"),
        1 => format!("In the space between question and answer, {weave} reminds me that {belief}"),
        2 => format!("Something about this {tic} - perhaps it's how {weave}. {belief}"),
        _ => format!("The thread of your question weaves through {weave}. As I often find, {belief}"),
    };

    if persona.meta_aware && rng.chance(f64::from(settings.self_reference_prob)) {
        if let Some(aside) = pick(rng, &META_ASIDES) {
            reply.push_str(aside);
        }
    }
    reply
}
