//! Single-writer access to a [`SegState`].
//!
//! At most one reply may be in flight per session. A second `respond` while
//! one is pending is rejected with [`SegError::ReplyInFlight`]. The state
//! lock is taken only for the synchronous halves of a reply (drafting and
//! committing), never across the generator await.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::composer::{self, ComposerOptions, Reply};
use crate::config::SegConfig;
use crate::decay::DecayParams;
use crate::dream::DreamOutcome;
use crate::error::{Result, SegError};
use crate::generator::TextGenerator;
use crate::random::{RandomSource, SeededRandom};
use crate::state::SegState;

/// Releases the in-flight flag when dropped, including when the reply
/// future is cancelled mid-await.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SegError::ReplyInFlight)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A state plus its randomness and tuning, guarded for concurrent callers.
pub struct Session {
    state: Mutex<SegState>,
    rng: Mutex<Box<dyn RandomSource>>,
    in_flight: AtomicBool,
    options: ComposerOptions,
    decay: DecayParams,
    dream_pool_size: usize,
    default_intensity: f32,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .field("options", &self.options)
            .field("decay", &self.decay)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Wrap `state` with default tuning and an entropy-seeded random source.
    #[must_use]
    pub fn new(state: SegState) -> Self {
        Self::with_config(state, &SegConfig::default(), Box::new(SeededRandom::from_entropy()))
    }

    /// Wrap `state` with tuning from `config` and the given random source.
    #[must_use]
    pub fn with_config(state: SegState, config: &SegConfig, rng: Box<dyn RandomSource>) -> Self {
        Self {
            state: Mutex::new(state),
            rng: Mutex::new(rng),
            in_flight: AtomicBool::new(false),
            options: ComposerOptions {
                reinforcement_headroom: config.reply.reinforcement_headroom,
                recency_window_days: config.decay.recency_window_days,
            },
            decay: DecayParams::from(&config.decay),
            dream_pool_size: config.dream.pool_size,
            default_intensity: config.dream.default_intensity,
        }
    }

    /// Whether a reply is currently being generated.
    #[must_use]
    pub fn is_replying(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Compose a reply to `utterance`.
    ///
    /// Returns `Ok(None)` for a blank utterance.
    ///
    /// # Errors
    ///
    /// [`SegError::ReplyInFlight`] if another reply is pending.
    pub async fn respond(
        &self,
        utterance: &str,
        generator: Option<&dyn TextGenerator>,
    ) -> Result<Option<Reply>> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;

        let draft = {
            let state = self.state.lock();
            let mut rng = self.rng.lock();
            composer::draft(&state, utterance, generator.is_some(), &self.options, &mut **rng)
        };
        let Some(draft) = draft else {
            debug!("Ignoring blank utterance");
            return Ok(None);
        };

        let generated = match (generator, draft.system_prompt.as_deref()) {
            (Some(generator), Some(prompt)) => Some(
                generator
                    .generate_response(&draft.messages(), Some(prompt))
                    .await,
            ),
            _ => None,
        };

        let mut state = self.state.lock();
        let mut rng = self.rng.lock();
        Ok(Some(composer::commit(
            &mut state,
            draft,
            generated,
            &self.options,
            &mut **rng,
        )))
    }

    /// Advance simulated time by `days`.
    pub fn tick_days(&self, days: f64) {
        let mut state = self.state.lock();
        let mut rng = self.rng.lock();
        state.tick_days(days, &self.decay, &mut **rng);
    }

    /// Dream at `intensity`, or the configured default.
    ///
    /// # Errors
    ///
    /// [`SegError::EmptyMemoryPool`] if there are no memories.
    pub fn dream(&self, intensity: Option<f32>) -> Result<DreamOutcome> {
        let mut state = self.state.lock();
        let mut rng = self.rng.lock();
        state.dream(
            intensity.unwrap_or(self.default_intensity),
            self.dream_pool_size,
            &mut **rng,
        )
    }

    /// Run `f` with exclusive access to the state.
    pub fn with_state<T>(&self, f: impl FnOnce(&mut SegState) -> T) -> T {
        f(&mut self.state.lock())
    }

    /// Run `f` with exclusive access to the state and the random source.
    pub fn with_state_and_rng<T>(&self, f: impl FnOnce(&mut SegState, &mut dyn RandomSource) -> T) -> T {
        let mut state = self.state.lock();
        let mut rng = self.rng.lock();
        f(&mut state, &mut **rng)
    }

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SegState {
        self.state.lock().clone()
    }

    /// Replace the state wholesale.
    ///
    /// The in-flight flag is checked under the state lock, so a reply that
    /// has already drafted against the old state always commits into it.
    ///
    /// # Errors
    ///
    /// [`SegError::ReplyInFlight`] if a reply is pending.
    pub fn replace(&self, state: SegState) -> Result<()> {
        let mut current = self.state.lock();
        if self.is_replying() {
            return Err(SegError::ReplyInFlight);
        }
        info!(persona = %state.persona.name, memories = state.memories.len(), "State replaced");
        *current = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{ChatMessage, GeneratorReply};
    use crate::persona::Persona;
    use crate::random::SequenceRandom;
    use crate::types::Timestamp;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Blocks until released, so a second call can observe the in-flight flag.
    struct GatedGenerator {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl TextGenerator for GatedGenerator {
        async fn generate_response(&self, _: &[ChatMessage], _: Option<&str>) -> GeneratorReply {
            self.entered.notify_one();
            self.release.notified().await;
            GeneratorReply::ok("done")
        }
    }

    fn session() -> Session {
        let mut rng = SequenceRandom::constant(0.5);
        let state = SegState::new(Persona::fallback(&mut rng), Timestamp(1_000_000), &mut rng);
        Session::with_config(state, &SegConfig::default(), Box::new(rng))
    }

    #[tokio::test]
    async fn second_reply_is_rejected_while_first_is_pending() {
        let session = Arc::new(session());
        let generator = Arc::new(GatedGenerator {
            entered: Notify::new(),
            release: Notify::new(),
        });

        let first = {
            let session = Arc::clone(&session);
            let generator = Arc::clone(&generator);
            tokio::spawn(async move {
                session
                    .respond("hello", Some(generator.as_ref() as &dyn TextGenerator))
                    .await
            })
        };

        generator.entered.notified().await;
        assert!(session.is_replying());
        let second = session.respond("again", None).await;
        assert!(matches!(second, Err(SegError::ReplyInFlight)));

        generator.release.notify_one();
        let reply = first.await.expect("join").expect("reply").expect("non-blank");
        assert_eq!(reply.text, "done");
        assert!(!session.is_replying());
        assert!(session.respond("third", None).await.expect("reply").is_some());
    }

    #[tokio::test]
    async fn replace_waits_for_the_pending_reply() {
        let session = Arc::new(session());
        let generator = Arc::new(GatedGenerator {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let original = session.snapshot();

        let first = {
            let session = Arc::clone(&session);
            let generator = Arc::clone(&generator);
            tokio::spawn(async move {
                session
                    .respond("hello", Some(generator.as_ref() as &dyn TextGenerator))
                    .await
            })
        };
        generator.entered.notified().await;

        let mut rng = SequenceRandom::constant(0.2);
        let other = SegState::new(Persona::fallback(&mut rng), Timestamp(5_000_000), &mut rng);
        assert!(matches!(session.replace(other.clone()), Err(SegError::ReplyInFlight)));

        generator.release.notify_one();
        first.await.expect("join").expect("reply").expect("non-blank");
        let committed = session.snapshot();
        assert_eq!(committed.memories.len(), original.memories.len() + 1);
        assert!(committed.now() > original.now());

        session.replace(other.clone()).expect("idle session");
        assert_eq!(session.snapshot(), other);
    }

    #[tokio::test]
    async fn blank_utterances_change_nothing() {
        let session = session();
        let before = session.snapshot();
        assert!(session.respond("  \n", None).await.expect("ok").is_none());
        assert_eq!(session.snapshot(), before);
    }

    #[tokio::test]
    async fn dropped_reply_releases_the_flag() {
        let session = session();
        let generator = GatedGenerator {
            entered: Notify::new(),
            release: Notify::new(),
        };
        let pending = session.respond("hello", Some(&generator));
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(20), pending).await;
        assert!(timed_out.is_err());
        assert!(!session.is_replying());
        assert_eq!(session.snapshot().memories.len(), 7);
    }

    #[test]
    fn tick_and_dream_go_through_the_lock() {
        let session = session();
        let before = session.snapshot().now();
        session.tick_days(2.0);
        assert!(session.snapshot().now() > before);
        let outcome = session.dream(None).expect("dream");
        assert!(outcome.narration.is_some());
        assert_eq!(session.snapshot().memories.len(), 8);
    }
}
