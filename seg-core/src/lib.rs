//! # SEG Core Library
//!
//! A "narrative organism": a synthetic persona that keeps a store of
//! memories, lets them fade over simulated time, recalls the ones that
//! matter for an utterance, dreams new ones out of old ones, and replies in
//! character.
//!
//! - [`memory`]: the memory record and the owning store
//! - [`retrieval`]: relatedness scoring and ranking
//! - [`decay`]: salience decay over simulated time
//! - [`dream`]: blending salient memories into a dream memory
//! - [`persona`]: persona, mood, archetypes, generation and seeding
//! - [`composer`]: reply drafting, fallback templates and commit
//! - [`session`]: the single-reply-in-flight guard around a [`SegState`]
//! - [`persistence`]: JSON export and import of a whole state
//! - [`library`]: saved personas over a key/value backend
//!
//! Time inside a state is a logical millisecond clock. The wall clock is only
//! read to seed a fresh state and to stamp library entries.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod composer;
pub mod config;
pub mod decay;
pub mod dream;
pub mod error;
pub mod generator;
pub mod interaction;
pub mod library;
pub mod memory;
pub mod persistence;
pub mod persona;
pub mod prompt;
pub mod random;
pub mod retrieval;
pub mod session;
pub mod state;
pub mod types;

pub use config::SegConfig;
pub use error::{Result, SegError};
pub use generator::{ChatMessage, GeneratorReply, Role, TextGenerator};
pub use memory::{Memory, MemoryStore};
pub use persona::Persona;
pub use random::{RandomSource, SeededRandom, SequenceRandom};
pub use session::Session;
pub use state::SegState;
pub use types::*;
