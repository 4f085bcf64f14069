//! Salience decay over simulated time.
//!
//! For every memory:
//!   ageDays   = (now - lastReinforced) / 1 day
//!   rate      = 0.001 for core anchors, 0.02 otherwise
//!   decayed   = e^(-rate · (ageDays + Δt_days)) · salience
//!   salience' = clamp01(floor + decayed)
//!
//! The 0.15 floor keeps every memory reachable, and anchors fade about
//! twenty times slower than ordinary memories. Decay only runs when the
//! caller advances time; nothing decays implicitly on interaction.

use std::time::Instant;

use tracing::debug;

use crate::config::DecayConfig;
use crate::memory::{Memory, MemoryStore};
use crate::types::{DAY_MS, Timestamp, clamp01};

/// Decay parameters.
#[derive(Debug, Clone, Copy)]
pub struct DecayParams {
    /// Rate for ordinary memories, per day.
    pub ordinary_rate: f64,
    /// Rate for core anchors, per day.
    pub anchor_rate: f64,
    /// Constant added after decay.
    pub floor: f32,
}

impl Default for DecayParams {
    fn default() -> Self {
        Self {
            ordinary_rate: 0.02,
            anchor_rate: 0.001,
            floor: 0.15,
        }
    }
}

impl From<&DecayConfig> for DecayParams {
    fn from(config: &DecayConfig) -> Self {
        Self {
            ordinary_rate: config.ordinary_rate,
            anchor_rate: config.anchor_rate,
            floor: config.salience_floor,
        }
    }
}

impl DecayParams {
    /// Per-day rate for a memory.
    #[must_use]
    pub fn rate_for(&self, memory: &Memory) -> f64 {
        if memory.immutable {
            self.anchor_rate
        } else {
            self.ordinary_rate
        }
    }
}

/// Salience a single memory would have after `elapsed_ms` more time at `now`.
#[must_use]
pub fn decayed_salience(memory: &Memory, now: Timestamp, elapsed_ms: u64, params: &DecayParams) -> f32 {
    let age_days = now.days_since(memory.last_reinforced);
    let elapsed_days = elapsed_ms as f64 / DAY_MS as f64;
    let retention = (-params.rate_for(memory) * (age_days + elapsed_days)).exp();
    let decayed = retention * f64::from(memory.salience);
    clamp01(params.floor + decayed as f32)
}

/// Decay a copy of one memory.
#[must_use]
pub fn decay_memory(memory: &Memory, now: Timestamp, elapsed_ms: u64, params: &DecayParams) -> Memory {
    Memory {
        salience: decayed_salience(memory, now, elapsed_ms, params),
        ..memory.clone()
    }
}

/// Run a decay pass over every memory in the store, in place.
pub fn decay_store(store: &mut MemoryStore, now: Timestamp, elapsed_ms: u64, params: &DecayParams) {
    let start = Instant::now();
    store.for_each_mut(|memory| {
        memory.salience = decayed_salience(memory, now, elapsed_ms, params);
    });
    debug!(
        memories = store.len(),
        elapsed_days = elapsed_ms as f64 / DAY_MS as f64,
        elapsed_us = start.elapsed().as_micros(),
        "Decay pass complete"
    );
}
