//! Policies for choosing which persona dimension an event refreshes.
//!
//! Two policies ship:
//!
//! - [`UniformSelector`] picks one of the four dimensions uniformly at random,
//!   independent of history.
//! - [`StalenessSelector`] keeps a per-dimension "selections since last
//!   chosen" counter, weights the draw toward older dimensions, and forces a
//!   dimension once its counter reaches `max_wait`.  Every dimension is
//!   therefore chosen at least once in any `max_wait + 4` consecutive
//!   selections.
//!
//! Counters live in memory only; a restart resets them.

use std::sync::Mutex;

use alterego_config::{PersonaConfig, SelectorPolicy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::persona::{Dimension, Persona};

pub trait DimensionSelector: Send + Sync {
    /// Return exactly one of the four dimensions.
    fn select(&self, persona: &Persona) -> Dimension;

    fn name(&self) -> &'static str;
}

/// Build the selector named by configuration.
pub fn selector_from_config(config: &PersonaConfig) -> Box<dyn DimensionSelector> {
    match config.selector {
        SelectorPolicy::Uniform => Box::new(UniformSelector::new()),
        SelectorPolicy::Staleness => Box::new(StalenessSelector::new(config.max_staleness)),
    }
}

// ── uniform ───────────────────────────────────────────────────────────────────

pub struct UniformSelector {
    rng: Mutex<StdRng>,
}

impl UniformSelector {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Reproducible draws for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for UniformSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl DimensionSelector for UniformSelector {
    fn select(&self, _persona: &Persona) -> Dimension {
        let idx = match self.rng.lock() {
            Ok(mut rng) => rng.random_range(0..Dimension::ALL.len()),
            Err(_) => rand::rng().random_range(0..Dimension::ALL.len()),
        };
        Dimension::ALL[idx]
    }

    fn name(&self) -> &'static str {
        "uniform"
    }
}

// ── staleness ─────────────────────────────────────────────────────────────────

pub struct StalenessSelector {
    max_wait: u32,
    state: Mutex<StalenessState>,
}

struct StalenessState {
    rng: StdRng,
    waits: [u32; 4],
}

impl StalenessSelector {
    pub fn new(max_wait: u32) -> Self {
        Self::with_rng(max_wait, StdRng::from_os_rng())
    }

    pub fn seeded(max_wait: u32, seed: u64) -> Self {
        Self::with_rng(max_wait, StdRng::seed_from_u64(seed))
    }

    fn with_rng(max_wait: u32, rng: StdRng) -> Self {
        Self {
            max_wait: max_wait.max(1),
            state: Mutex::new(StalenessState { rng, waits: [0; 4] }),
        }
    }

    pub fn max_wait(&self) -> u32 {
        self.max_wait
    }

    /// Selections since each dimension was last chosen, in [`Dimension::ALL`] order.
    pub fn waits(&self) -> [u32; 4] {
        self.state.lock().map(|s| s.waits).unwrap_or([0; 4])
    }
}

impl StalenessState {
    fn pick(&mut self, max_wait: u32) -> Dimension {
        // Oldest overdue dimension wins outright; ties go to the earlier one.
        let overdue = Dimension::ALL
            .iter()
            .copied()
            .filter(|d| self.waits[d.index()] >= max_wait)
            .max_by(|a, b| {
                self.waits[a.index()]
                    .cmp(&self.waits[b.index()])
                    .then(b.index().cmp(&a.index()))
            });
        if let Some(dim) = overdue {
            return dim;
        }

        let total: u64 = self.waits.iter().map(|w| u64::from(*w) + 1).sum();
        let mut ticket = self.rng.random_range(0..total);
        for dim in Dimension::ALL {
            let weight = u64::from(self.waits[dim.index()]) + 1;
            if ticket < weight {
                return dim;
            }
            ticket -= weight;
        }
        Dimension::Expression
    }
}

impl DimensionSelector for StalenessSelector {
    fn select(&self, persona: &Persona) -> Dimension {
        let Ok(mut state) = self.state.lock() else {
            return UniformSelector::new().select(persona);
        };
        let chosen = state.pick(self.max_wait);
        for dim in Dimension::ALL {
            let wait = &mut state.waits[dim.index()];
            *wait = if dim == chosen { 0 } else { wait.saturating_add(1) };
        }
        debug!(dimension = %chosen, waits = ?state.waits, "staleness selector picked dimension");
        chosen
    }

    fn name(&self) -> &'static str {
        "staleness"
    }
}
