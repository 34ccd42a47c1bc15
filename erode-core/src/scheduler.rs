//! Degradation scheduler: the only caller of the decay function against
//! canonical text.
//!
//! Two write paths:
//! - [`DegradationScheduler::tick`] applies slow ambient decay to every live
//!   memory, weighted by the word/vowel stability policy and by age.
//! - [`DegradationScheduler::accelerate`] is the single sanctioned write path
//!   for consumer interactions (burning, replaying a tape, scraping). It is
//!   not idempotent in result: each call degrades again, so callers invoke it
//!   once per discrete user action.
//!
//! Two `accelerate` calls on the same memory in the same tick are applied in
//! sequence and compound.
//!
//! Both operations wait at most [`STORE_LOCK_WAIT`] for the store lock. If a
//! caller is still holding a store guard (for example while iterating a
//! `store.lock().list()` temporary) the call is skipped with a warning rather
//! than blocking forever.

use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info_span, warn};

use crate::config::{DecayConfig, ErodeConfig, SchedulerConfig, StabilityConfig};
use crate::decay::{DecayOutcome, decay_pass, decay_passes, fraction_changed};
use crate::metrics::{EngineCounters, spans};
use crate::stability::fold_intensity;
use crate::store::SharedStore;
use crate::types::MemoryId;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Longest a scheduler operation waits for the store lock before giving up.
pub const STORE_LOCK_WAIT: Duration = Duration::from_millis(50);

/// Summary of one ambient tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Live memories visited.
    pub visited: usize,
    /// Memories whose text changed.
    pub changed: usize,
    /// Characters lost across all memories.
    pub chars_lost: usize,
}

/// Drives ambient and accelerated decay against a shared store.
#[derive(Debug)]
pub struct DegradationScheduler {
    store: SharedStore,
    rng: ChaCha8Rng,
    decay: DecayConfig,
    stability: StabilityConfig,
    config: SchedulerConfig,
}

impl DegradationScheduler {
    /// Create a scheduler over `store`.
    ///
    /// Uses `config.scheduler.seed` when set, otherwise seeds from entropy.
    #[must_use]
    pub fn new(store: SharedStore, config: &ErodeConfig) -> Self {
        let rng = match config.scheduler.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            store,
            rng,
            decay: config.decay.clone(),
            stability: config.stability.clone(),
            config: config.scheduler.clone(),
        }
    }

    /// Create a scheduler with a fixed seed, regardless of config.
    #[must_use]
    pub fn with_seed(store: SharedStore, config: &ErodeConfig, seed: u64) -> Self {
        let mut scheduler = Self::new(store, config);
        scheduler.rng = ChaCha8Rng::seed_from_u64(seed);
        scheduler
    }

    /// The store this scheduler writes to.
    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Ambient intensity for a memory of the given age over `dt_seconds`.
    ///
    /// `rate * dt * (1 + age_days * age_acceleration)`, capped.
    #[must_use]
    pub fn ambient_intensity(&self, age_days: f64, dt_seconds: f64) -> f64 {
        let age_factor = 1.0 + age_days.max(0.0) * self.config.age_acceleration_per_day;
        (self.config.ambient_rate_per_second * dt_seconds * age_factor)
            .clamp(0.0, self.config.max_ambient_intensity)
    }

    /// Apply ambient decay for `dt_seconds` of wall-clock time to every live
    /// memory. Non-positive or non-finite `dt_seconds` is a no-op.
    pub fn tick(&mut self, dt_seconds: f64) -> TickReport {
        let mut report = TickReport::default();
        if !dt_seconds.is_finite() || dt_seconds <= 0.0 {
            return report;
        }

        let _span = info_span!(spans::TICK, dt_seconds).entered();
        let Some(mut store) = self.store.try_lock_for(STORE_LOCK_WAIT) else {
            warn!("Store lock held elsewhere; skipping ambient tick");
            return report;
        };
        let now = store.now();

        for id in store.live_ids() {
            let Some(memory) = store.get(id) else {
                continue;
            };
            report.visited += 1;
            let age_ms = (now - memory.created_at).num_milliseconds() as f64;
            let age_days = age_ms / 1000.0 / SECONDS_PER_DAY;
            let base = self.ambient_intensity(age_days, dt_seconds);
            if base <= 0.0 {
                continue;
            }

            let stability = memory.stability(&self.stability);
            let intensities = fold_intensity(base, &stability, memory.char_len());
            let outcome = decay_pass(
                &memory.current_text,
                &intensities,
                None,
                &self.decay,
                &mut self.rng,
            );
            if outcome.is_unchanged() {
                continue;
            }

            let increment = fraction_changed(&memory.current_text, &outcome.text);
            if store.apply(memory.id, &outcome, increment) {
                report.changed += 1;
                report.chars_lost += outcome.lost.len();
            }
        }

        if report.changed > 0 {
            store.persist();
        }
        EngineCounters::bump(&store.counters().ticks, 1);
        debug!(
            visited = report.visited,
            changed = report.changed,
            chars_lost = report.chars_lost,
            "Ambient tick"
        );
        report
    }

    /// Spend `amount` of a memory: run accelerated decay and add `amount` to
    /// its degradation.
    ///
    /// `amount` is clamped to `(0, 1]`; non-positive or NaN amounts do nothing.
    /// The pass count scales with `amount` (`ceil(amount * accelerate_passes)`),
    /// every pass at `intensity = amount` with no stability shielding.
    ///
    /// Returns the combined outcome (new text plus every lost character), or
    /// `None` if the id is unknown, the amount is not positive, or the store
    /// lock could not be taken within [`STORE_LOCK_WAIT`].
    pub fn accelerate(&mut self, id: MemoryId, amount: f64) -> Option<DecayOutcome> {
        if amount.is_nan() || amount <= 0.0 {
            debug!(id = %id, amount, "Ignoring non-positive accelerate amount");
            return None;
        }
        let amount = amount.min(1.0);

        let _span = info_span!(spans::ACCELERATE, id = %id, amount).entered();
        let Some(mut store) = self.store.try_lock_for(STORE_LOCK_WAIT) else {
            warn!(id = %id, "Store lock held elsewhere; accelerate skipped");
            return None;
        };

        let Some(memory) = store.get(id) else {
            EngineCounters::bump(&store.counters().unknown_accelerations, 1);
            debug!(id = %id, "accelerate on unknown memory ignored");
            return None;
        };

        let passes = self.passes_for(amount);
        let intensities = vec![amount; memory.char_len()];
        let outcome = decay_passes(
            &memory.current_text,
            &intensities,
            None,
            &self.decay,
            passes,
            &mut self.rng,
        );

        store.commit(id, &outcome, amount);
        EngineCounters::bump(&store.counters().accelerations, 1);
        debug!(
            id = %id,
            passes,
            chars_lost = outcome.lost.len(),
            "Accelerated decay committed"
        );
        Some(outcome)
    }

    fn passes_for(&self, amount: f64) -> u32 {
        let scaled = (amount * f64::from(self.config.accelerate_passes)).ceil();
        // amount is in (0, 1], so scaled fits in u32.
        (scaled as u32).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryKv;
    use crate::store::MemoryStore;
    use crate::types::ManualClock;
    use chrono::{DateTime, Duration};
    use std::sync::Arc;

    fn setup(texts: &[&str]) -> (DegradationScheduler, Vec<MemoryId>) {
        let store = MemoryStore::in_memory().into_shared();
        let ids = {
            let mut s = store.lock();
            texts
                .iter()
                .map(|t| s.create(t).expect("created").id)
                .collect()
        };
        let scheduler = DegradationScheduler::with_seed(store, &ErodeConfig::default(), 42);
        (scheduler, ids)
    }

    #[test]
    fn accelerate_unknown_id_is_noop() {
        let (mut scheduler, _) = setup(&["a small boat"]);
        let before = serde_json::to_vec(&scheduler.store().lock().list()).expect("encode");

        assert!(scheduler.accelerate(MemoryId::new(), 0.5).is_none());

        let after = serde_json::to_vec(&scheduler.store().lock().list()).expect("encode");
        assert_eq!(before, after);
        assert_eq!(
            scheduler.store().lock().counters().snapshot().unknown_accelerations,
            1
        );
    }

    #[test]
    fn accelerate_adds_amount_to_degradation() {
        let (mut scheduler, ids) = setup(&["the smell of cut grass in june"]);
        scheduler.accelerate(ids[0], 0.2).expect("known id");
        let d1 = scheduler.store().lock().get(ids[0]).expect("present").degradation;
        assert!(d1 >= 0.2 - 1e-9);

        scheduler.accelerate(ids[0], 0.2).expect("known id");
        let d2 = scheduler.store().lock().get(ids[0]).expect("present").degradation;
        assert!(d2 >= d1 + 0.2 - 1e-9 || (d2 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn accelerate_ignores_non_positive_amounts() {
        let (mut scheduler, ids) = setup(&["steady"]);
        assert!(scheduler.accelerate(ids[0], 0.0).is_none());
        assert!(scheduler.accelerate(ids[0], -1.0).is_none());
        assert!(scheduler.accelerate(ids[0], f64::NAN).is_none());
        let e = scheduler.store().lock().get(ids[0]).expect("present");
        assert_eq!(e.current_text, "steady");
    }

    #[test]
    fn accelerate_reaches_terminal_state() {
        let (mut scheduler, ids) =
            setup(&["we drove to the coast and the radio only played static"]);
        for _ in 0..20 {
            scheduler.accelerate(ids[0], 1.0);
        }
        let e = scheduler.store().lock().get(ids[0]).expect("present");
        assert!(e.current_text.trim().is_empty(), "left: {:?}", e.current_text);
        assert!((e.degradation - 1.0).abs() < f64::EPSILON);
        assert_eq!(e.current_text.chars().count(), e.original_text.chars().count());
    }

    #[test]
    fn same_tick_accelerations_compound() {
        let (mut scheduler, ids) = setup(&["two hands on one candle"]);
        scheduler.accelerate(ids[0], 0.1);
        scheduler.accelerate(ids[0], 0.1);
        let e = scheduler.store().lock().get(ids[0]).expect("present");
        assert!(e.degradation >= 0.2 - 1e-9);
    }

    #[test]
    fn tick_ignores_bad_dt() {
        let (mut scheduler, _) = setup(&["quiet"]);
        assert_eq!(scheduler.tick(0.0), TickReport::default());
        assert_eq!(scheduler.tick(-5.0), TickReport::default());
        assert_eq!(scheduler.tick(f64::INFINITY), TickReport::default());
    }

    #[test]
    fn ambient_intensity_grows_with_age_and_is_capped() {
        let (scheduler, _) = setup(&[]);
        let young = scheduler.ambient_intensity(0.0, 5.0);
        let old = scheduler.ambient_intensity(10.0, 5.0);
        assert!(old > young);
        assert!(scheduler.ambient_intensity(1_000.0, 1_000.0) <= 0.05 + f64::EPSILON);
    }

    #[test]
    fn ticks_slowly_erode_and_never_lower_degradation() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp");
        let clock = ManualClock::new(start);
        let store = MemoryStore::with_clock(
            MemoryKv::new(),
            &ErodeConfig::default(),
            Arc::new(clock.clone()),
        )
        .into_shared();
        let id = store.lock().create("the kitchen light at four am").expect("created").id;
        let mut scheduler = DegradationScheduler::with_seed(store, &ErodeConfig::default(), 7);

        clock.advance(Duration::days(30));
        let mut last = 0.0;
        for _ in 0..2_000 {
            scheduler.tick(60.0);
            let e = scheduler.store().lock().get(id).expect("present");
            assert!(e.degradation >= last);
            assert_eq!(e.current_text.chars().count(), e.original_text.chars().count());
            last = e.degradation;
        }
        assert!(last > 0.0, "a month-old memory should have started to fade");
    }

    #[test]
    fn ticks_skip_illegible_memories() {
        let (mut scheduler, ids) = setup(&["gone", "here"]);
        for _ in 0..20 {
            scheduler.accelerate(ids[0], 1.0);
        }
        assert!(scheduler.store().lock().get(ids[0]).expect("present").is_illegible());

        let report = scheduler.tick(1.0);
        assert_eq!(report.visited, 1);
    }

    #[test]
    fn held_store_guard_skips_instead_of_blocking() {
        let (mut scheduler, ids) = setup(&["first light", "second light"]);
        let store = scheduler.store().clone();

        // The list temporary keeps the guard alive for the whole loop.
        for m in store.lock().list_oldest_first() {
            assert!(scheduler.accelerate(m.id, 1.0).is_none());
            assert_eq!(scheduler.tick(60.0), TickReport::default());
        }

        // Once the guard is gone the same calls go through.
        assert!(scheduler.accelerate(ids[0], 1.0).is_some());
        assert!(store.lock().get(ids[0]).expect("present").degradation > 0.0);
    }
}
