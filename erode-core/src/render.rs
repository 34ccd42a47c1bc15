//! Ephemeral render decay for the consumer-side tier.
//!
//! Everything here works on [`MemoryEntity`] snapshots and returns plain
//! `String`s. Nothing in this module can reach the store: extra glitching a
//! surface draws on top of the canonical text is recomputed every frame and
//! never persisted. The only way a consumer changes canonical text is
//! [`DegradationScheduler::accelerate`](crate::scheduler::DegradationScheduler::accelerate).

use rand::Rng;

use crate::config::DecayConfig;
use crate::decay::decay_pass;
use crate::entity::MemoryEntity;

/// Cosmetic tape-loop wear: uniform intensity that grows with pass count.
#[derive(Debug, Clone)]
pub struct TapeLoop {
    passes: u32,
    wear_per_pass: f64,
    decay: DecayConfig,
}

impl TapeLoop {
    /// A fresh loop where each pass adds `wear_per_pass` of intensity.
    #[must_use]
    pub fn new(wear_per_pass: f64) -> Self {
        Self {
            passes: 0,
            wear_per_pass: wear_per_pass.max(0.0),
            decay: DecayConfig::default(),
        }
    }

    /// Count one more pass of the tape.
    pub fn advance(&mut self) {
        self.passes = self.passes.saturating_add(1);
    }

    /// Passes played so far.
    #[must_use]
    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Current cosmetic intensity, in `[0, 1]`.
    #[must_use]
    pub fn intensity(&self) -> f64 {
        (self.wear_per_pass * f64::from(self.passes)).min(1.0)
    }

    /// Render one frame of the snapshot's canonical text with tape wear.
    pub fn render<R: Rng + ?Sized>(&self, snapshot: &MemoryEntity, rng: &mut R) -> String {
        let intensities = vec![self.intensity(); snapshot.char_len()];
        decay_pass(&snapshot.current_text, &intensities, None, &self.decay, rng).text
    }
}

/// Localized touch pressure from a scraping interaction.
///
/// The decay pass subtracts its touch bonus from intensity, so scrape
/// pressure is stored as a negative bonus: the harder a spot is scraped, the
/// more intensity it receives.
#[derive(Debug, Clone)]
pub struct ScrapeField {
    bonus: Vec<f64>,
    decay: DecayConfig,
}

impl ScrapeField {
    /// An untouched field for a text of `len` characters.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            bonus: vec![0.0; len],
            decay: DecayConfig::default(),
        }
    }

    /// Scrape around char index `center`, with linear falloff to zero at
    /// `radius + 1` characters away. Non-positive or NaN `strength` is ignored.
    pub fn scrape(&mut self, center: usize, radius: usize, strength: f64) {
        if self.bonus.is_empty() || strength.is_nan() || strength <= 0.0 {
            return;
        }
        let lo = center.saturating_sub(radius);
        let hi = center.saturating_add(radius).min(self.bonus.len() - 1);
        for i in lo..=hi {
            let distance = i.abs_diff(center) as f64;
            let falloff = 1.0 - distance / (radius as f64 + 1.0);
            self.bonus[i] = (self.bonus[i] - strength * falloff).max(-1.0);
        }
    }

    /// Let pressure fade by `factor` (0 clears it, 1 keeps it). NaN keeps it.
    pub fn relax(&mut self, factor: f64) {
        if factor.is_nan() {
            return;
        }
        let factor = factor.clamp(0.0, 1.0);
        for b in &mut self.bonus {
            *b *= factor;
        }
    }

    /// Scrape pressure at `index` as a positive number.
    #[must_use]
    pub fn pressure(&self, index: usize) -> f64 {
        self.bonus.get(index).map_or(0.0, |b| -b)
    }

    /// Render one frame: `base` intensity everywhere plus scrape pressure.
    pub fn render<R: Rng + ?Sized>(
        &self,
        snapshot: &MemoryEntity,
        base: f64,
        rng: &mut R,
    ) -> String {
        let intensities = vec![base; snapshot.char_len()];
        decay_pass(
            &snapshot.current_text,
            &intensities,
            Some(self.bonus.as_slice()),
            &self.decay,
            rng,
        )
        .text
    }
}

/// A visual-only rewind: captures the text at the start of an interaction and
/// hands it back at the end.
#[derive(Debug, Clone)]
pub struct RewindSnapshot {
    captured: String,
    original: String,
}

impl RewindSnapshot {
    /// Capture `snapshot` as the interaction begins.
    #[must_use]
    pub fn capture(snapshot: &MemoryEntity) -> Self {
        Self {
            captured: snapshot.current_text.clone(),
            original: snapshot.original_text.clone(),
        }
    }

    /// A frame of the rewind effect: at `progress` 0 the captured text, at 1
    /// the original, with characters restored in a fixed scattered order.
    #[must_use]
    pub fn frame(&self, progress: f64) -> String {
        let progress = progress.clamp(0.0, 1.0);
        self.captured
            .chars()
            .zip(self.original.chars())
            .enumerate()
            .map(|(i, (now, was))| {
                if reveal_order(i) < progress { was } else { now }
            })
            .collect()
    }

    /// End the interaction, returning the captured text to draw again.
    #[must_use]
    pub fn restore(self) -> String {
        self.captured
    }
}

/// The first `revealed` characters of `text`, for the ghost-typing readback.
#[must_use]
pub fn ghost_typing(text: &str, revealed: usize) -> String {
    text.chars().take(revealed).collect()
}

// Golden-ratio scatter in [0, 1).
fn reveal_order(index: usize) -> f64 {
    const PHI_FRAC: f64 = 0.618_033_988_749_895;
    (index as f64 * PHI_FRAC).fract()
}
