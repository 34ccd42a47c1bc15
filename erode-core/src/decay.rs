//! Stochastic per-character text decay.
//!
//! One pass walks the text and, for every non-whitespace character, rolls
//! whether it is hit and, if so, how it degrades:
//!
//! ```text
//! chance = clamp(intensity[i] - touch_bonus[i], 0, 1) * 0.15
//! r ~ U(0,1)      r >= chance  → survives
//! m ~ U(0,1)      m <  0.30    → drop   (replaced by a space)
//!                 m <  0.50    → static (replaced by a noise glyph)
//!                 m <  0.70    → echo   (copies the previous non-space char)
//!                 otherwise    → survives
//! ```
//!
//! The pass never inserts or removes characters, so the output always has the
//! same `char` count as the input. Randomness comes only from the supplied
//! RNG; the same text, intensities and seed reproduce the same result.
//!
//! Stability is deliberately not applied inside [`decay_pass`]. Callers fold
//! their own policy into per-character intensities first; [`decay`] is the
//! convenience for the common `base * (1 - stability[i])` folding.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::DecayConfig;
use crate::stability::fold_intensity;

/// Glyphs used by the static mode. None of them is whitespace.
pub const NOISE_GLYPHS: [char; 8] = ['░', '▒', '▓', '·', '~', '#', '*', '%'];

/// How a character was degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecayMode {
    /// Replaced by a space.
    Drop,
    /// Replaced by a noise glyph.
    Static,
    /// Replaced by the previous non-space character.
    Echo,
}

/// A character that changed during a pass.
///
/// Purely observational: consumers use these to spawn "lost letter" effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LostChar {
    /// Char index in the text.
    pub index: usize,
    /// The character before this pass touched it.
    pub ch: char,
    /// What happened to it.
    pub mode: DecayMode,
}

/// Result of one or more decay passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecayOutcome {
    /// The degraded text.
    pub text: String,
    /// Every change made, in the order it happened.
    pub lost: Vec<LostChar>,
}

impl DecayOutcome {
    /// Whether the pass left the text untouched.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.lost.is_empty()
    }
}

/// Run one decay pass with a stability map folded into a uniform base
/// intensity, using the default decay constants.
#[must_use]
pub fn decay<R: Rng + ?Sized>(
    text: &str,
    stability: &[f64],
    intensity: f64,
    rng: &mut R,
) -> DecayOutcome {
    let len = text.chars().count();
    let intensities = fold_intensity(intensity, stability, len);
    decay_pass(text, &intensities, None, &DecayConfig::default(), rng)
}

/// Run one decay pass with explicit per-character intensities.
///
/// `intensities` and `touch_bonus` are indexed by char position; missing
/// entries count as `0.0`. Whitespace is never touched and draws no random
/// numbers.
#[must_use]
pub fn decay_pass<R: Rng + ?Sized>(
    text: &str,
    intensities: &[f64],
    touch_bonus: Option<&[f64]>,
    config: &DecayConfig,
    rng: &mut R,
) -> DecayOutcome {
    let mut out = String::with_capacity(text.len());
    let mut lost = Vec::new();
    let mut last_non_space: Option<char> = None;

    for (index, ch) in text.chars().enumerate() {
        if ch.is_whitespace() {
            out.push(ch);
            continue;
        }

        let intensity = intensities.get(index).copied().unwrap_or(0.0);
        let bonus = touch_bonus
            .and_then(|b| b.get(index).copied())
            .unwrap_or(0.0);
        let chance = hit_chance(intensity - bonus, config.chance_scale);

        let mut next = ch;
        let mut mode = None;
        let r: f64 = rng.r#gen();
        if r < chance {
            let m: f64 = rng.r#gen();
            if m < config.drop_threshold {
                next = ' ';
                mode = Some(DecayMode::Drop);
            } else if m < config.static_threshold {
                next = NOISE_GLYPHS[rng.gen_range(0..NOISE_GLYPHS.len())];
                mode = Some(DecayMode::Static);
            } else if m < config.echo_threshold {
                if let Some(prev) = last_non_space {
                    next = prev;
                    mode = Some(DecayMode::Echo);
                }
            }
        }

        if let Some(mode) = mode {
            if next != ch {
                lost.push(LostChar { index, ch, mode });
            }
        }
        if next != ' ' {
            last_non_space = Some(next);
        }
        out.push(next);
    }

    DecayOutcome { text: out, lost }
}

/// Run `passes` consecutive decay passes, feeding each output into the next.
#[must_use]
pub fn decay_passes<R: Rng + ?Sized>(
    text: &str,
    intensities: &[f64],
    touch_bonus: Option<&[f64]>,
    config: &DecayConfig,
    passes: u32,
    rng: &mut R,
) -> DecayOutcome {
    let mut outcome = DecayOutcome {
        text: text.to_string(),
        lost: Vec::new(),
    };
    for _ in 0..passes {
        let next = decay_pass(&outcome.text, intensities, touch_bonus, config, rng);
        outcome.text = next.text;
        outcome.lost.extend(next.lost);
    }
    outcome
}

/// Fraction of character positions that differ between `before` and `after`.
///
/// Returns `0.0` for empty text.
#[must_use]
pub fn fraction_changed(before: &str, after: &str) -> f64 {
    let total = before.chars().count();
    if total == 0 {
        return 0.0;
    }
    let changed = before
        .chars()
        .zip(after.chars())
        .filter(|(a, b)| a != b)
        .count();
    changed as f64 / total as f64
}

/// Whether the text has nothing legible left.
#[must_use]
pub fn is_illegible(text: &str) -> bool {
    text.trim().is_empty()
}

fn hit_chance(raw: f64, scale: f64) -> f64 {
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, 1.0) * scale
}
