//! Per-character resistance to decay.
//!
//! Stability is derived from the original text only, so it is recomputed on
//! demand and never stored. A score of `1.0` means the character cannot be
//! touched by stability-weighted decay; `0.0` means it takes the full
//! intensity.
//!
//! The policy keeps the *shape* of a memory readable the longest:
//! - whitespace is maximally stable, so word boundaries persist
//! - the first letter of each word gets a bonus
//! - vowels get a penalty

use crate::config::StabilityConfig;

/// Stability assigned to whitespace.
pub const WHITESPACE_STABILITY: f64 = 1.0;

/// Compute the per-character stability map of `text` with the given policy.
///
/// The result has exactly one entry per `char` of `text`.
#[must_use]
pub fn stability_map(text: &str, config: &StabilityConfig) -> Vec<f64> {
    let mut previous_was_space = true;
    text.chars()
        .map(|c| {
            if c.is_whitespace() {
                previous_was_space = true;
                return WHITESPACE_STABILITY;
            }
            let mut score = config.base;
            if previous_was_space {
                score += config.word_initial_bonus;
            }
            if is_vowel(c) {
                score -= config.vowel_penalty;
            }
            previous_was_space = false;
            score.clamp(0.0, 1.0)
        })
        .collect()
}

/// A stability map that offers no resistance anywhere (uniform intensity).
#[must_use]
pub fn uniform(len: usize) -> Vec<f64> {
    vec![0.0; len]
}

/// Fold a stability map into per-character intensities:
/// `intensity[i] = base * (1 - stability[i])`.
///
/// Missing stability entries count as `0.0`.
#[must_use]
pub fn fold_intensity(base: f64, stability: &[f64], len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| {
            let s = stability.get(i).copied().unwrap_or(0.0).clamp(0.0, 1.0);
            base * (1.0 - s)
        })
        .collect()
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'A' | 'E' | 'I' | 'O' | 'U')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn one_score_per_char() {
        let text = "naïve café";
        let map = stability_map(text, &StabilityConfig::default());
        assert_eq!(map.len(), text.chars().count());
    }

    #[test]
    fn whitespace_is_maximally_stable() {
        let map = stability_map("a cat sat", &StabilityConfig::default());
        assert!(approx(map[1], 1.0));
        assert!(approx(map[5], 1.0));
    }

    #[test]
    fn word_initials_beat_interior_vowels() {
        let map = stability_map("a cat sat", &StabilityConfig::default());
        // "a" (initial vowel), "c" (initial), "a" (interior vowel), "t" (interior)
        assert!(approx(map[0], 0.6));
        assert!(approx(map[2], 0.8));
        assert!(approx(map[3], 0.3));
        assert!(approx(map[4], 0.5));
        assert!(map[6] > map[7], "initial 's' should outrank interior 'a'");
    }

    #[test]
    fn scores_are_clamped() {
        let config = StabilityConfig {
            base: 0.9,
            word_initial_bonus: 0.9,
            vowel_penalty: 2.0,
        };
        let map = stability_map("bo", &config);
        assert!(approx(map[0], 1.0));
        assert!(approx(map[1], 0.0));
    }

    #[test]
    fn fold_pads_missing_entries() {
        let folded = fold_intensity(0.5, &[1.0, 0.5], 3);
        assert_eq!(folded.len(), 3);
        assert!(approx(folded[0], 0.0));
        assert!(approx(folded[1], 0.25));
        assert!(approx(folded[2], 0.5));
    }
}
