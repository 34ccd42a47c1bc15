//! The memory entity: one user-submitted text and its decay state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StabilityConfig;
use crate::decay::is_illegible;
use crate::error::{ErodeError, Result};
use crate::stability::stability_map;
use crate::types::MemoryId;

/// Where a memory sits on its one-way path to oblivion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradationState {
    /// Untouched: no degradation and text identical to the original.
    Pristine,
    /// Partially altered.
    Decaying,
    /// Nothing legible left (`current_text.trim()` is empty).
    Illegible,
}

/// A single memory tracked by the engine.
///
/// Instances handed out by the store are snapshots; mutating one has no
/// effect on the canonical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntity {
    /// Stable identity, never reused.
    pub id: MemoryId,
    /// Normalized text as first submitted.
    pub original_text: String,
    /// Canonical decayed text; same char count as `original_text`.
    pub current_text: String,
    /// Fraction of legibility lost, in `[0, 1]`, never decreasing.
    pub degradation: f64,
    /// When the memory was submitted.
    pub created_at: DateTime<Utc>,
}

impl MemoryEntity {
    pub(crate) fn new(id: MemoryId, text: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            current_text: text.clone(),
            original_text: text,
            degradation: 0.0,
            created_at,
        }
    }

    /// Per-character stability derived from `original_text`.
    #[must_use]
    pub fn stability(&self, config: &StabilityConfig) -> Vec<f64> {
        stability_map(&self.original_text, config)
    }

    /// Whether nothing legible remains.
    #[must_use]
    pub fn is_illegible(&self) -> bool {
        is_illegible(&self.current_text)
    }

    /// Current position in the degradation state machine.
    #[must_use]
    pub fn state(&self) -> DegradationState {
        if self.is_illegible() {
            DegradationState::Illegible
        } else if self.degradation <= 0.0 && self.current_text == self.original_text {
            DegradationState::Pristine
        } else {
            DegradationState::Decaying
        }
    }

    /// Number of characters (not bytes) in the memory.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.original_text.chars().count()
    }

    /// Check the record-level invariants: length invariance and a finite
    /// degradation inside `[0, 1]`.
    ///
    /// # Errors
    /// Returns [`ErodeError::InvariantViolation`] describing the first broken
    /// invariant.
    pub fn validate(&self) -> Result<()> {
        if self.original_text.chars().count() != self.current_text.chars().count() {
            return Err(self.violation("current_text length differs from original_text"));
        }
        if !self.degradation.is_finite() || !(0.0..=1.0).contains(&self.degradation) {
            return Err(self.violation("degradation outside [0, 1]"));
        }
        if self.original_text.trim().is_empty() {
            return Err(self.violation("original_text is empty"));
        }
        Ok(())
    }

    fn violation(&self, reason: &str) -> ErodeError {
        ErodeError::InvariantViolation {
            id: self.id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Normalize submitted text: trim the ends and collapse every internal run of
/// whitespace to a single ASCII space.
///
/// Typed and spoken input both pass through here before becoming an
/// `original_text`.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
