//! # Erode Core Library
//!
//! The canonical source of truth for memories that fade. A user submits a
//! short text; the engine then wears it away, one character at a time, both
//! slowly over wall-clock time and quickly when a consumer spends it
//! (burning, replaying a tape, scraping).
//!
//! - [`decay`] — the pure per-character decay pass, driven by an injected RNG
//! - [`stability`] — per-character resistance derived from the original text
//! - [`entity`] — the [`MemoryEntity`] record and its state machine
//! - [`store`] — the [`MemoryStore`] registry, its persistence and events
//! - [`scheduler`] — [`DegradationScheduler`]: ambient `tick` and `accelerate`
//! - [`driver`] — a tokio task that ticks the scheduler in the background
//! - [`render`] — ephemeral, consumer-side glitching that is never persisted
//!
//! ## Contract
//!
//! - `current_text` always has the same character count as `original_text`.
//! - `degradation` never decreases.
//! - Nothing in the store or scheduler returns an error or panics on bad
//!   input, unknown ids, or storage failures; those degrade to no-ops.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod codec;
pub mod config;
pub mod decay;
pub mod driver;
pub mod entity;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod render;
pub mod scheduler;
pub mod stability;
pub mod store;
pub mod types;

pub use config::ErodeConfig;
pub use entity::{DegradationState, MemoryEntity};
pub use error::ErodeError;
pub use scheduler::DegradationScheduler;
pub use store::{MemoryEvent, MemoryStore, SharedStore};
pub use types::*;
