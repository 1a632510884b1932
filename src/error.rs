//! Runtime error type for the simulation engine.
//!
//! Configuration problems are reported through [`ConfigError`] before any
//! tick runs. Everything else in here is a broken internal invariant: none of
//! these are expected in a correct run and none are retried.

use thiserror::Error;

use crate::config::ConfigError;
use crate::types::{SectionKind, Tick};

/// Errors raised while building or stepping a simulation.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("pop from empty queue at section {section}")]
    EmptyQueue { section: SectionKind },

    #[error("no idle subsection left at section {section} (capacity {capacity})")]
    PoolExhausted { section: SectionKind, capacity: usize },

    #[error("released an already idle subsection at section {section}")]
    SubsectionAlreadyIdle { section: SectionKind },

    #[error("drain phase did not finish within {limit} ticks")]
    DrainLimitExceeded { limit: Tick },

    #[error("invariant violated at tick {tick}: {detail}")]
    InvariantViolation { tick: Tick, detail: String },
}

/// Result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;
