//! Alert decision engine for indicator analysis cycles.
//!
//! This crate provides:
//! - Status classification and the per-instance debounce policy
//! - Crossover/informant aggregation into per-market composites
//! - The composite trigger and its fixed-format message
//! - `AlertEngine`, which runs a cycle end to end and keeps the
//!   previous-cycle snapshot

pub mod aggregate;
pub mod classifier;
pub mod composite;
pub mod engine;
pub mod evaluate;
pub mod message;
pub mod policy;

pub use aggregate::{AggregateError, CrossedPair, InformantSnapshot};
pub use classifier::{classify, Classification, CrossoverReading};
pub use composite::{CompositeAlert, CompositeTrigger, JsonIndicator};
pub use engine::{AlertEngine, CompositeOutcome, CycleReport};
pub use evaluate::{evaluate, CycleOutcome};
pub use message::{render_composite, CompositeError};
pub use policy::{AlertFrequency, AlertPolicy, PolicyFault};
