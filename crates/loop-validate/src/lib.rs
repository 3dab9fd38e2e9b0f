//! Sampled validation of program executions against an oracle.
//!
//! The [`RandomSampler`] picks which successful executions are checked,
//! the [`ComparisonEngine`] turns an oracle answer into a
//! [`loop_core::ValidationRecord`], and [`ValidationJob`] runs both over a
//! batch with bounded oracle concurrency.

pub mod batch;
pub mod compare;
pub mod sampler;

pub use batch::{BatchOutcome, BatchReport, ValidationJob};
pub use compare::{normalize, ComparisonEngine, MISMATCH_CATEGORY};
pub use sampler::{RandomSampler, SamplingKind};
