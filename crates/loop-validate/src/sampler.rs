//! Random sampling of successful executions for oracle validation.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use loop_core::errors::{ErrorInfo, LoopError};
use loop_core::record::ExecutionRecord;
use loop_core::rng::{derive_substream_seed, RngHandle};
use serde::{Deserialize, Serialize};

/// Sampling strategies accepted in deployment configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingKind {
    /// Uniform sampling without replacement.
    #[default]
    Random,
    /// Prefer low-confidence outputs. Not implemented.
    Uncertainty,
    /// Sample evenly across output classes. Not implemented.
    Stratified,
}

impl SamplingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SamplingKind::Random => "random",
            SamplingKind::Uncertainty => "uncertainty",
            SamplingKind::Stratified => "stratified",
        }
    }

    /// Builds the sampler for this strategy.
    pub fn build(self, rate: f64, seed: Option<u64>) -> Result<RandomSampler, LoopError> {
        match self {
            SamplingKind::Random => RandomSampler::new(rate, seed),
            other => Err(LoopError::Unsupported(
                ErrorInfo::new(
                    "loop_validate.sampling_strategy",
                    format!("sampling strategy '{other}' is not implemented"),
                )
                .with_hint("use `random`"),
            )),
        }
    }
}

impl fmt::Display for SamplingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SamplingKind {
    type Err = LoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(SamplingKind::Random),
            "uncertainty" => Ok(SamplingKind::Uncertainty),
            "stratified" => Ok(SamplingKind::Stratified),
            other => Err(LoopError::Invalid(ErrorInfo::new(
                "loop_validate.sampling_strategy",
                format!("unknown sampling strategy '{other}'"),
            ))),
        }
    }
}

/// Uniform sampler over the successful executions of a batch.
///
/// For `N` successful executions the sample holds
/// `min(N, max(1, floor(N * rate)))` indices; with no successful
/// executions it is empty. Failed and timed-out executions are never
/// eligible. Every call seeds a fresh RNG, so a seeded sampler returns the
/// same set for the same batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomSampler {
    rate: f64,
    seed: Option<u64>,
}

impl RandomSampler {
    pub fn new(rate: f64, seed: Option<u64>) -> Result<Self, LoopError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(LoopError::Invalid(
                ErrorInfo::new(
                    "loop_validate.sampling_rate",
                    format!("sampling rate must be between 0.0 and 1.0, got {rate}"),
                )
                .with_context("rate", rate.to_string()),
            ));
        }
        Ok(Self { rate, seed })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Sampler whose seed is derived from this one's for `substream`.
    /// Unseeded samplers stay unseeded.
    pub fn for_substream(&self, substream: u64) -> Self {
        Self {
            rate: self.rate,
            seed: self.seed.map(|seed| derive_substream_seed(seed, substream)),
        }
    }

    /// Number of indices drawn from `successful` eligible executions.
    pub fn sample_size(&self, successful: usize) -> usize {
        if successful == 0 {
            return 0;
        }
        let wanted = ((successful as f64) * self.rate).floor() as usize;
        wanted.max(1).min(successful)
    }

    /// Ascending indices of the executions picked for validation.
    pub fn select_for_validation(&self, executions: &[ExecutionRecord]) -> BTreeSet<usize> {
        let eligible: Vec<usize> = executions
            .iter()
            .enumerate()
            .filter(|(_, record)| record.is_success())
            .map(|(idx, _)| idx)
            .collect();
        let amount = self.sample_size(eligible.len());
        if amount == 0 {
            return BTreeSet::new();
        }
        let mut rng = RngHandle::from_optional_seed(self.seed);
        rand::seq::index::sample(rng.inner_mut(), eligible.len(), amount)
            .into_iter()
            .map(|pick| eligible[pick])
            .collect()
    }

    /// Sets `sampled_for_validation` on the given indices. Returns how many
    /// records changed, so a repeated call reports zero.
    pub fn mark_sampled(
        &self,
        executions: &mut [ExecutionRecord],
        indices: &BTreeSet<usize>,
    ) -> usize {
        let mut changed = 0;
        for &idx in indices {
            match executions.get_mut(idx) {
                Some(record) => {
                    if record.mark_sampled() {
                        changed += 1;
                    }
                }
                None => tracing::warn!(
                    index = idx,
                    len = executions.len(),
                    "ignoring out-of-range sample index"
                ),
            }
        }
        changed
    }
}
