use std::collections::BTreeSet;

use loop_core::{ErrorInfo, ExecutionRecord, LoopError, ProgramId, TaskId};
use loop_validate::{RandomSampler, SamplingKind};
use proptest::prelude::*;
use serde_json::Map;

fn successes(n: usize) -> Vec<ExecutionRecord> {
    let program = ProgramId::new();
    let task = TaskId::new();
    (0..n)
        .map(|_| ExecutionRecord::success(program, task, Map::new(), "ham".into(), 1.0))
        .collect()
}

fn failed() -> ExecutionRecord {
    let err = LoopError::Timeout(ErrorInfo::new("loop_host.timeout", "too slow"));
    ExecutionRecord::failure(ProgramId::new(), TaskId::new(), Map::new(), &err, 1000.0)
}

#[test]
fn two_hundred_at_twenty_percent_selects_forty() {
    let executions = successes(200);
    let sampler = RandomSampler::new(0.2, Some(42)).expect("sampler");
    let selected = sampler.select_for_validation(&executions);
    assert_eq!(selected.len(), 40);
    assert!(selected.iter().all(|&idx| idx < 200));
    assert_eq!(sampler.select_for_validation(&executions), selected);
}

#[test]
fn only_successful_executions_are_eligible() {
    let mut executions = successes(3);
    executions.insert(1, failed());
    executions.push(failed());
    let sampler = RandomSampler::new(1.0, Some(7)).expect("sampler");
    let selected = sampler.select_for_validation(&executions);
    assert_eq!(selected, BTreeSet::from([0, 2, 3]));

    let none = vec![failed(), failed()];
    assert!(sampler.select_for_validation(&none).is_empty());
    assert!(sampler.select_for_validation(&[]).is_empty());
}

#[test]
fn small_batches_still_sample_one() {
    let sampler = RandomSampler::new(0.05, Some(1)).expect("sampler");
    assert_eq!(sampler.sample_size(3), 1);
    assert_eq!(sampler.select_for_validation(&successes(3)).len(), 1);
    let zero = RandomSampler::new(0.0, Some(1)).expect("sampler");
    assert_eq!(zero.sample_size(10), 1);
}

#[test]
fn mark_sampled_is_idempotent() {
    let mut executions = successes(10);
    let sampler = RandomSampler::new(0.3, Some(9)).expect("sampler");
    let selected = sampler.select_for_validation(&executions);
    assert_eq!(sampler.mark_sampled(&mut executions, &selected), 3);
    assert_eq!(sampler.mark_sampled(&mut executions, &selected), 0);
    for (idx, record) in executions.iter().enumerate() {
        assert_eq!(record.sampled_for_validation, selected.contains(&idx));
    }
    let stray = BTreeSet::from([99]);
    assert_eq!(sampler.mark_sampled(&mut executions, &stray), 0);
}

#[test]
fn rates_outside_unit_interval_are_rejected() {
    for rate in [-0.1, 1.5, f64::NAN] {
        let err = RandomSampler::new(rate, None).expect_err("invalid rate");
        assert!(matches!(err, LoopError::Invalid(_)));
    }
}

#[test]
fn substreams_differ_but_repeat() {
    let executions = successes(500);
    let base = RandomSampler::new(0.1, Some(2024)).expect("sampler");
    let day_one = base.for_substream(1).select_for_validation(&executions);
    let day_two = base.for_substream(2).select_for_validation(&executions);
    assert_ne!(day_one, day_two);
    assert_eq!(base.for_substream(1).select_for_validation(&executions), day_one);
    assert_eq!(RandomSampler::new(0.1, None).expect("sampler").for_substream(1).seed(), None);
}

#[test]
fn only_random_strategy_builds() {
    assert!(SamplingKind::Random.build(0.1, None).is_ok());
    for kind in [SamplingKind::Uncertainty, SamplingKind::Stratified] {
        assert!(matches!(kind.build(0.1, None), Err(LoopError::Unsupported(_))));
    }
    assert_eq!("stratified".parse::<SamplingKind>().expect("parse"), SamplingKind::Stratified);
    assert!("bogus".parse::<SamplingKind>().is_err());
}

proptest! {
    #[test]
    fn selection_respects_bounds(n in 0usize..300, rate in 0.0f64..=1.0, seed in any::<u64>()) {
        let executions = successes(n);
        let sampler = RandomSampler::new(rate, Some(seed)).expect("sampler");
        let selected = sampler.select_for_validation(&executions);
        if n == 0 {
            prop_assert!(selected.is_empty());
        } else {
            let upper = ((n as f64) * rate).floor().max(1.0) as usize;
            prop_assert!(!selected.is_empty());
            prop_assert!(selected.len() <= upper.min(n));
            prop_assert!(selected.iter().all(|&idx| idx < n));
        }
        prop_assert_eq!(sampler.select_for_validation(&executions), selected);
    }
}
