//! Batch validation with a bounded oracle worker pool.

use loop_core::errors::{ErrorInfo, LoopError};
use loop_core::oracle::Oracle;
use loop_core::record::{ComparisonMethod, ExecutionRecord, ValidationRecord};
use loop_core::task::TaskSpecification;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compare::ComparisonEngine;
use crate::sampler::RandomSampler;

/// Counts produced by one [`ValidationJob::run`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub executions: usize,
    pub sampled: usize,
    pub validated: usize,
    pub matched: usize,
    pub oracle_failures: usize,
    pub agreement_rate: f64,
    pub total_oracle_cost: f64,
}

/// Report plus the validation records, in ascending execution index order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub report: BatchReport,
    pub validations: Vec<ValidationRecord>,
}

/// Samples a batch, queries the oracle for the picks and compares.
#[derive(Debug, Clone)]
pub struct ValidationJob {
    sampler: RandomSampler,
    engine: ComparisonEngine,
    method: ComparisonMethod,
    concurrency: usize,
}

impl ValidationJob {
    pub fn new(sampler: RandomSampler) -> Self {
        Self {
            sampler,
            engine: ComparisonEngine::new(),
            method: ComparisonMethod::Exact,
            concurrency: 4,
        }
    }

    pub fn with_method(mut self, method: ComparisonMethod) -> Self {
        self.method = method;
        self
    }

    /// Maximum number of oracle queries in flight. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn sampler(&self) -> &RandomSampler {
        &self.sampler
    }

    /// Runs the job over `executions`.
    ///
    /// Sampled records get `sampled_for_validation` set and, once compared,
    /// their `validation_id`. An oracle failure is counted and logged; its
    /// execution stays sampled without a validation so a later run can
    /// retry it. An unsupported comparison method fails before any oracle
    /// query is made.
    pub fn run<O: Oracle + ?Sized>(
        &self,
        task: &TaskSpecification,
        executions: &mut [ExecutionRecord],
        oracle: &O,
    ) -> Result<BatchOutcome, LoopError> {
        self.engine.ensure_supported(self.method)?;
        let selected = self.sampler.select_for_validation(executions);
        self.sampler.mark_sampled(executions, &selected);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .build()
            .map_err(|err| {
                LoopError::Runtime(ErrorInfo::new("loop_validate.thread_pool", err.to_string()))
            })?;
        let picks: Vec<usize> = selected.iter().copied().collect();
        let records: &[ExecutionRecord] = executions;
        let results: Vec<(usize, Result<ValidationRecord, LoopError>)> = pool.install(|| {
            picks
                .par_iter()
                .map(|&idx| {
                    let execution = &records[idx];
                    let outcome = oracle
                        .query(task, &execution.input)
                        .and_then(|answer| self.engine.compare(execution, &answer, self.method));
                    (idx, outcome)
                })
                .collect()
        });

        let mut report = BatchReport {
            executions: executions.len(),
            sampled: picks.len(),
            ..BatchReport::default()
        };
        let mut validations = Vec::with_capacity(results.len());
        for (idx, outcome) in results {
            match outcome {
                Ok(validation) => {
                    executions[idx].validation_id = Some(validation.id);
                    report.validated += 1;
                    if validation.is_match {
                        report.matched += 1;
                    }
                    report.total_oracle_cost += validation.oracle_cost;
                    validations.push(validation);
                }
                Err(err) => {
                    report.oracle_failures += 1;
                    tracing::warn!(
                        execution = %executions[idx].id,
                        error = %err,
                        "oracle validation failed"
                    );
                }
            }
        }
        if report.validated > 0 {
            report.agreement_rate = report.matched as f64 / report.validated as f64;
        }
        tracing::info!(
            task = %task.name,
            sampled = report.sampled,
            validated = report.validated,
            matched = report.matched,
            failures = report.oracle_failures,
            "validation batch finished"
        );
        Ok(BatchOutcome {
            report,
            validations,
        })
    }
}
