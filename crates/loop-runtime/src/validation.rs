use chrono::{Datelike, NaiveDate};
use loop_core::errors::LoopError;
use loop_core::oracle::Oracle;
use loop_core::task::TaskSpecification;
use loop_dataset::DatasetStore;
use loop_validate::{BatchOutcome, RandomSampler, ValidationJob};

/// Substream id of a calendar day.
pub fn day_number(date: NaiveDate) -> u64 {
    u64::try_from(date.num_days_from_ce()).unwrap_or(0)
}

/// Validates one day of logged executions against `oracle` and appends the
/// resulting validations to the validation log.
///
/// The sampler is re-seeded per day with the day's substream, so a fixed
/// master seed picks a different but reproducible subset each day. Running
/// the same day twice validates the same picks again.
pub fn validate_day<O: Oracle + ?Sized>(
    datasets: &DatasetStore,
    task_key: &str,
    task: &TaskSpecification,
    date: NaiveDate,
    sampler: &RandomSampler,
    concurrency: usize,
    oracle: &O,
) -> Result<BatchOutcome, LoopError> {
    let mut executions = datasets.read(task_key, date)?;
    let job =
        ValidationJob::new(sampler.for_substream(day_number(date))).with_concurrency(concurrency);
    let outcome = job.run(task, &mut executions, oracle)?;
    for validation in &outcome.validations {
        datasets.log_validation(task_key, validation)?;
    }
    tracing::info!(
        task = task_key,
        %date,
        validated = outcome.report.validated,
        agreement = outcome.report.agreement_rate,
        "validated day partition"
    );
    Ok(outcome)
}
