use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use loop_core::errors::{ErrorInfo, LoopError};
use loop_core::oracle::Oracle;
use loop_core::record::OracleResult;
use loop_core::serde::{from_json_str, from_yaml_str};
use loop_core::task::TaskSpecification;
use loop_dataset::DatasetStore;
use loop_host::extract_text;
use loop_runtime::validate_day;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{parse_date, print_json, GlobalArgs};

const REPLAY_PROVIDER: &str = "replay";

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[arg(long, env = "LOOPAI_TASK_ID")]
    pub task: String,
    /// Replay fixture: JSON object from input text to oracle answer
    #[arg(long)]
    pub oracle: PathBuf,
    /// Day to validate (YYYY-MM-DD, UTC); today when omitted
    #[arg(long)]
    pub date: Option<String>,
    /// Task specification (YAML) forwarded to the oracle
    #[arg(long)]
    pub task_file: Option<PathBuf>,
    /// Overrides `sampling.rate`
    #[arg(long)]
    pub rate: Option<f64>,
    /// Overrides `sampling.seed`
    #[arg(long)]
    pub seed: Option<u64>,
    /// Oracle queries in flight; `execution.worker_count` when omitted
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// A fixture answer: a bare label or a full oracle result.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayAnswer {
    Label(String),
    Full(OracleResult),
}

/// Oracle answering from a recorded fixture keyed by input text.
#[derive(Debug)]
struct ReplayOracle {
    answers: BTreeMap<String, ReplayAnswer>,
}

impl ReplayOracle {
    fn load(path: &Path) -> Result<Self, LoopError> {
        let text = fs::read_to_string(path)
            .map_err(|err| LoopError::storage("loop_cli.replay_read", err, path))?;
        Ok(Self {
            answers: from_json_str(&text)?,
        })
    }
}

impl Oracle for ReplayOracle {
    fn query(
        &self,
        _task: &TaskSpecification,
        input: &Map<String, Value>,
    ) -> Result<OracleResult, LoopError> {
        let key = extract_text(input);
        match self.answers.get(&key) {
            Some(ReplayAnswer::Full(result)) => Ok(result.clone()),
            Some(ReplayAnswer::Label(label)) => {
                let mut result = OracleResult::new(label.clone());
                result.provider = REPLAY_PROVIDER.to_string();
                result.model = REPLAY_PROVIDER.to_string();
                Ok(result)
            }
            None => Err(LoopError::Oracle(
                ErrorInfo::new("loop_cli.replay_miss", "no recorded answer for input")
                    .with_context("input", key),
            )),
        }
    }
}

pub fn run(global: &GlobalArgs, args: &ValidateArgs) -> Result<(), Box<dyn Error>> {
    let config = global.deployment()?;
    let date = parse_date(args.date.as_deref())?;
    let sampler = config.sampling.strategy.build(
        args.rate.unwrap_or(config.sampling.rate),
        args.seed.or(config.sampling.seed),
    )?;
    let task = match &args.task_file {
        Some(path) => from_yaml_str::<TaskSpecification>(&fs::read_to_string(path)?)?,
        None => TaskSpecification::new(
            args.task.clone(),
            "replayed validation",
            json!({ "type": "object" }),
            json!({ "type": "string" }),
        ),
    };
    let oracle = ReplayOracle::load(&args.oracle)?;
    let datasets = DatasetStore::new(&config.runtime.data_dir);
    let concurrency = args
        .concurrency
        .unwrap_or(config.execution.worker_count as usize);
    let outcome = validate_day(&datasets, &args.task, &task, date, &sampler, concurrency, &oracle)?;
    print_json(&outcome.report)
}
