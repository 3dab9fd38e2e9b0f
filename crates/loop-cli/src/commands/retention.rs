use std::error::Error;

use clap::Args;
use loop_dataset::DatasetStore;
use serde::Serialize;

use super::GlobalArgs;

#[derive(Args, Debug)]
pub struct RetentionArgs {
    /// Task key; every task with an execution log when omitted
    #[arg(long, env = "LOOPAI_TASK_ID")]
    pub task: Option<String>,
    /// Overrides `storage.retention_days`
    #[arg(long)]
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
struct Pruned {
    task: String,
    deleted: usize,
}

pub fn run(global: &GlobalArgs, args: &RetentionArgs) -> Result<(), Box<dyn Error>> {
    let config = global.deployment()?;
    let days = args.days.unwrap_or(config.storage.retention_days);
    if days == 0 {
        return Err("--days must be greater than 0".into());
    }
    let datasets = DatasetStore::new(&config.runtime.data_dir).with_retention_days(days);
    let tasks = match &args.task {
        Some(task) => vec![task.clone()],
        None => datasets.list_tasks()?,
    };
    let mut pruned = Vec::with_capacity(tasks.len());
    for task in tasks {
        let deleted = datasets.apply_retention(&task)?;
        pruned.push(Pruned { task, deleted });
    }
    super::print_json(&pruned)
}
