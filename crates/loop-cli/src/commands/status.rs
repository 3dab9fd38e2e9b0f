use std::error::Error;

use clap::Args;
use loop_runtime::Runtime;

use super::{print_json, GlobalArgs};

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[arg(long, env = "LOOPAI_TASK_ID")]
    pub task: String,
}

pub fn health(global: &GlobalArgs, args: &StatusArgs) -> Result<(), Box<dyn Error>> {
    let runtime = Runtime::open(global.deployment()?, &args.task)?;
    print_json(&runtime.health())
}

pub fn metrics(global: &GlobalArgs, args: &StatusArgs) -> Result<(), Box<dyn Error>> {
    let runtime = Runtime::open(global.deployment()?, &args.task)?;
    print_json(&runtime.get_metrics()?)
}
