use std::error::Error;

use clap::Args;
use loop_core::serde::from_json_str;
use loop_runtime::Runtime;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{print_json, GlobalArgs};

#[derive(Args, Debug)]
pub struct ExecArgs {
    #[arg(long, env = "LOOPAI_TASK_ID")]
    pub task: String,
    /// Text passed as `{"text": ...}`
    #[arg(long, conflicts_with = "input")]
    pub text: Option<String>,
    /// Raw JSON object input
    #[arg(long)]
    pub input: Option<String>,
    /// Print the full execution record instead of the output
    #[arg(long)]
    pub record: bool,
}

#[derive(Debug, Serialize)]
struct ExecOutput {
    output: String,
    latency_ms: f64,
}

pub fn run(global: &GlobalArgs, args: &ExecArgs) -> Result<(), Box<dyn Error>> {
    let runtime = Runtime::open(global.deployment()?, &args.task)?;
    let input = build_input(args)?;
    if args.record {
        let record = runtime.execute_record(&input)?;
        print_json(&record)?;
        return Ok(());
    }
    let (output, latency_ms) = runtime.execute(&input)?;
    print_json(&ExecOutput { output, latency_ms })
}

fn build_input(args: &ExecArgs) -> Result<Map<String, Value>, Box<dyn Error>> {
    match (&args.text, &args.input) {
        (Some(text), _) => {
            let mut input = Map::new();
            input.insert("text".into(), Value::String(text.clone()));
            Ok(input)
        }
        (None, Some(raw)) => Ok(from_json_str(raw)?),
        (None, None) => Err("either --text or --input is required".into()),
    }
}
