use std::error::Error;
use std::io;
use std::path::PathBuf;

use clap::Args;
use loop_dataset::{export_analytics_csv, write_analytics_csv, DatasetStore};

use super::{parse_date, print_json, GlobalArgs};

#[derive(Args, Debug)]
pub struct AnalyticsArgs {
    #[arg(long, env = "LOOPAI_TASK_ID")]
    pub task: String,
    /// Day to summarize (YYYY-MM-DD, UTC); today when omitted
    #[arg(long)]
    pub date: Option<String>,
    /// Summarize every day with an execution partition
    #[arg(long, conflicts_with = "date")]
    pub all: bool,
    /// Write CSV to this path; `-` writes CSV to stdout
    #[arg(long)]
    pub csv: Option<PathBuf>,
    /// Print the day's validation summary instead
    #[arg(long, conflicts_with_all = ["all", "csv"])]
    pub validations: bool,
}

pub fn run(global: &GlobalArgs, args: &AnalyticsArgs) -> Result<(), Box<dyn Error>> {
    let config = global.deployment()?;
    let datasets = DatasetStore::new(&config.runtime.data_dir);
    let task = args.task.as_str();
    if args.validations {
        let date = parse_date(args.date.as_deref())?;
        return print_json(&datasets.validation_summary(task, date)?);
    }
    let dates = if args.all {
        datasets.list_execution_dates(task)?
    } else {
        vec![parse_date(args.date.as_deref())?]
    };
    let mut rows = Vec::with_capacity(dates.len());
    for date in dates {
        rows.push(datasets.compute_daily_analytics(task, date)?);
    }
    match &args.csv {
        Some(path) if path.as_os_str() == "-" => {
            write_analytics_csv(&rows, io::stdout().lock())?;
        }
        Some(path) => {
            export_analytics_csv(&rows, path)?;
            println!("wrote {} rows to {}", rows.len(), path.display());
        }
        None if args.all => print_json(&rows)?,
        None => {
            if let Some(row) = rows.first() {
                print_json(row)?;
            }
        }
    }
    Ok(())
}
