use std::error::Error;
use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::Args;
use loop_core::serde::to_canonical_json_pretty;
use loop_dataset::DATE_FORMAT;
use loop_runtime::DeploymentConfig;
use serde::Serialize;

pub mod analytics;
pub mod artifact;
pub mod exec;
pub mod retention;
pub mod status;
pub mod validate;
pub mod version;

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Deployment configuration file (YAML)
    #[arg(long, global = true, env = "LOOPAI_CONFIG")]
    pub config: Option<PathBuf>,
    /// Data directory; overrides `runtime.data_dir` of the configuration
    #[arg(long, global = true, env = "LOOPAI_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

impl GlobalArgs {
    /// Loaded configuration, or edge defaults rooted at the data directory.
    pub fn deployment(&self) -> Result<DeploymentConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => DeploymentConfig::load(path)?,
            None => DeploymentConfig::for_data_dir(
                self.data_dir.clone().unwrap_or_else(|| PathBuf::from("data")),
            ),
        };
        if let Some(dir) = &self.data_dir {
            config.runtime.data_dir = dir.clone();
        }
        config.validate()?;
        tracing::debug!(data_dir = %config.runtime.data_dir.display(), mode = ?config.runtime.mode, "resolved deployment");
        Ok(config)
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    let json = to_canonical_json_pretty(value)?;
    println!("{}", String::from_utf8(json)?);
    Ok(())
}

/// `YYYY-MM-DD`, or today in UTC.
pub(crate) fn parse_date(raw: Option<&str>) -> Result<NaiveDate, Box<dyn Error>> {
    match raw {
        Some(text) => NaiveDate::parse_from_str(text, DATE_FORMAT)
            .map_err(|err| format!("invalid date '{text}': {err}").into()),
        None => Ok(Utc::now().date_naive()),
    }
}
