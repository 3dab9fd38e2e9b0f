use std::error::Error;
use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use clap::{Args, Subcommand};
use loop_core::artifact::{ProgramArtifact, ProgramStatus, SynthesisStrategy, DEFAULT_LANGUAGE};
use loop_core::ids::TaskId;
use loop_host::estimate_complexity;
use loop_store::ArtifactStore;
use serde::Serialize;

use super::{print_json, GlobalArgs};

#[derive(Args, Debug)]
pub struct ArtifactArgs {
    /// Task key the artifacts belong to
    #[arg(long, env = "LOOPAI_TASK_ID")]
    pub task: String,
    #[command(subcommand)]
    pub command: ArtifactCommand,
}

#[derive(Subcommand, Debug)]
pub enum ArtifactCommand {
    /// Store a program source file as a new version
    Store {
        /// Program source file
        path: PathBuf,
        /// Explicit version; defaults to the next free one
        #[arg(long)]
        version: Option<u32>,
        #[arg(long, default_value = DEFAULT_LANGUAGE)]
        language: String,
        #[arg(long, default_value = "auto")]
        strategy: SynthesisStrategy,
        #[arg(long, default_value_t = 0.5)]
        confidence: f64,
        /// Make the stored version active
        #[arg(long)]
        activate: bool,
    },
    /// List stored versions with the active one flagged
    List,
    /// Show one version's metadata (the active one by default)
    Show {
        #[arg(long)]
        version: Option<u32>,
        /// Include the program source
        #[arg(long)]
        code: bool,
    },
    /// Point the task at a stored version
    Activate { version: u32 },
    /// Check a version's code hash against its metadata
    Verify { version: u32 },
}

#[derive(Debug, Serialize)]
struct ListedVersion {
    version: u32,
    active: bool,
    status: ProgramStatus,
    confidence_score: f64,
    created_at: chrono::DateTime<Utc>,
}

pub fn run(global: &GlobalArgs, args: &ArtifactArgs) -> Result<(), Box<dyn Error>> {
    let config = global.deployment()?;
    let store = ArtifactStore::new(&config.runtime.data_dir);
    let task = args.task.as_str();
    match &args.command {
        ArtifactCommand::Store {
            path,
            version,
            language,
            strategy,
            confidence,
            activate,
        } => {
            let code = fs::read_to_string(path)
                .map_err(|err| format!("cannot read {}: {err}", path.display()))?;
            let version = match version {
                Some(version) => *version,
                None => store.next_version(task)?,
            };
            let mut artifact = ProgramArtifact::new(owning_task(&store, task)?, version, code)
                .with_language(language.clone())
                .with_strategy(*strategy);
            artifact.confidence_score = *confidence;
            if artifact.language.eq_ignore_ascii_case(DEFAULT_LANGUAGE) {
                artifact.complexity_metrics = estimate_complexity(&artifact.code);
            }
            if *activate {
                artifact.status = ProgramStatus::Active;
                artifact.deployment_percentage = 100.0;
                artifact.deployed_at = Some(Utc::now());
            }
            let metadata = store.store(task, &artifact)?;
            if *activate {
                store.set_active(task, version)?;
            }
            print_json(&metadata)?;
        }
        ArtifactCommand::List => {
            let active = store.active_version(task)?;
            let mut listed = Vec::new();
            for summary in store.summaries(task)? {
                listed.push(ListedVersion {
                    version: summary.version,
                    active: active == Some(summary.version),
                    status: summary.status,
                    confidence_score: summary.confidence_score,
                    created_at: summary.created_at,
                });
            }
            print_json(&listed)?;
        }
        ArtifactCommand::Show { version, code } => {
            let version = match version {
                Some(version) => *version,
                None => store
                    .active_version(task)?
                    .ok_or_else(|| format!("task '{task}' has no active version"))?,
            };
            let missing = || format!("task '{task}' has no version {version}");
            if *code {
                print_json(&store.get(task, version)?.ok_or_else(missing)?)?;
            } else {
                print_json(&store.load_metadata(task, version)?.ok_or_else(missing)?)?;
            }
        }
        ArtifactCommand::Activate { version } => {
            store.set_active(task, *version)?;
            println!("task {task} now serves v{version}");
        }
        ArtifactCommand::Verify { version } => {
            let metadata = store.verify(task, *version)?;
            println!("v{version} ok {}", metadata.code_sha256);
        }
    }
    Ok(())
}

/// Task id of the newest stored version, or a fresh id for a new task.
fn owning_task(store: &ArtifactStore, task: &str) -> Result<TaskId, Box<dyn Error>> {
    match store.list_versions(task)?.last() {
        Some(&latest) => Ok(store
            .load_metadata(task, latest)?
            .map(|metadata| metadata.task_id)
            .unwrap_or_default()),
        None => Ok(TaskId::new()),
    }
}
