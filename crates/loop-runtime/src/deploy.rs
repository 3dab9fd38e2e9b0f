use chrono::Utc;
use loop_core::artifact::{ProgramStatus, DEFAULT_LANGUAGE};
use loop_core::errors::LoopError;
use loop_core::oracle::ProgramGenerator;
use loop_core::task::TaskSpecification;
use loop_host::estimate_complexity;
use loop_store::{ArtifactMetadata, ArtifactStore};

/// Asks `generator` for a program, stores it as the task's next version
/// and, when `activate` is set, makes it the active version.
///
/// The generated artifact is re-owned by `task` and numbered by the store.
/// Missing complexity metrics are estimated for `loopscript` sources.
pub fn publish_generated<G: ProgramGenerator + ?Sized>(
    store: &ArtifactStore,
    generator: &G,
    task: &TaskSpecification,
    task_key: &str,
    activate: bool,
) -> Result<ArtifactMetadata, LoopError> {
    task.validate()?;
    let mut artifact = generator.generate(task)?;
    artifact.task_id = task.id;
    artifact.version = store.next_version(task_key)?;
    if artifact.complexity_metrics.is_empty()
        && artifact.language.eq_ignore_ascii_case(DEFAULT_LANGUAGE)
    {
        artifact.complexity_metrics = estimate_complexity(&artifact.code);
    }
    if activate {
        artifact.status = ProgramStatus::Active;
        artifact.deployment_percentage = 100.0;
        artifact.deployed_at = Some(Utc::now());
    }
    let metadata = store.store(task_key, &artifact)?;
    if activate {
        store.set_active(task_key, artifact.version)?;
    }
    tracing::info!(
        task = task_key,
        version = artifact.version,
        activated = activate,
        "published generated program"
    );
    Ok(metadata)
}
