use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use loop_core::artifact::{
    ArtifactSummary, ComplexityMetrics, ProgramArtifact, ProgramStatus, SynthesisStrategy,
};
use loop_core::errors::{ErrorInfo, LoopError};
use loop_core::ids::{validate_task_key, ProgramId, TaskId};
use loop_core::provenance::GenerationProvenance;
use loop_core::serde::{from_json_slice, to_canonical_json_pretty};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::pointer::{default_pointer, parse_version_dir, version_dir_name, ActivePointer};

/// Program source file inside a version directory.
pub const PROGRAM_FILE: &str = "program.loop";
/// Metadata file inside a version directory.
pub const METADATA_FILE: &str = "metadata.json";

const ARTIFACTS_DIR: &str = "artifacts";
const RETIRED_PREFIX: &str = ".retired-v";
const READ_ATTEMPTS: usize = 8;

/// Hex SHA-256 of program source.
pub fn compute_code_hash(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// Everything persisted about an artifact except its source, plus the
/// source digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub id: ProgramId,
    pub task_id: TaskId,
    pub version: u32,
    pub language: String,
    pub synthesis_strategy: SynthesisStrategy,
    pub confidence_score: f64,
    #[serde(default)]
    pub complexity_metrics: ComplexityMetrics,
    #[serde(flatten)]
    pub provenance: GenerationProvenance,
    pub status: ProgramStatus,
    #[serde(default)]
    pub deployment_percentage: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deployed_at: Option<DateTime<Utc>>,
    pub code_sha256: String,
}

impl ArtifactMetadata {
    pub fn from_artifact(artifact: &ProgramArtifact) -> Self {
        Self {
            id: artifact.id,
            task_id: artifact.task_id,
            version: artifact.version,
            language: artifact.language.clone(),
            synthesis_strategy: artifact.synthesis_strategy,
            confidence_score: artifact.confidence_score,
            complexity_metrics: artifact.complexity_metrics.clone(),
            provenance: artifact.provenance.clone(),
            status: artifact.status,
            deployment_percentage: artifact.deployment_percentage,
            created_at: artifact.created_at,
            deployed_at: artifact.deployed_at,
            code_sha256: compute_code_hash(&artifact.code),
        }
    }

    pub fn into_artifact(self, code: String) -> ProgramArtifact {
        ProgramArtifact {
            id: self.id,
            task_id: self.task_id,
            version: self.version,
            language: self.language,
            code,
            synthesis_strategy: self.synthesis_strategy,
            confidence_score: self.confidence_score,
            complexity_metrics: self.complexity_metrics,
            provenance: self.provenance,
            status: self.status,
            deployment_percentage: self.deployment_percentage,
            created_at: self.created_at,
            deployed_at: self.deployed_at,
        }
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            id: self.id,
            task_id: self.task_id,
            version: self.version,
            language: self.language.clone(),
            synthesis_strategy: self.synthesis_strategy,
            status: self.status,
            confidence_score: self.confidence_score,
            created_at: self.created_at,
        }
    }
}

/// Versioned artifact store rooted at `<data>/artifacts`.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    pointer: Box<dyn ActivePointer>,
}

impl ArtifactStore {
    /// Opens the store under `data_dir` with the platform default pointer.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self::with_pointer(data_dir, default_pointer())
    }

    pub fn with_pointer(data_dir: impl AsRef<Path>, pointer: Box<dyn ActivePointer>) -> Self {
        Self {
            root: data_dir.as_ref().join(ARTIFACTS_DIR),
            pointer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pointer_kind(&self) -> &'static str {
        self.pointer.kind()
    }

    fn task_dir(&self, task_key: &str) -> Result<PathBuf, LoopError> {
        validate_task_key(task_key)?;
        Ok(self.root.join(task_key))
    }

    fn version_dir(&self, task_key: &str, version: u32) -> Result<PathBuf, LoopError> {
        Ok(self.task_dir(task_key)?.join(version_dir_name(version)))
    }

    /// Persists `artifact` as `v<artifact.version>`, replacing any
    /// existing directory for that version.
    ///
    /// Files are written into a hidden staging directory first and then
    /// renamed into place, so a reader never loads a half-written version.
    pub fn store(
        &self,
        task_key: &str,
        artifact: &ProgramArtifact,
    ) -> Result<ArtifactMetadata, LoopError> {
        artifact.validate()?;
        let task_dir = self.task_dir(task_key)?;
        fs::create_dir_all(&task_dir)
            .map_err(|err| LoopError::storage("loop_store.io", err, &task_dir))?;

        let metadata = ArtifactMetadata::from_artifact(artifact);
        let tag = uuid::Uuid::new_v4().simple().to_string();
        let staging = task_dir.join(format!(".staging-v{}-{tag}", artifact.version));
        if let Err(err) = write_version(&staging, artifact, &metadata) {
            let _ = fs::remove_dir_all(&staging);
            return Err(err);
        }

        let target = task_dir.join(version_dir_name(artifact.version));
        if target.exists() {
            let retired = task_dir.join(format!("{RETIRED_PREFIX}{}-{tag}", artifact.version));
            fs::rename(&target, &retired)
                .map_err(|err| LoopError::storage("loop_store.io", err, &target))?;
            fs::rename(&staging, &target)
                .map_err(|err| LoopError::storage("loop_store.io", err, &target))?;
            fs::remove_dir_all(&retired)
                .map_err(|err| LoopError::storage("loop_store.io", err, &retired))?;
        } else {
            fs::rename(&staging, &target)
                .map_err(|err| LoopError::storage("loop_store.io", err, &target))?;
        }
        tracing::info!(
            task = task_key,
            version = artifact.version,
            program_id = %artifact.id,
            "stored artifact"
        );
        Ok(metadata)
    }

    /// Ascending versions present for `task_key`. Entries that are not
    /// `v<N>` directories are ignored.
    pub fn list_versions(&self, task_key: &str) -> Result<Vec<u32>, LoopError> {
        let task_dir = self.task_dir(task_key)?;
        let mut versions = Vec::new();
        if !task_dir.exists() {
            return Ok(versions);
        }
        for entry in fs::read_dir(&task_dir)
            .map_err(|err| LoopError::storage("loop_store.io", err, &task_dir))?
        {
            let entry = entry.map_err(|err| LoopError::storage("loop_store.io", err, &task_dir))?;
            let is_dir = entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(version) = entry.file_name().to_str().and_then(parse_version_dir) {
                versions.push(version);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    /// Task keys with a directory in the store.
    pub fn list_tasks(&self) -> Result<Vec<String>, LoopError> {
        let mut tasks = Vec::new();
        if !self.root.exists() {
            return Ok(tasks);
        }
        for entry in
            fs::read_dir(&self.root).map_err(|err| LoopError::storage("loop_store.io", err, &self.root))?
        {
            let entry = entry.map_err(|err| LoopError::storage("loop_store.io", err, &self.root))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_task_key(name).is_ok() {
                    tasks.push(name.to_string());
                }
            }
        }
        tasks.sort();
        Ok(tasks)
    }

    pub fn exists(&self, task_key: &str, version: u32) -> bool {
        self.version_dir(task_key, version)
            .map(|dir| dir.join(METADATA_FILE).is_file() && dir.join(PROGRAM_FILE).is_file())
            .unwrap_or(false)
    }

    pub fn load_metadata(
        &self,
        task_key: &str,
        version: u32,
    ) -> Result<Option<ArtifactMetadata>, LoopError> {
        let dir = self.version_dir(task_key, version)?;
        let path = dir.join(METADATA_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|err| LoopError::storage("loop_store.io", err, &path))?;
        from_json_slice(&bytes).map(Some).map_err(|mut err| {
            err.info_mut()
                .context
                .insert("path".into(), path.display().to_string());
            err
        })
    }

    /// Loads a stored version, or `None` when it does not exist.
    ///
    /// While an overwrite of the same version is swapping directories the
    /// previous copy is read from its retired directory, and a read that
    /// pairs metadata and source from different copies is retried.
    pub fn get(&self, task_key: &str, version: u32) -> Result<Option<ProgramArtifact>, LoopError> {
        let task_dir = self.task_dir(task_key)?;
        let dir = task_dir.join(version_dir_name(version));
        let mut torn = None;
        for _ in 0..READ_ATTEMPTS {
            match read_version(&dir)? {
                VersionRead::Complete(artifact) => return Ok(Some(artifact)),
                VersionRead::Torn(artifact) => torn = Some(artifact),
                VersionRead::Absent => {}
            }
            let Some(retired) = retired_dir(&task_dir, version)? else {
                if torn.is_none() && !dir.exists() {
                    return Ok(None);
                }
                continue;
            };
            if let VersionRead::Complete(artifact) = read_version(&retired)? {
                return Ok(Some(artifact));
            }
        }
        // Source edited in place: hand it back and let `verify` report it.
        Ok(torn)
    }

    pub fn active_version(&self, task_key: &str) -> Result<Option<u32>, LoopError> {
        let task_dir = self.task_dir(task_key)?;
        if !task_dir.exists() {
            return Ok(None);
        }
        self.pointer.read(&task_dir)
    }

    /// The artifact the active pointer names, or `None` when no version
    /// is active.
    pub fn get_active(&self, task_key: &str) -> Result<Option<ProgramArtifact>, LoopError> {
        let Some(version) = self.active_version(task_key)? else {
            return Ok(None);
        };
        let artifact = self.get(task_key, version)?;
        if artifact.is_none() {
            tracing::warn!(task = task_key, version, "active pointer names a missing version");
        }
        Ok(artifact)
    }

    /// Atomically points the task at `version`, which must already exist.
    pub fn set_active(&self, task_key: &str, version: u32) -> Result<(), LoopError> {
        if !self.exists(task_key, version) {
            return Err(missing_version(task_key, version));
        }
        let task_dir = self.task_dir(task_key)?;
        self.pointer.write(&task_dir, version)?;
        tracing::info!(
            task = task_key,
            version,
            pointer = self.pointer.kind(),
            "activated artifact version"
        );
        Ok(())
    }

    /// One past the highest stored version.
    pub fn next_version(&self, task_key: &str) -> Result<u32, LoopError> {
        Ok(self.list_versions(task_key)?.last().map_or(1, |v| v + 1))
    }

    /// Re-hashes the stored source and compares it with the recorded digest.
    pub fn verify(&self, task_key: &str, version: u32) -> Result<ArtifactMetadata, LoopError> {
        let metadata = self
            .load_metadata(task_key, version)?
            .ok_or_else(|| missing_version(task_key, version))?;
        let path = self.version_dir(task_key, version)?.join(PROGRAM_FILE);
        let code = fs::read_to_string(&path)
            .map_err(|err| LoopError::storage("loop_store.io", err, &path))?;
        let actual = compute_code_hash(&code);
        if actual != metadata.code_sha256 {
            return Err(LoopError::Storage(
                ErrorInfo::new("loop_store.code_hash", "program source hash mismatch")
                    .with_context("task", task_key)
                    .with_context("version", version.to_string())
                    .with_context("expected", metadata.code_sha256.clone())
                    .with_context("actual", actual),
            ));
        }
        Ok(metadata)
    }

    /// Metadata of every stored version, ascending.
    pub fn summaries(&self, task_key: &str) -> Result<Vec<ArtifactSummary>, LoopError> {
        let mut out = Vec::new();
        for version in self.list_versions(task_key)? {
            match self.load_metadata(task_key, version) {
                Ok(Some(metadata)) => out.push(metadata.summary()),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(task = task_key, version, error = %err, "skipping unreadable metadata")
                }
            }
        }
        Ok(out)
    }
}

fn missing_version(task_key: &str, version: u32) -> LoopError {
    LoopError::NotFound(
        ErrorInfo::new(
            "loop_store.version_missing",
            format!("version {version} of task '{task_key}' is not stored"),
        )
        .with_context("task", task_key)
        .with_context("version", version.to_string()),
    )
}

enum VersionRead {
    Absent,
    /// Source does not match the recorded digest.
    Torn(ProgramArtifact),
    Complete(ProgramArtifact),
}

fn read_version(dir: &Path) -> Result<VersionRead, LoopError> {
    let metadata_path = dir.join(METADATA_FILE);
    let bytes = match fs::read(&metadata_path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(VersionRead::Absent),
        Err(err) => return Err(LoopError::storage("loop_store.io", err, &metadata_path)),
    };
    let metadata: ArtifactMetadata = from_json_slice(&bytes).map_err(|mut err| {
        err.info_mut()
            .context
            .insert("path".into(), metadata_path.display().to_string());
        err
    })?;
    let program_path = dir.join(PROGRAM_FILE);
    let code = match fs::read_to_string(&program_path) {
        Ok(code) => code,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(VersionRead::Absent),
        Err(err) => return Err(LoopError::storage("loop_store.io", err, &program_path)),
    };
    if compute_code_hash(&code) == metadata.code_sha256 {
        Ok(VersionRead::Complete(metadata.into_artifact(code)))
    } else {
        Ok(VersionRead::Torn(metadata.into_artifact(code)))
    }
}

/// Directory an in-flight overwrite moved the previous copy of `version` to.
fn retired_dir(task_dir: &Path, version: u32) -> Result<Option<PathBuf>, LoopError> {
    let prefix = format!("{RETIRED_PREFIX}{version}-");
    let entries = match fs::read_dir(task_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(LoopError::storage("loop_store.io", err, task_dir)),
    };
    for entry in entries.flatten() {
        let is_retired = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(&prefix));
        if is_retired {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

fn write_version(
    dir: &Path,
    artifact: &ProgramArtifact,
    metadata: &ArtifactMetadata,
) -> Result<(), LoopError> {
    fs::create_dir_all(dir).map_err(|err| LoopError::storage("loop_store.io", err, dir))?;
    let program_path = dir.join(PROGRAM_FILE);
    fs::write(&program_path, artifact.code.as_bytes())
        .map_err(|err| LoopError::storage("loop_store.io", err, &program_path))?;
    let metadata_path = dir.join(METADATA_FILE);
    let bytes = to_canonical_json_pretty(metadata)?;
    fs::write(&metadata_path, bytes)
        .map_err(|err| LoopError::storage("loop_store.io", err, &metadata_path))
}
