//! Filesystem store for versioned program artifacts.
//!
//! Each task owns a directory under `<data>/artifacts/<task_key>/` holding
//! one `v<N>/` directory per stored version plus an active pointer that
//! names the version served by the runtime.

pub mod pointer;
pub mod store;

pub use pointer::{
    default_pointer, parse_version_dir, version_dir_name, ActivePointer, MarkerFilePointer,
    ACTIVE_LINK, MARKER_FILE,
};
#[cfg(unix)]
pub use pointer::SymlinkPointer;
pub use store::{compute_code_hash, ArtifactMetadata, ArtifactStore, METADATA_FILE, PROGRAM_FILE};
