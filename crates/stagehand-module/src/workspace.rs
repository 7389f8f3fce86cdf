use std::path::{Path, PathBuf};

use stagehand_sidecar::KeyValuePairs;

use crate::error::ModuleError;

/// The module's local staging area.
///
/// Fixed layout under `base_dir`:
/// ```text
/// {base_dir}/
///   in/
///     data/       -- unstructured input files (synced by the sidecar)
///     meta.json   -- structured input metadata
///   out/
///     data/       -- staged output files
///     events/     -- one JSON document per emitted event
///     meta.json   -- the run's insight document
/// ```
///
/// Exclusively owned by one module instance; nothing under `out/` is
/// visible to the pipeline until the run commits.
#[derive(Debug, Clone)]
pub struct Workspace {
    base_dir: PathBuf,
}

impl Workspace {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn input_data_dir(&self) -> PathBuf {
        self.base_dir.join("in").join("data")
    }

    pub fn input_meta_file(&self) -> PathBuf {
        self.base_dir.join("in").join("meta.json")
    }

    pub fn output_data_dir(&self) -> PathBuf {
        self.base_dir.join("out").join("data")
    }

    pub fn events_dir(&self) -> PathBuf {
        self.base_dir.join("out").join("events")
    }

    pub fn insight_file(&self) -> PathBuf {
        self.base_dir.join("out").join("meta.json")
    }

    /// Remove any pre-existing tree and recreate the empty layout.
    ///
    /// Idempotent: calling it twice in a row leaves the same empty layout.
    /// Runs before every module invocation, which is what makes everything
    /// up to `Staged` safely re-runnable after a partial failure.
    pub async fn prepare(&self) -> Result<(), ModuleError> {
        self.remove_tree().await?;
        tokio::fs::create_dir_all(self.input_data_dir()).await?;
        tokio::fs::create_dir_all(self.output_data_dir()).await?;
        tokio::fs::create_dir_all(self.events_dir()).await?;
        tracing::debug!(base_dir = %self.base_dir.display(), "workspace prepared");
        Ok(())
    }

    /// Remove the whole tree, tolerating absence.
    pub async fn teardown(&self) -> Result<(), ModuleError> {
        self.remove_tree().await?;
        tracing::debug!(base_dir = %self.base_dir.display(), "workspace removed");
        Ok(())
    }

    async fn remove_tree(&self) -> Result<(), ModuleError> {
        match tokio::fs::remove_dir_all(&self.base_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write an output file under `out/data`, returning its path.
    pub async fn stage_file(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ModuleError> {
        let path = self.output_data_dir().join(checked_name(name)?);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Parse `in/meta.json`, written by the sidecar before it signals
    /// ready. File-sync deployments read inputs this way instead of over
    /// HTTP.
    pub async fn read_input_meta(&self) -> Result<KeyValuePairs, ModuleError> {
        let raw = tokio::fs::read_to_string(self.input_meta_file()).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Reject names that would escape the workspace directories.
pub(crate) fn checked_name(name: &str) -> Result<&str, ModuleError> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name == "."
        || name == ".."
    {
        return Err(ModuleError::InvalidBlobName(name.to_string()));
    }
    Ok(name)
}
