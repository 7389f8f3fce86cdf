use std::path::PathBuf;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use stagehand_sidecar::{BlobRef, Insight, KeyValuePairs, SidecarApi};

use crate::error::ModuleError;
use crate::workspace::{Workspace, checked_name};

/// Length of the content-hash prefix on uploaded blob names.
const HASH_PREFIX_LEN: usize = 12;

/// Inputs from the upstream module, staged outputs toward downstream ones.
///
/// Reads go through the sidecar (which resolved the parent's blobs and
/// metadata); writes land in the workspace and, for blobs and insights,
/// are pushed to the sidecar's output endpoints. Everything staged here
/// stays invisible to the pipeline until the lifecycle controller commits.
pub struct DataExchange {
    workspace: Workspace,
    sidecar: Arc<dyn SidecarApi>,
    /// Mirror insight writes to PUT /self/meta. Off in file-sync mode,
    /// where the sidecar reads out/meta.json itself at commit.
    sync_meta: bool,
}

impl DataExchange {
    pub fn new(workspace: Workspace, sidecar: Arc<dyn SidecarApi>) -> Self {
        Self {
            workspace,
            sidecar,
            sync_meta: false,
        }
    }

    pub fn with_meta_sync(mut self, sync_meta: bool) -> Self {
        self.sync_meta = sync_meta;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Structured metadata produced by the upstream module. Fatal on any
    /// non-success response.
    pub async fn parent_meta(&self) -> Result<KeyValuePairs, ModuleError> {
        Ok(self.sidecar.parent_meta().await?)
    }

    /// Stream a named upstream blob into `in/data/<name>`, returning the
    /// local path. Fatal on error status and on local I/O failure.
    pub async fn download_blob(&self, name: &str) -> Result<PathBuf, ModuleError> {
        let dest = self.workspace.input_data_dir().join(checked_name(name)?);
        self.sidecar.fetch_blob(name, &dest).await?;
        tracing::debug!(name, dest = %dest.display(), "input blob downloaded");
        Ok(dest)
    }

    /// Stage an output file under `out/data`.
    pub async fn write_file(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ModuleError> {
        self.workspace.stage_file(name, bytes).await
    }

    /// Replace the run's insight document.
    ///
    /// Overwrites `out/meta.json` wholesale; a second call in the same run
    /// leaves only the second record. When meta sync is on, the same
    /// document is PUT to `/self/meta`.
    pub async fn write_insight(&self, insight: &Insight) -> Result<(), ModuleError> {
        let json = serde_json::to_string_pretty(insight)?;
        tokio::fs::write(self.workspace.insight_file(), json).await?;
        if self.sync_meta {
            self.sidecar.push_meta(insight).await?;
        }
        tracing::debug!(keys = insight.len(), "insight written");
        Ok(())
    }

    /// Push a staged `out/data` file to the sidecar's blob endpoint.
    ///
    /// The shared blob namespace is written to by every concurrently
    /// running module, so the uploaded name is disambiguated with a
    /// content-hash prefix: `<sha256[..12]>-<name>`. Identical content
    /// from a retried run maps to the same name, keeping retries
    /// idempotent. Returns the assigned reference for embedding in
    /// metadata or events.
    pub async fn upload_blob(&self, name: &str) -> Result<BlobRef, ModuleError> {
        let path = self.workspace.output_data_dir().join(checked_name(name)?);
        let bytes = tokio::fs::read(&path).await?;
        let digest = hex::encode(Sha256::digest(&bytes));
        let remote_name = format!("{}-{name}", &digest[..HASH_PREFIX_LEN]);

        let blob_ref = self.sidecar.push_blob(&remote_name, &path).await?;
        tracing::info!(name, remote = %blob_ref.name, uri = %blob_ref.uri, "output blob uploaded");
        Ok(blob_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_sidecar::StubSidecar;
    use tempfile::TempDir;

    async fn exchange(stub: StubSidecar) -> (TempDir, Arc<StubSidecar>, DataExchange) {
        let tmp = TempDir::new().unwrap();
        let workspace = Workspace::new(tmp.path().join("ion"));
        workspace.prepare().await.unwrap();
        let stub = Arc::new(stub);
        let ex = DataExchange::new(workspace, stub.clone() as Arc<dyn SidecarApi>);
        (tmp, stub, ex)
    }

    #[tokio::test]
    async fn download_lands_in_input_data() {
        let stub = StubSidecar::new().with_blob("frame.raw", b"pixels".to_vec());
        let (_tmp, _stub, ex) = exchange(stub).await;

        let path = ex.download_blob("frame.raw").await.unwrap();
        assert_eq!(path, ex.workspace().input_data_dir().join("frame.raw"));
        assert_eq!(std::fs::read(&path).unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn second_insight_replaces_the_first() {
        let (_tmp, _stub, ex) = exchange(StubSidecar::new()).await;

        ex.write_insight(&Insight::new().with("source", "facebook"))
            .await
            .unwrap();
        ex.write_insight(&Insight::new().with("imageMD5", "1a79a4d6"))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(ex.workspace().insight_file()).unwrap();
        let stored: Insight = serde_json::from_str(&raw).unwrap();
        assert!(stored.get("source").is_none());
        assert_eq!(stored.get("imageMD5").unwrap(), "1a79a4d6");
    }

    #[tokio::test]
    async fn meta_sync_mirrors_insights_to_the_sidecar() {
        let (_tmp, stub, ex) = {
            let tmp = TempDir::new().unwrap();
            let workspace = Workspace::new(tmp.path().join("ion"));
            workspace.prepare().await.unwrap();
            let stub = Arc::new(StubSidecar::new());
            let ex = DataExchange::new(workspace, stub.clone() as Arc<dyn SidecarApi>)
                .with_meta_sync(true);
            (tmp, stub, ex)
        };

        ex.write_insight(&Insight::new().with("source", "s3"))
            .await
            .unwrap();
        assert_eq!(stub.pushed_meta().len(), 1);
    }

    #[tokio::test]
    async fn upload_prefixes_with_content_hash() {
        let (_tmp, stub, ex) = exchange(StubSidecar::new()).await;

        ex.write_file("a.png", b"face!").await.unwrap();
        ex.write_file("b.png", b"not a face").await.unwrap();

        let a = ex.upload_blob("a.png").await.unwrap();
        let b = ex.upload_blob("b.png").await.unwrap();

        assert!(a.name.ends_with("-a.png"));
        assert!(b.name.ends_with("-b.png"));
        // Different content, different prefix.
        assert_ne!(a.name[..HASH_PREFIX_LEN], b.name[..HASH_PREFIX_LEN]);
        // Same content re-staged hashes to the same remote name.
        ex.write_file("a.png", b"face!").await.unwrap();
        let a2 = ex.upload_blob("a.png").await.unwrap();
        assert_eq!(a.name, a2.name);

        assert_eq!(stub.pushed_blobs().len(), 3);
    }

    #[tokio::test]
    async fn upload_of_unstaged_file_is_io_error() {
        let (_tmp, _stub, ex) = exchange(StubSidecar::new()).await;
        let result = ex.upload_blob("never-written.bin").await;
        assert!(matches!(result, Err(ModuleError::Io(_))));
    }
}
