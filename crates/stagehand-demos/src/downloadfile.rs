//! Second-stage demo module: fetches the URL its parent announced and
//! stages the payload for the next stage.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use tokio::io::AsyncWriteExt;

use stagehand_module::{Module, ModuleContext, ModuleError};
use stagehand_sidecar::{Event, Insight};

const OUTPUT_NAME: &str = "file.raw";

pub struct DownloadFile;

impl Module for DownloadFile {
    fn process<'a>(
        &'a self,
        ctx: &'a ModuleContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), ModuleError>> + Send + 'a>> {
        Box::pin(async move {
            let meta = ctx.exchange().parent_meta().await?;
            let url = meta
                .get("url")
                .filter(|u| !u.is_empty())
                .ok_or_else(|| ModuleError::Process("no url in parent metadata".into()))?
                .to_string();

            tracing::info!(%url, "downloading");
            let start = Instant::now();
            let dest = ctx.workspace().output_data_dir().join(OUTPUT_NAME);
            download(&url, &dest).await?;
            let elapsed = start.elapsed();

            ctx.exchange()
                .write_insight(
                    &Insight::new().with("downloadTimeSec", elapsed.as_secs_f64()),
                )
                .await?;
            ctx.publish(&Event::new("file_downloaded").with_file(OUTPUT_NAME))
                .await?;
            Ok(())
        })
    }
}

/// Stream the response body straight to disk.
async fn download(url: &str, dest: &std::path::Path) -> Result<(), ModuleError> {
    let mut resp = reqwest::get(url)
        .await
        .map_err(|e| ModuleError::Process(format!("request to {url} failed: {e}")))?;
    if !resp.status().is_success() {
        return Err(ModuleError::Process(format!(
            "download of {url} returned {}",
            resp.status()
        )));
    }

    let mut file = tokio::fs::File::create(dest).await?;
    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|e| ModuleError::Process(format!("reading body of {url}: {e}")))?
    {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}
