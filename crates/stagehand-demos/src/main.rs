use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use stagehand_module::{ModuleConfig, ModuleRun, RunSummary};

mod downloadfile;
mod facedetect;

#[derive(Parser)]
#[command(
    name = "stagehand",
    about = "Example pipeline modules built on the stagehand SDK"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// First-stage demo: writes five fake detections and raises one
    /// face_detected event per file.
    FaceDetect,
    /// Downloads the URL announced in the parent metadata into out/data
    /// and raises a file_downloaded event.
    DownloadFile,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout stays free for the pipeline runner.
    fmt()
        .with_env_filter(EnvFilter::from_env("STAGEHAND_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(summary) => {
            tracing::info!(
                run_id = %summary.run_id,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "module finished"
            );
            0
        }
        Err(e) => {
            tracing::error!(error = %e, "module failed");
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<RunSummary> {
    // Configuration is validated before the controller makes any network
    // call; a missing secret or port exits here.
    let config = ModuleConfig::from_env()?;
    let mut run = ModuleRun::new(config);

    let summary = match cli.command {
        Command::FaceDetect => run.run(&facedetect::FaceDetect).await?,
        Command::DownloadFile => run.run(&downloadfile::DownloadFile).await?,
    };
    Ok(summary)
}
