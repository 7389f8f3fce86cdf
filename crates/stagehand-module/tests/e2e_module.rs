//! End-to-end module runs over the stub sidecar: the full
//! write-files / publish-events / write-insight / commit flow, plus an
//! input-consuming stage that reads parent metadata and blobs.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use stagehand_module::{
    EventTransport, Module, ModuleConfig, ModuleContext, ModuleError, ModuleRun, ModuleState,
    Workspace,
};
use stagehand_sidecar::{Event, Insight, KeyValuePairs, StubSidecar};
use tempfile::TempDir;

fn config(tmp: &TempDir, transport: EventTransport) -> ModuleConfig {
    ModuleConfig {
        shared_secret: "secret".into(),
        sidecar_port: 8080,
        base_dir: tmp.path().join("ion"),
        event_transport: transport,
    }
}

/// The canonical first-stage module: five fake detections, one event per
/// file, one insight document.
struct FaceDetect;

impl Module for FaceDetect {
    fn process<'a>(
        &'a self,
        ctx: &'a ModuleContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), ModuleError>> + Send + 'a>> {
        Box::pin(async move {
            for i in 0..5 {
                let name = format!("image{i}.png");
                ctx.exchange().write_file(&name, b"face!").await?;
                ctx.publish(&Event::new("face_detected").with_file(&name))
                    .await?;
            }
            ctx.exchange()
                .write_insight(
                    &Insight::new()
                        .with("source", "facebook")
                        .with("imageMD5", "1a79a4d60de6718e8e5b326e338ae533"),
                )
                .await?;
            Ok(())
        })
    }
}

/// A second-stage module: pulls the blob its parent announced and stages a
/// processed copy.
struct Consume;

impl Module for Consume {
    fn process<'a>(
        &'a self,
        ctx: &'a ModuleContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), ModuleError>> + Send + 'a>> {
        Box::pin(async move {
            let meta = ctx.exchange().parent_meta().await?;
            let name = meta
                .get("file")
                .ok_or_else(|| ModuleError::Process("parent announced no file".into()))?
                .to_string();

            let local = ctx.exchange().download_blob(&name).await?;
            let bytes = tokio::fs::read(&local).await?;

            ctx.exchange().write_file("copy.bin", &bytes).await?;
            let blob_ref = ctx.exchange().upload_blob("copy.bin").await?;
            ctx.publish(
                &Event::new("file_copied")
                    .with_file("copy.bin")
                    .with("uri", blob_ref.uri),
            )
            .await?;
            Ok(())
        })
    }
}

#[tokio::test]
async fn face_detect_scenario_commits_five_files_five_events_one_insight() {
    let tmp = TempDir::new().unwrap();
    let stub = Arc::new(StubSidecar::new());
    let mut run = ModuleRun::with_sidecar(config(&tmp, EventTransport::File), stub.clone());

    let summary = run.run(&FaceDetect).await.unwrap();
    assert_eq!(summary.state, ModuleState::Committed);

    let ws = Workspace::new(tmp.path().join("ion"));
    for i in 0..5 {
        assert!(ws.output_data_dir().join(format!("image{i}.png")).exists());

        let raw =
            std::fs::read_to_string(ws.events_dir().join(format!("event-{i}.json"))).unwrap();
        let event: Event = serde_json::from_str(&raw).unwrap();
        assert_eq!(event.event_type(), Some("face_detected"));
        assert_eq!(event.files(), vec![format!("image{i}.png")]);
    }

    let insight: Insight =
        serde_json::from_str(&std::fs::read_to_string(ws.insight_file()).unwrap()).unwrap();
    assert_eq!(insight.get("source").unwrap(), "facebook");
    assert_eq!(
        insight.get("imageMD5").unwrap(),
        "1a79a4d60de6718e8e5b326e338ae533"
    );

    // File transport: exactly ready + commit on the wire, nothing else.
    assert_eq!(stub.call_log(), vec!["ready", "commit"]);
}

#[tokio::test]
async fn face_detect_over_http_transport_posts_events_and_meta() {
    let tmp = TempDir::new().unwrap();
    let stub = Arc::new(StubSidecar::new());
    let mut run = ModuleRun::with_sidecar(config(&tmp, EventTransport::Http), stub.clone());

    run.run(&FaceDetect).await.unwrap();

    let events = stub.events();
    assert_eq!(events.len(), 5);
    assert!(events.iter().all(|e| e.event_type() == Some("face_detected")));
    assert_eq!(stub.pushed_meta().len(), 1);
    assert_eq!(stub.commit_calls(), 1);
}

#[tokio::test]
async fn consuming_module_reads_parent_outputs_and_republishes() {
    let tmp = TempDir::new().unwrap();
    let mut parent_meta = KeyValuePairs::new();
    parent_meta.push("file", "input.bin");
    let stub = Arc::new(
        StubSidecar::new()
            .with_parent_meta(parent_meta)
            .with_blob("input.bin", b"payload".to_vec()),
    );
    let mut run = ModuleRun::with_sidecar(config(&tmp, EventTransport::Http), stub.clone());

    run.run(&Consume).await.unwrap();

    let ws = Workspace::new(tmp.path().join("ion"));
    assert_eq!(
        std::fs::read(ws.input_data_dir().join("input.bin")).unwrap(),
        b"payload"
    );
    assert_eq!(
        std::fs::read(ws.output_data_dir().join("copy.bin")).unwrap(),
        b"payload"
    );

    let pushed = stub.pushed_blobs();
    assert_eq!(pushed.len(), 1);
    assert!(pushed[0].name.ends_with("-copy.bin"));

    let events = stub.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type(), Some("file_copied"));
    assert_eq!(events[0].pairs().get("uri"), Some(pushed[0].uri.as_str()));

    // Lifecycle ordering on the wire: ready first, commit last.
    let log = stub.call_log();
    assert_eq!(log.first().map(String::as_str), Some("ready"));
    assert_eq!(log.last().map(String::as_str), Some("commit"));
}

#[tokio::test]
async fn config_failure_happens_before_any_network_call() {
    // SHARED_SECRET absent: from_lookup fails and no controller (and thus
    // no sidecar call) is ever constructed.
    let result = ModuleConfig::from_lookup(|name| match name {
        "SIDECAR_PORT" => Some("8080".to_string()),
        _ => None,
    });
    assert!(matches!(result, Err(ModuleError::MissingConfig(_))));
}
