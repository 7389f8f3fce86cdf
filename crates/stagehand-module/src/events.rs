use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use stagehand_sidecar::types::EVENT_TYPE_KEY;
use stagehand_sidecar::{Event, SidecarApi};

use crate::config::EventTransport;
use crate::error::ModuleError;
use crate::workspace::Workspace;

/// Where published events go.
///
/// Both variants deliver the same logical contract — a structured record
/// that triggers downstream modules — over different transports. No
/// acknowledgement beyond accepted/fatal.
///
/// Uses Pin<Box<dyn Future>> for dyn-compatibility.
pub trait EventSink: Send + Sync {
    fn publish<'a>(
        &'a self,
        event: &'a Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), ModuleError>> + Send + 'a>>;
}

/// Select the sink variant for the configured transport.
pub fn sink_for(
    transport: EventTransport,
    workspace: &Workspace,
    sidecar: Arc<dyn SidecarApi>,
) -> Arc<dyn EventSink> {
    match transport {
        EventTransport::File => Arc::new(FileSink::new(workspace.events_dir())),
        EventTransport::Http => Arc::new(HttpSink::new(sidecar)),
    }
}

/// Events must carry `eventType` before any I/O happens.
fn checked(event: &Event) -> Result<(), ModuleError> {
    if event.event_type().is_none() {
        return Err(ModuleError::InvalidEvent(EVENT_TYPE_KEY));
    }
    Ok(())
}

/// Writes one JSON document per event under `out/events/`, named
/// `event-<n>.json` with a per-run counter. The sidecar raises them
/// downstream after a successful commit. Needs no running service, which
/// makes it the minimum-viable transport.
pub struct FileSink {
    events_dir: PathBuf,
    seq: AtomicUsize,
}

impl FileSink {
    pub fn new(events_dir: PathBuf) -> Self {
        Self {
            events_dir,
            seq: AtomicUsize::new(0),
        }
    }
}

impl EventSink for FileSink {
    fn publish<'a>(
        &'a self,
        event: &'a Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), ModuleError>> + Send + 'a>> {
        Box::pin(async move {
            checked(event)?;
            let n = self.seq.fetch_add(1, Ordering::Relaxed);
            let path = self.events_dir.join(format!("event-{n}.json"));
            let json = serde_json::to_string(event)?;
            tokio::fs::write(&path, json).await?;
            tracing::debug!(
                event_type = event.event_type().unwrap_or_default(),
                path = %path.display(),
                "event staged"
            );
            Ok(())
        })
    }
}

/// POSTs each event to the sidecar's `/events` endpoint.
pub struct HttpSink {
    sidecar: Arc<dyn SidecarApi>,
}

impl HttpSink {
    pub fn new(sidecar: Arc<dyn SidecarApi>) -> Self {
        Self { sidecar }
    }
}

impl EventSink for HttpSink {
    fn publish<'a>(
        &'a self,
        event: &'a Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), ModuleError>> + Send + 'a>> {
        Box::pin(async move {
            checked(event)?;
            self.sidecar.post_event(event).await?;
            tracing::debug!(
                event_type = event.event_type().unwrap_or_default(),
                "event posted"
            );
            Ok(())
        })
    }
}
