//! In-memory sidecar for tests and offline module development.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::client::SidecarApi;
use crate::error::SidecarError;
use crate::types::{BlobRef, Event, Insight, KeyValuePairs};

/// Programmable [`SidecarApi`] that records every call.
///
/// Readiness can be scripted to fail with connection errors a fixed number
/// of times (exercising the retry budget), commit can be scripted to
/// reject, and parent metadata/blobs are served from memory. Lives in the
/// library rather than behind `cfg(test)` so module authors can develop
/// against it without a running sidecar.
#[derive(Default)]
pub struct StubSidecar {
    ready_failures: AtomicUsize,
    commit_rejection: Option<u16>,
    parent_meta: KeyValuePairs,
    blobs: HashMap<String, Vec<u8>>,

    ready_calls: AtomicUsize,
    commit_calls: AtomicUsize,
    calls: Mutex<Vec<String>>,
    events: Mutex<Vec<Event>>,
    pushed_meta: Mutex<Vec<Insight>>,
    pushed_blobs: Mutex<Vec<(BlobRef, Vec<u8>)>>,
}

impl StubSidecar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` `ready()` calls with a connection error.
    pub fn with_ready_failures(self, n: usize) -> Self {
        self.ready_failures.store(n, Ordering::Relaxed);
        self
    }

    /// Make `commit()` reject with the given HTTP status.
    pub fn with_commit_rejection(mut self, status: u16) -> Self {
        self.commit_rejection = Some(status);
        self
    }

    /// Serve the given pairs from `parent_meta()`.
    pub fn with_parent_meta(mut self, meta: KeyValuePairs) -> Self {
        self.parent_meta = meta;
        self
    }

    /// Serve `bytes` when `fetch_blob(name, ..)` is requested.
    pub fn with_blob(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.blobs.insert(name.into(), bytes);
        self
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn ready_calls(&self) -> usize {
        self.ready_calls.load(Ordering::Relaxed)
    }

    pub fn commit_calls(&self) -> usize {
        self.commit_calls.load(Ordering::Relaxed)
    }

    /// Every call made against this stub, in order.
    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn pushed_meta(&self) -> Vec<Insight> {
        self.pushed_meta.lock().unwrap().clone()
    }

    pub fn pushed_blobs(&self) -> Vec<BlobRef> {
        self.pushed_blobs
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.clone())
            .collect()
    }
}

impl SidecarApi for StubSidecar {
    fn ready<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(), SidecarError>> + Send + 'a>> {
        Box::pin(async move {
            self.ready_calls.fetch_add(1, Ordering::Relaxed);
            self.record("ready");
            let remaining = self.ready_failures.load(Ordering::Relaxed);
            if remaining > 0 {
                self.ready_failures.store(remaining - 1, Ordering::Relaxed);
                return Err(SidecarError::Unreachable("connection refused".into()));
            }
            Ok(())
        })
    }

    fn commit<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(), SidecarError>> + Send + 'a>> {
        Box::pin(async move {
            self.commit_calls.fetch_add(1, Ordering::Relaxed);
            self.record("commit");
            if let Some(status) = self.commit_rejection {
                return Err(SidecarError::Rejected {
                    status,
                    body: "commit rejected".into(),
                });
            }
            Ok(())
        })
    }

    fn parent_meta<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<KeyValuePairs, SidecarError>> + Send + 'a>> {
        Box::pin(async move {
            self.record("parent_meta");
            Ok(self.parent_meta.clone())
        })
    }

    fn fetch_blob<'a>(
        &'a self,
        name: &'a str,
        dest: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), SidecarError>> + Send + 'a>> {
        Box::pin(async move {
            self.record(format!("fetch_blob:{name}"));
            let bytes = self
                .blobs
                .get(name)
                .cloned()
                .ok_or_else(|| SidecarError::Rejected {
                    status: 404,
                    body: format!("no blob named {name}"),
                })?;
            tokio::fs::write(dest, bytes).await?;
            Ok(())
        })
    }

    fn push_meta<'a>(
        &'a self,
        insight: &'a Insight,
    ) -> Pin<Box<dyn Future<Output = Result<(), SidecarError>> + Send + 'a>> {
        Box::pin(async move {
            self.record("push_meta");
            self.pushed_meta.lock().unwrap().push(insight.clone());
            Ok(())
        })
    }

    fn push_blob<'a>(
        &'a self,
        name: &'a str,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<BlobRef, SidecarError>> + Send + 'a>> {
        Box::pin(async move {
            self.record(format!("push_blob:{name}"));
            let bytes = tokio::fs::read(path).await?;
            let blob_ref = BlobRef {
                name: name.to_string(),
                uri: format!("stub://blobs/{name}"),
            };
            self.pushed_blobs
                .lock()
                .unwrap()
                .push((blob_ref.clone(), bytes));
            Ok(blob_ref)
        })
    }

    fn post_event<'a>(
        &'a self,
        event: &'a Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), SidecarError>> + Send + 'a>> {
        Box::pin(async move {
            self.record("post_event");
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        })
    }
}
