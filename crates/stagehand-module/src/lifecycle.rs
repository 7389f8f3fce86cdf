use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use stagehand_sidecar::{Event, HttpSidecarClient, RetryPolicy, SidecarApi, SidecarError};

use crate::config::{EventTransport, ModuleConfig};
use crate::error::ModuleError;
use crate::events::{EventSink, sink_for};
use crate::exchange::DataExchange;
use crate::workspace::Workspace;

/// Lifecycle states of a module run.
///
/// Everything at or before `Staged` is safe to repeat: a crashed run is
/// retried externally from `Created` and the workspace rebuild wipes any
/// partial output. `Committed` is the single non-idempotent, externally
/// visible checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Created,
    AwaitingReady,
    Ready,
    Processing,
    Staged,
    Committed,
    Abandoned,
}

/// What a module's domain logic gets to work with: the data exchange
/// layer, the configured event sink, and the run's correlation id.
pub struct ModuleContext {
    exchange: DataExchange,
    events: Arc<dyn EventSink>,
    run_id: String,
}

impl ModuleContext {
    pub fn exchange(&self) -> &DataExchange {
        &self.exchange
    }

    pub fn workspace(&self) -> &Workspace {
        self.exchange.workspace()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Publish a downstream-triggering event through the configured sink.
    pub async fn publish(&self, event: &Event) -> Result<(), ModuleError> {
        self.events.publish(event).await
    }
}

/// Domain logic of a pipeline stage.
///
/// Implementations must be idempotent: `process` may be re-executed from
/// scratch by an external retry after any failure, and nothing it stages
/// becomes visible until the controller commits.
///
/// Uses Pin<Box<dyn Future>> for dyn-compatibility.
pub trait Module: Send + Sync {
    fn process<'a>(
        &'a self,
        ctx: &'a ModuleContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), ModuleError>> + Send + 'a>>;
}

/// Outcome of a committed run.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub state: ModuleState,
    pub elapsed: Duration,
}

/// Drives one module execution through the lifecycle state machine.
///
/// ```text
/// Created -> AwaitingReady -> Ready -> Processing -> Staged -> Committed
///                 |              |         |           |
///                 +--------------+---------+-----------+--> Abandoned
/// ```
///
/// The controller owns the single top-level failure decision: components
/// return errors, none of them terminate the process, and any error here
/// leaves the run `Abandoned` for the external scheduler to retry.
pub struct ModuleRun {
    config: ModuleConfig,
    sidecar: Arc<dyn SidecarApi>,
    retry: RetryPolicy,
    deadline: Option<Duration>,
    teardown: bool,
    state: ModuleState,
    run_id: String,
}

impl ModuleRun {
    /// Controller talking to the sidecar on `localhost:<config.sidecar_port>`.
    pub fn new(config: ModuleConfig) -> Self {
        let client = HttpSidecarClient::new(config.sidecar_port, config.shared_secret.clone());
        Self::with_sidecar(config, Arc::new(client))
    }

    /// Controller over an injected sidecar implementation (tests, offline
    /// development against [`StubSidecar`](stagehand_sidecar::StubSidecar)).
    pub fn with_sidecar(config: ModuleConfig, sidecar: Arc<dyn SidecarApi>) -> Self {
        Self {
            config,
            sidecar,
            retry: RetryPolicy::readiness(),
            deadline: None,
            teardown: false,
            state: ModuleState::Created,
            run_id: format!("run_{}", uuid::Uuid::new_v4().simple()),
        }
    }

    /// Override the readiness retry budget.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Bound the processing phase. Expiry before commit is always safe:
    /// nothing staged is externally visible yet.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Remove the workspace after a successful commit. Off by default;
    /// file-sync sidecars own the sync-and-clean step.
    pub fn with_teardown(mut self, teardown: bool) -> Self {
        self.teardown = teardown;
        self
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    /// Execute the module once, end to end.
    ///
    /// Returns the summary of a committed run, or the error that abandoned
    /// it. A `ModuleRun` is single-use: calling `run` again after it has
    /// finished is a lifecycle violation, which is what keeps commit
    /// exactly-once even against buggy callers.
    pub async fn run(&mut self, module: &dyn Module) -> Result<RunSummary, ModuleError> {
        if self.state != ModuleState::Created {
            return Err(ModuleError::LifecycleViolation(format!(
                "run() called again on a finished run (state {:?})",
                self.state
            )));
        }

        let start = Instant::now();
        match self.drive(module).await {
            Ok(()) => {
                let elapsed = start.elapsed();
                tracing::info!(
                    run_id = %self.run_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "module run committed"
                );
                Ok(RunSummary {
                    run_id: self.run_id.clone(),
                    state: self.state,
                    elapsed,
                })
            }
            Err(e) => {
                self.state = ModuleState::Abandoned;
                tracing::error!(run_id = %self.run_id, error = %e, "module run abandoned");
                Err(e)
            }
        }
    }

    async fn drive(&mut self, module: &dyn Module) -> Result<(), ModuleError> {
        // Fresh workspace on every invocation; stale output from a crashed
        // previous attempt must never survive into this one.
        let workspace = Workspace::new(self.config.base_dir.clone());
        workspace.prepare().await?;

        self.transition(ModuleState::AwaitingReady);
        let sidecar = Arc::clone(&self.sidecar);
        self.retry
            .run(|| sidecar.ready(), SidecarError::is_unreachable)
            .await?;
        self.transition(ModuleState::Ready);

        let exchange = DataExchange::new(workspace.clone(), Arc::clone(&self.sidecar))
            .with_meta_sync(self.config.event_transport == EventTransport::Http);
        let events = sink_for(
            self.config.event_transport,
            &workspace,
            Arc::clone(&self.sidecar),
        );
        let ctx = ModuleContext {
            exchange,
            events,
            run_id: self.run_id.clone(),
        };

        self.transition(ModuleState::Processing);
        let work = module.process(&ctx);
        match self.deadline {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .map_err(|_| ModuleError::DeadlineExceeded)??,
            None => work.await?,
        }
        self.transition(ModuleState::Staged);

        // The one non-idempotent call. Reached exactly once per run: every
        // path that fails before here abandons without committing, and the
        // Created-state guard in run() blocks a second pass.
        self.sidecar.commit().await?;
        self.transition(ModuleState::Committed);

        if self.teardown {
            workspace.teardown().await?;
        }
        Ok(())
    }

    fn transition(&mut self, next: ModuleState) {
        tracing::debug!(run_id = %self.run_id, from = ?self.state, to = ?next, "lifecycle transition");
        self.state = next;
    }
}
