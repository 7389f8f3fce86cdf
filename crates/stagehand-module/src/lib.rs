//! Module SDK for stagehand pipeline stages.
//!
//! A module is one isolated unit of work in a pipeline graph. This crate
//! gives it everything between "process started" and "outputs committed":
//!
//! - [`ModuleConfig`] — immutable configuration read once from the
//!   environment and passed explicitly, never ambient.
//! - [`Workspace`] — the fixed `in/` + `out/` directory layout, rebuilt
//!   from scratch on every run so reruns never see stale output.
//! - [`DataExchange`] — inputs from the upstream module, staged outputs
//!   toward the downstream ones.
//! - [`EventSink`] — file- or HTTP-backed event publication.
//! - [`ModuleRun`] — the lifecycle controller enforcing the state machine
//!   and the exactly-once commit.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::future::Future;
//! use std::pin::Pin;
//!
//! use stagehand_module::{Module, ModuleConfig, ModuleContext, ModuleError, ModuleRun};
//! use stagehand_sidecar::{Event, Insight};
//!
//! struct Greeter;
//!
//! impl Module for Greeter {
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a ModuleContext,
//!     ) -> Pin<Box<dyn Future<Output = Result<(), ModuleError>> + Send + 'a>> {
//!         Box::pin(async move {
//!             ctx.exchange().write_file("hello.txt", b"hi").await?;
//!             ctx.publish(&Event::new("greeted").with_file("hello.txt")).await?;
//!             ctx.exchange()
//!                 .write_insight(&Insight::new().with("greetings", 1))
//!                 .await?;
//!             Ok(())
//!         })
//!     }
//! }
//!
//! # async fn run() -> Result<(), ModuleError> {
//! let config = ModuleConfig::from_env()?;
//! let summary = ModuleRun::new(config).run(&Greeter).await?;
//! tracing::info!(run_id = %summary.run_id, "committed");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod exchange;
pub mod lifecycle;
pub mod workspace;

pub use config::{EventTransport, ModuleConfig};
pub use error::ModuleError;
pub use events::{EventSink, FileSink, HttpSink};
pub use exchange::DataExchange;
pub use lifecycle::{Module, ModuleContext, ModuleRun, ModuleState, RunSummary};
pub use workspace::Workspace;
