//! Sidecar protocol client for stagehand pipeline modules.
//!
//! A pipeline module never talks to blob stores or message buses directly.
//! It talks to a co-located sidecar agent over localhost HTTP, authenticated
//! with a shared-secret header, and the sidecar does the durable work. This
//! crate holds everything protocol-shaped:
//!
//! - [`SidecarApi`] — the HTTP surface as a trait, so module code can run
//!   against the real [`HttpSidecarClient`] or the in-memory [`StubSidecar`].
//! - [`RetryPolicy`] — the bounded retry loop used for the readiness check.
//! - Wire types: [`KeyValuePairs`], [`Event`], [`Insight`], [`BlobRef`].
//!
//! # Quick start
//!
//! ```rust,no_run
//! use stagehand_sidecar::{HttpSidecarClient, RetryPolicy, SidecarApi, SidecarError};
//!
//! # async fn run() -> Result<(), SidecarError> {
//! let client = HttpSidecarClient::new(8080, "secret-token");
//!
//! // Block until the sidecar has prepared our inputs.
//! RetryPolicy::readiness()
//!     .run(|| client.ready(), SidecarError::is_unreachable)
//!     .await?;
//!
//! // ... do work, stage outputs ...
//!
//! // Exactly once per run: make the staged outputs durable.
//! client.commit().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod retry;
pub mod stub;
pub mod types;

pub use client::{HttpSidecarClient, SidecarApi};
pub use error::SidecarError;
pub use retry::RetryPolicy;
pub use stub::StubSidecar;
pub use types::{BlobRef, Event, Insight, KeyValuePair, KeyValuePairs};
