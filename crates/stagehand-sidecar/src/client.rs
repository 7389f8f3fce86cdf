use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use tokio::io::AsyncWriteExt;

use crate::error::SidecarError;
use crate::types::{BlobRef, Event, Insight, KeyValuePairs};

/// Header carrying the module's shared-secret capability token.
/// The sidecar rejects any request where it is missing or wrong.
pub const SECRET_HEADER: &str = "secret";

/// The sidecar's HTTP surface as seen by a module.
///
/// Module and lifecycle code are written against this trait so they can run
/// over the real [`HttpSidecarClient`] or the in-memory
/// [`StubSidecar`](crate::stub::StubSidecar) in tests.
///
/// Uses Pin<Box<dyn Future>> for dyn-compatibility.
pub trait SidecarApi: Send + Sync {
    /// GET `/ready` — blocks until the sidecar has prepared the module's
    /// inputs. The only call callers may retry (see
    /// [`RetryPolicy`](crate::retry::RetryPolicy)).
    fn ready<'a>(&'a self)
    -> Pin<Box<dyn Future<Output = Result<(), SidecarError>> + Send + 'a>>;

    /// GET `/done` — commit staged outputs. Exactly-once per run; a
    /// rejection here is final.
    fn commit<'a>(&'a self)
    -> Pin<Box<dyn Future<Output = Result<(), SidecarError>> + Send + 'a>>;

    /// GET `/parent/meta` — structured metadata written by the upstream
    /// module.
    fn parent_meta<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<KeyValuePairs, SidecarError>> + Send + 'a>>;

    /// GET `/parent/blob?res=<name>` — stream a named upstream blob into
    /// `dest`. The body is written chunk by chunk, never buffered whole.
    fn fetch_blob<'a>(
        &'a self,
        name: &'a str,
        dest: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), SidecarError>> + Send + 'a>>;

    /// PUT `/self/meta` — replace this run's structured metadata.
    fn push_meta<'a>(
        &'a self,
        insight: &'a Insight,
    ) -> Pin<Box<dyn Future<Output = Result<(), SidecarError>> + Send + 'a>>;

    /// PUT `/self/blob?res=<name>` — push a staged file to the data plane.
    /// Returns the reference the sidecar assigned.
    fn push_blob<'a>(
        &'a self,
        name: &'a str,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<BlobRef, SidecarError>> + Send + 'a>>;

    /// POST `/events` — publish a downstream-triggering event.
    fn post_event<'a>(
        &'a self,
        event: &'a Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), SidecarError>> + Send + 'a>>;
}

/// `SidecarApi` over localhost HTTP.
///
/// Every request carries the `secret` header. No state is kept across
/// calls; retry decisions belong to the caller.
pub struct HttpSidecarClient {
    http: reqwest::Client,
    base_url: String,
    secret: String,
}

impl HttpSidecarClient {
    /// Client for a sidecar listening on `localhost:<port>`.
    pub fn new(port: u16, secret: impl Into<String>) -> Self {
        Self::with_base_url(format!("http://localhost:{port}"), secret)
    }

    /// Client for an explicit base URL. Used by tests that bind an
    /// ephemeral port.
    pub fn with_base_url(base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            secret: secret.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the secret header, send, and map the outcome: transport
    /// failure → `Unreachable`, non-2xx → `Rejected`.
    async fn send_checked(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SidecarError> {
        let resp = req
            .header(SECRET_HEADER, &self.secret)
            .send()
            .await
            .map_err(|e| SidecarError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SidecarError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

impl SidecarApi for HttpSidecarClient {
    fn ready<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(), SidecarError>> + Send + 'a>> {
        Box::pin(async move {
            self.send_checked(self.http.get(self.url("/ready"))).await?;
            tracing::debug!("sidecar reported ready");
            Ok(())
        })
    }

    fn commit<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(), SidecarError>> + Send + 'a>> {
        Box::pin(async move {
            self.send_checked(self.http.get(self.url("/done"))).await?;
            tracing::info!("sidecar accepted commit");
            Ok(())
        })
    }

    fn parent_meta<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<KeyValuePairs, SidecarError>> + Send + 'a>> {
        Box::pin(async move {
            let resp = self
                .send_checked(self.http.get(self.url("/parent/meta")))
                .await?;
            let pairs = resp
                .json::<KeyValuePairs>()
                .await
                .map_err(|e| SidecarError::Malformed(format!("decoding /parent/meta: {e}")))?;
            Ok(pairs)
        })
    }

    fn fetch_blob<'a>(
        &'a self,
        name: &'a str,
        dest: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), SidecarError>> + Send + 'a>> {
        Box::pin(async move {
            let mut resp = self
                .send_checked(
                    self.http
                        .get(self.url("/parent/blob"))
                        .query(&[("res", name)]),
                )
                .await?;

            let mut file = tokio::fs::File::create(dest).await?;
            let mut written = 0u64;
            while let Some(chunk) = resp
                .chunk()
                .await
                .map_err(|e| SidecarError::Unreachable(format!("reading blob body: {e}")))?
            {
                written += chunk.len() as u64;
                file.write_all(&chunk).await?;
            }
            file.flush().await?;

            tracing::debug!(name, bytes = written, dest = %dest.display(), "blob fetched");
            Ok(())
        })
    }

    fn push_meta<'a>(
        &'a self,
        insight: &'a Insight,
    ) -> Pin<Box<dyn Future<Output = Result<(), SidecarError>> + Send + 'a>> {
        Box::pin(async move {
            self.send_checked(self.http.put(self.url("/self/meta")).json(insight))
                .await?;
            Ok(())
        })
    }

    fn push_blob<'a>(
        &'a self,
        name: &'a str,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<BlobRef, SidecarError>> + Send + 'a>> {
        Box::pin(async move {
            let bytes = tokio::fs::read(path).await?;
            let resp = self
                .send_checked(
                    self.http
                        .put(self.url("/self/blob"))
                        .query(&[("res", name)])
                        .body(bytes),
                )
                .await?;
            let blob_ref = resp
                .json::<BlobRef>()
                .await
                .map_err(|e| SidecarError::Malformed(format!("decoding /self/blob: {e}")))?;

            tracing::debug!(name, uri = %blob_ref.uri, "blob pushed");
            Ok(blob_ref)
        })
    }

    fn post_event<'a>(
        &'a self,
        event: &'a Event,
    ) -> Pin<Box<dyn Future<Output = Result<(), SidecarError>> + Send + 'a>> {
        Box::pin(async move {
            self.send_checked(self.http.post(self.url("/events")).json(event))
                .await?;
            Ok(())
        })
    }
}
