use std::path::PathBuf;

use crate::error::ModuleError;

pub const SHARED_SECRET_VAR: &str = "SHARED_SECRET";
pub const SIDECAR_PORT_VAR: &str = "SIDECAR_PORT";
pub const SIDECAR_BASE_DIR_VAR: &str = "SIDECAR_BASE_DIR";
pub const SIDECAR_EVENT_TRANSPORT_VAR: &str = "SIDECAR_EVENT_TRANSPORT";

const DEFAULT_BASE_DIR: &str = "/ion/";

/// How events reach the sidecar.
///
/// File-sync sidecars pick events up from `out/events/` when the run
/// commits; pull-triggered ones take a POST to `/events`. Same logical
/// contract either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventTransport {
    #[default]
    File,
    Http,
}

/// Immutable per-run configuration.
///
/// Built once at startup and passed explicitly to every component. Missing
/// required values are fatal before any network call is made.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    /// Shared-secret capability token sent on every sidecar request.
    pub shared_secret: String,
    /// Port the sidecar listens on (localhost only).
    pub sidecar_port: u16,
    /// Root of the module workspace. Defaults to `/ion/`.
    pub base_dir: PathBuf,
    pub event_transport: EventTransport,
}

impl ModuleConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ModuleError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an injected lookup. This is what tests
    /// use; `from_env` is the thin production wrapper.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ModuleError> {
        let shared_secret = lookup(SHARED_SECRET_VAR)
            .filter(|s| !s.is_empty())
            .ok_or(ModuleError::MissingConfig(SHARED_SECRET_VAR))?;

        let port_raw =
            lookup(SIDECAR_PORT_VAR).ok_or(ModuleError::MissingConfig(SIDECAR_PORT_VAR))?;
        let sidecar_port: u16 =
            port_raw
                .parse()
                .map_err(|_| ModuleError::InvalidConfig {
                    name: SIDECAR_PORT_VAR,
                    reason: format!("expected a port number, got {port_raw:?}"),
                })?;

        let base_dir = match lookup(SIDECAR_BASE_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => {
                tracing::info!(
                    default = DEFAULT_BASE_DIR,
                    "{SIDECAR_BASE_DIR_VAR} not set, using default"
                );
                PathBuf::from(DEFAULT_BASE_DIR)
            }
        };

        let event_transport = match lookup(SIDECAR_EVENT_TRANSPORT_VAR).as_deref() {
            None | Some("file") => EventTransport::File,
            Some("http") => EventTransport::Http,
            Some(other) => {
                return Err(ModuleError::InvalidConfig {
                    name: SIDECAR_EVENT_TRANSPORT_VAR,
                    reason: format!("expected \"file\" or \"http\", got {other:?}"),
                });
            }
        };

        Ok(Self {
            shared_secret,
            sidecar_port,
            base_dir,
            event_transport,
        })
    }
}
