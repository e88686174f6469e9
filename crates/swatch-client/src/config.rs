//! Client configuration.

use std::time::Duration;

use smol_str::SmolStr;

use crate::error::ClientError;

/// Server used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7100";
/// Quiet period used when none is configured.
pub const DEFAULT_PERSISTENCE_DELAY: Duration = Duration::from_millis(1000);
/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the server is and how eagerly edits are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server origin without a trailing slash.
    pub base_url: SmolStr,
    /// Quiet period before an edited variation or metadata is written.
    pub persistence_delay: Duration,
    /// Variations directory as configured on the server, for error messages.
    pub variation_base: SmolStr,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: SmolStr::new(DEFAULT_BASE_URL),
            persistence_delay: DEFAULT_PERSISTENCE_DELAY,
            variation_base: SmolStr::new("variations"),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Config for the server at `base_url` (`http://` or `https://`).
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let Some((scheme, host)) = trimmed.split_once("://") else {
            return Err(ClientError::InvalidConfig(
                format!("base url '{base_url}' has no scheme").into(),
            ));
        };
        if !matches!(scheme, "http" | "https") || host.is_empty() {
            return Err(ClientError::InvalidConfig(
                format!("base url '{base_url}' must be http(s)://host[:port]").into(),
            ));
        }
        Ok(Self {
            base_url: SmolStr::new(trimmed),
            ..Self::default()
        })
    }

    /// Sets the quiet period before writes.
    #[must_use]
    pub fn with_persistence_delay(mut self, delay: Duration) -> Self {
        self.persistence_delay = delay;
        self
    }

    /// Sets the variations directory shown in error messages.
    #[must_use]
    pub fn with_variation_base(mut self, base: impl Into<SmolStr>) -> Self {
        self.variation_base = base.into();
        self
    }

    /// Push channel endpoint.
    #[must_use]
    pub fn ws_url(&self) -> String {
        let rest = self
            .base_url
            .strip_prefix("https://")
            .map(|host| format!("wss://{host}"))
            .or_else(|| {
                self.base_url
                    .strip_prefix("http://")
                    .map(|host| format!("ws://{host}"))
            })
            .unwrap_or_else(|| self.base_url.to_string());
        format!("{rest}/ws")
    }

    /// `{base}/{route}/{component}` with each path segment percent encoded.
    #[must_use]
    pub fn component_url(&self, route: &str, component: &str) -> String {
        let encoded = component
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{route}/{encoded}", self.base_url)
    }

    /// Location of a component's metadata file, as shown in error messages.
    #[must_use]
    pub fn meta_location(&self, component: &str) -> String {
        let without_ext = component
            .rsplit_once('.')
            .map_or(component, |(stem, _)| stem);
        format!("{}/{without_ext}/meta.json", self.variation_base)
    }
}
