//! Client configuration.
//!
//! A `Config` is assembled once through `ConfigBuilder` and never changes
//! afterwards; every service client copies what it needs at construction.

use std::time::Duration;

use url::Url;

use crate::error::TurboError;
use crate::http::BasicAuthentication;

pub const DEFAULT_API_PATH: &str = "/vmturbo/rest";
pub const DEFAULT_TOPOLOGY_PROCESSOR_PATH: &str = "/";

pub const DEFAULT_PROBE_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_PROBE_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Fixed-delay retry budget for probe resolution.
///
/// Probes register with the topology processor asynchronously, so a lookup
/// right after deployment can miss. `attempts` counts every lookup including
/// the first; `delay` separates consecutive lookups. When `deadline` is set
/// the loop gives up as soon as the next sleep would end past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeRetry {
    pub attempts: u32,
    pub delay: Duration,
    pub deadline: Option<Duration>,
}

impl Default for ProbeRetry {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_PROBE_RETRY_ATTEMPTS,
            delay: DEFAULT_PROBE_RETRY_DELAY,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    server_address: Url,
    basic_auth: Option<BasicAuthentication>,
    api_path: Option<String>,
    topology_processor_path: Option<String>,
    probe_retry: ProbeRetry,
    request_timeout: Option<Duration>,
}

impl Config {
    pub fn server_address(&self) -> &Url {
        &self.server_address
    }

    pub fn basic_auth(&self) -> Option<&BasicAuthentication> {
        self.basic_auth.as_ref()
    }

    /// API service path, falling back to `DEFAULT_API_PATH`.
    pub fn api_path(&self) -> &str {
        self.api_path.as_deref().unwrap_or(DEFAULT_API_PATH)
    }

    /// Topology-processor path, falling back to
    /// `DEFAULT_TOPOLOGY_PROCESSOR_PATH`.
    pub fn topology_processor_path(&self) -> &str {
        self.topology_processor_path
            .as_deref()
            .unwrap_or(DEFAULT_TOPOLOGY_PROCESSOR_PATH)
    }

    pub fn probe_retry(&self) -> ProbeRetry {
        self.probe_retry
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigBuilder {
    server_address: Url,
    basic_auth: Option<BasicAuthentication>,
    api_path: Option<String>,
    topology_processor_path: Option<String>,
    probe_retry: ProbeRetry,
    request_timeout: Option<Duration>,
}

impl ConfigBuilder {
    pub fn new(server_address: Url) -> Self {
        Self {
            server_address,
            basic_auth: None,
            api_path: None,
            topology_processor_path: None,
            probe_retry: ProbeRetry::default(),
            request_timeout: None,
        }
    }

    pub fn from_address(server_address: &str) -> Result<Self, TurboError> {
        Ok(Self::new(Url::parse(server_address)?))
    }

    pub fn basic_authentication(mut self, username: &str, password: &str) -> Self {
        self.basic_auth = Some(BasicAuthentication::new(username, password));
        self
    }

    pub fn api_path(mut self, path: impl Into<String>) -> Self {
        self.api_path = Some(path.into());
        self
    }

    pub fn topology_processor_path(mut self, path: impl Into<String>) -> Self {
        self.topology_processor_path = Some(path.into());
        self
    }

    pub fn probe_retry(mut self, retry: ProbeRetry) -> Self {
        self.probe_retry = retry;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn create(self) -> Config {
        Config {
            server_address: self.server_address,
            basic_auth: self.basic_auth,
            api_path: self.api_path,
            topology_processor_path: self.topology_processor_path,
            probe_retry: self.probe_retry,
            request_timeout: self.request_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localhost() -> Url {
        Url::parse("http://localhost").unwrap()
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let config = ConfigBuilder::new(localhost()).create();
        assert_eq!(config.server_address(), &localhost());
        assert!(config.basic_auth().is_none());
        assert_eq!(config.api_path(), DEFAULT_API_PATH);
        assert_eq!(config.topology_processor_path(), DEFAULT_TOPOLOGY_PROCESSOR_PATH);
        assert_eq!(config.probe_retry(), ProbeRetry::default());
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn basic_authentication_is_recorded() {
        let config = ConfigBuilder::new(localhost())
            .basic_authentication("foo", "bar")
            .create();
        assert_eq!(config.basic_auth(), Some(&BasicAuthentication::new("foo", "bar")));
    }

    #[test]
    fn path_overrides_win() {
        let config = ConfigBuilder::new(localhost())
            .api_path("/api/v3")
            .topology_processor_path("/tp")
            .create();
        assert_eq!(config.api_path(), "/api/v3");
        assert_eq!(config.topology_processor_path(), "/tp");
    }

    #[test]
    fn from_address_rejects_garbage() {
        let err = ConfigBuilder::from_address("not a url").unwrap_err();
        assert!(matches!(err, TurboError::InvalidAddress(_)));
    }
}
