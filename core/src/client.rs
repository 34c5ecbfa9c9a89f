//! Entry point routing operations to the API or topology-processor client.
//!
//! # Design
//! `TurboClient` owns one concrete client per `ServiceKey`, built from the
//! same `Config` and never added to or removed afterwards. The API client is
//! only registered when credentials are configured; asking for a service
//! that has no client is a configuration error returned before any request
//! is made.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::api_client::ApiClient;
use crate::config::Config;
use crate::error::TurboError;
use crate::http::HttpResponse;
use crate::tp_client::TpClient;
use crate::types::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKey {
    Api,
    TopologyProcessor,
}

impl ServiceKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKey::Api => "API",
            ServiceKey::TopologyProcessor => "TopologyProcessor",
        }
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKey {
    type Err = TurboError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "API" => Ok(ServiceKey::Api),
            "TopologyProcessor" => Ok(ServiceKey::TopologyProcessor),
            other => Err(TurboError::UnknownService(other.to_string())),
        }
    }
}

/// A concrete client for one service.
#[derive(Debug)]
pub enum ServiceClient {
    Api(ApiClient),
    TopologyProcessor(TpClient),
}

impl ServiceClient {
    pub fn key(&self) -> ServiceKey {
        match self {
            ServiceClient::Api(_) => ServiceKey::Api,
            ServiceClient::TopologyProcessor(_) => ServiceKey::TopologyProcessor,
        }
    }

    pub fn discover_target(&self, id: &str) -> Result<HttpResponse, TurboError> {
        match self {
            ServiceClient::Api(client) => client.discover_target(id),
            ServiceClient::TopologyProcessor(client) => client.discover_target(id),
        }
    }

    pub fn add_target(&self, target: &Target) -> Result<HttpResponse, TurboError> {
        match self {
            ServiceClient::Api(client) => client.add_target(target),
            ServiceClient::TopologyProcessor(client) => client.add_target(target),
        }
    }
}

#[derive(Debug)]
pub struct TurboClient {
    clients: HashMap<ServiceKey, ServiceClient>,
}

impl TurboClient {
    pub fn new(config: &Config) -> Result<Self, TurboError> {
        let mut clients = HashMap::new();
        match ApiClient::new(config) {
            Ok(api) => {
                clients.insert(ServiceKey::Api, ServiceClient::Api(api));
            }
            Err(TurboError::MissingCredentials) => {
                debug!("no credentials configured, API service client not created");
            }
            Err(err) => return Err(err),
        }
        clients.insert(
            ServiceKey::TopologyProcessor,
            ServiceClient::TopologyProcessor(TpClient::new(config)),
        );
        Ok(Self { clients })
    }

    pub fn client(&self, key: ServiceKey) -> Result<&ServiceClient, TurboError> {
        self.clients
            .get(&key)
            .ok_or(TurboError::ServiceNotConfigured(key))
    }

    pub fn services(&self) -> impl Iterator<Item = ServiceKey> + '_ {
        self.clients.keys().copied()
    }

    pub fn api(&self) -> Result<&ApiClient, TurboError> {
        match self.client(ServiceKey::Api)? {
            ServiceClient::Api(client) => Ok(client),
            ServiceClient::TopologyProcessor(_) => Err(TurboError::ServiceNotConfigured(ServiceKey::Api)),
        }
    }

    pub fn topology_processor(&self) -> Result<&TpClient, TurboError> {
        match self.client(ServiceKey::TopologyProcessor)? {
            ServiceClient::TopologyProcessor(client) => Ok(client),
            ServiceClient::Api(_) => Err(TurboError::ServiceNotConfigured(ServiceKey::TopologyProcessor)),
        }
    }

    /// Log in to the API service.
    pub fn login(&self) -> Result<HttpResponse, TurboError> {
        self.api()?.login()
    }

    pub fn discover_target(&self, id: &str, service: ServiceKey) -> Result<HttpResponse, TurboError> {
        self.client(service)?.discover_target(id)
    }

    pub fn add_target(&self, target: &Target, service: ServiceKey) -> Result<HttpResponse, TurboError> {
        self.client(service)?.add_target(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigBuilder, DEFAULT_API_PATH};
    use crate::error::ConstructionError;

    fn config(address: &str, credentials: bool) -> Config {
        let builder = ConfigBuilder::from_address(address).unwrap();
        if credentials {
            builder.basic_authentication("foo", "bar").create()
        } else {
            builder.create()
        }
    }

    #[test]
    fn service_key_parses_known_names() {
        assert_eq!("API".parse::<ServiceKey>().unwrap(), ServiceKey::Api);
        assert_eq!(
            "TopologyProcessor".parse::<ServiceKey>().unwrap(),
            ServiceKey::TopologyProcessor
        );
        assert_eq!(ServiceKey::TopologyProcessor.to_string(), "TopologyProcessor");
    }

    #[test]
    fn service_key_rejects_unknown_names() {
        let err = "Repository".parse::<ServiceKey>().unwrap_err();
        assert!(matches!(err, TurboError::UnknownService(ref s) if s == "Repository"));
    }

    #[test]
    fn both_services_with_credentials() {
        let client = TurboClient::new(&config("https://localhost", true)).unwrap();
        let api = client.api().unwrap();
        assert_eq!(api.rest().api_path(), DEFAULT_API_PATH);
        assert_eq!(client.client(ServiceKey::Api).unwrap().key(), ServiceKey::Api);
        assert!(client.topology_processor().unwrap().rest().credentials().is_none());
        assert_eq!(client.services().count(), 2);
    }

    #[test]
    fn api_service_missing_without_credentials() {
        let client = TurboClient::new(&config("http://localhost", false)).unwrap();
        assert!(client.topology_processor().is_ok());
        let err = client
            .discover_target("abc", ServiceKey::Api)
            .unwrap_err();
        assert!(matches!(err, TurboError::ServiceNotConfigured(ServiceKey::Api)));
        assert!(matches!(client.login(), Err(TurboError::ServiceNotConfigured(_))));
    }

    #[test]
    fn discover_with_empty_id_is_rejected_by_either_service() {
        let client = TurboClient::new(&config("http://127.0.0.1:9", true)).unwrap();
        for service in [ServiceKey::Api, ServiceKey::TopologyProcessor] {
            let err = client.discover_target("", service).unwrap_err();
            assert!(matches!(err, TurboError::Construction(ConstructionError::EmptyName)));
        }
    }
}
