//! Client for the general API service.
//!
//! # Design
//! Every request carries basic authentication. Target listing and creation
//! additionally need a session cookie, obtained by `login()` and reused for
//! the life of the client. The cookie sits behind an `RwLock` so one client
//! can be shared across threads; each request takes a snapshot of it, and a
//! concurrent `login()` only swaps the value for later requests.
//!
//! The server accepts duplicate targets, so `add_target` lists existing
//! targets first and refuses to create one whose category, type and
//! `targetIdentifier` all match.

use std::sync::{PoisonError, RwLock};

use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::config::Config;
use crate::error::{build_response_error, check_status, TurboError};
use crate::http::{self, BasicAuthentication, Cookie, HttpResponse};
use crate::rest::RestClient;
use crate::types::{ListedTarget, ResourceType, Target, SESSION_COOKIE, TARGET_IDENTIFIER};

#[derive(Debug)]
pub struct ApiClient {
    rest: RestClient,
    credentials: BasicAuthentication,
    session: RwLock<Option<Cookie>>,
}

impl ApiClient {
    /// Fails with `MissingCredentials` when `config` has no basic authentication.
    pub fn new(config: &Config) -> Result<Self, TurboError> {
        let credentials = config
            .basic_auth()
            .cloned()
            .ok_or(TurboError::MissingCredentials)?;
        let agent = http::new_agent(config.server_address(), config.request_timeout());
        let rest = RestClient::new(agent, config.server_address().clone(), config.api_path())
            .basic_authentication(Some(credentials.clone()));
        Ok(Self {
            rest,
            credentials,
            session: RwLock::new(None),
        })
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// The session cookie from the last successful login, if any.
    pub fn session_cookie(&self) -> Option<Cookie> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Log in with the configured credentials and keep the session cookie.
    pub fn login(&self) -> Result<HttpResponse, TurboError> {
        let (response, _) = self.open_session()?;
        Ok(response)
    }

    /// Ask the server to rediscover the target with `uuid`.
    pub fn discover_target(&self, uuid: &str) -> Result<HttpResponse, TurboError> {
        let response = self
            .rest
            .post()
            .resource(ResourceType::Targets)
            .name(uuid)
            .execute()?;
        let response = check_status(response, "target discovery")?;
        info!(uuid, "target discovery triggered");
        Ok(response)
    }

    /// Create `target` unless an equivalent one is already registered.
    pub fn add_target(&self, target: &Target) -> Result<HttpResponse, TurboError> {
        if self.find_target(target)? {
            warn!(tgt = %target, "target already registered");
            return Err(TurboError::TargetExists(target.to_string()));
        }
        let cookie = self.session()?;
        let body = serde_json::to_vec(target).map_err(TurboError::SerializationError)?;
        debug!(tgt = %target, "adding target");

        let response = self
            .rest
            .post()
            .resource(ResourceType::Targets)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("Cookie", &cookie.header_value())
            .data(body)
            .execute()?;
        let response = check_status(response, "target addition")?;
        info!(tgt = %target, "target added");
        Ok(response)
    }

    /// Whether a target with the same category, type and identifier exists.
    pub fn find_target(&self, target: &Target) -> Result<bool, TurboError> {
        let cookie = self.session()?;
        let response = self
            .rest
            .get()
            .resource(ResourceType::Targets)
            .header("Accept", "application/json")
            .header("Cookie", &cookie.header_value())
            .execute()?;
        let response = check_status(response, "find target")?;

        let listed: Vec<ListedTarget> = if response.body.iter().all(u8::is_ascii_whitespace) {
            Vec::new()
        } else {
            serde_json::from_slice::<Vec<serde_json::Value>>(&response.body)
                .map_err(TurboError::DeserializationError)?
                .into_iter()
                .filter_map(ListedTarget::from_value)
                .collect()
        };

        let id = target_id(target);
        let found = listed.iter().any(|candidate| is_same_target(candidate, target, id));
        debug!(tgt = %target, candidates = listed.len(), found, "target lookup");
        Ok(found)
    }

    /// Register a target through the legacy query-parameter endpoint.
    pub fn add_external_target(&self, target: &Target) -> Result<HttpResponse, TurboError> {
        let field = |name: &str| target.field(name).unwrap_or("");
        let response = self
            .rest
            .post()
            .resource(ResourceType::ExternalTargets)
            .param("type", &target.target_type)
            .param("nameOrAddress", field("nameOrAddress"))
            .param("targetIdentifier", field(TARGET_IDENTIFIER))
            .param("username", field("username"))
            .param("password", field("password"))
            .execute()?;
        check_status(response, "external target addition")
    }

    fn session(&self) -> Result<Cookie, TurboError> {
        if let Some(cookie) = self.session_cookie() {
            return Ok(cookie);
        }
        let (_, cookie) = self.open_session()?;
        Ok(cookie)
    }

    fn open_session(&self) -> Result<(HttpResponse, Cookie), TurboError> {
        let form = form_urlencoded::Serializer::new(String::new())
            .append_pair("username", self.credentials.username())
            .append_pair("password", self.credentials.password())
            .finish();
        let response = self
            .rest
            .post()
            .resource(ResourceType::Login)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .data(form.into_bytes())
            .execute()?;
        let response = check_status(response, "Turbo server login")?;

        let Some(cookie) = response.cookies.get(SESSION_COOKIE).cloned() else {
            let names: Vec<&str> = response.cookies.keys().map(String::as_str).collect();
            warn!(cookies = ?names, "login response carried no session cookie");
            return Err(build_response_error("Invalid session cookie", &response.status_line, &[]).into());
        };

        info!(server = %self.rest.base_url(), user = self.credentials.username(), "logged in");
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(cookie.clone());
        Ok((response, cookie))
    }
}

/// Value of the target's own `targetIdentifier` field, or `""` without one.
pub fn target_id(target: &Target) -> &str {
    target.field(TARGET_IDENTIFIER).unwrap_or("")
}

/// Exact string comparison of category, type and identifier. No trimming or
/// case folding; a listed target missing a field compares as `""`.
fn is_same_target(candidate: &ListedTarget, target: &Target, id: &str) -> bool {
    candidate.category() == target.category
        && candidate.target_type() == target.target_type
        && candidate.identifiers().any(|candidate_id| candidate_id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::error::ConstructionError;

    fn k8s(id: &str) -> Target {
        Target::new("Custom", "Kubernetes")
            .with_field("username", "kube")
            .with_field(TARGET_IDENTIFIER, id)
    }

    fn listed(json: &str) -> ListedTarget {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn new_requires_basic_authentication() {
        let config = ConfigBuilder::from_address("http://localhost").unwrap().create();
        assert!(matches!(ApiClient::new(&config), Err(TurboError::MissingCredentials)));
    }

    #[test]
    fn new_uses_api_path() {
        let config = ConfigBuilder::from_address("https://localhost")
            .unwrap()
            .basic_authentication("foo", "bar")
            .create();
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.rest().api_path(), "/vmturbo/rest");
        assert_eq!(client.rest().credentials().map(|c| c.username()), Some("foo"));
        assert!(client.session_cookie().is_none());
    }

    #[test]
    fn discover_with_empty_uuid_fails_before_sending() {
        let config = ConfigBuilder::from_address("http://127.0.0.1:9")
            .unwrap()
            .basic_authentication("foo", "bar")
            .create();
        let err = ApiClient::new(&config).unwrap().discover_target("").unwrap_err();
        assert!(matches!(err, TurboError::Construction(ConstructionError::EmptyName)));
    }

    #[test]
    fn target_id_reads_identifier_field() {
        assert_eq!(target_id(&k8s("cluster-1")), "cluster-1");
        assert_eq!(target_id(&Target::new("Hypervisor", "vCenter")), "");
    }

    #[test]
    fn same_target_requires_all_three_keys() {
        let candidate = listed(
            r#"{"category":"Custom","type":"Kubernetes","inputFields":[{"name":"targetIdentifier","value":"cluster-1"}]}"#,
        );
        assert!(is_same_target(&candidate, &k8s("cluster-1"), "cluster-1"));
        assert!(!is_same_target(&candidate, &k8s("cluster-2"), "cluster-2"));

        let other_type = Target {
            target_type: "OpenShift".to_string(),
            ..k8s("cluster-1")
        };
        assert!(!is_same_target(&candidate, &other_type, "cluster-1"));

        let other_category = Target {
            category: "Cloud Native".to_string(),
            ..k8s("cluster-1")
        };
        assert!(!is_same_target(&candidate, &other_category, "cluster-1"));
    }

    #[test]
    fn identifier_comparison_is_exact() {
        let candidate = listed(
            r#"{"category":"Custom","type":"Kubernetes","inputFields":[{"name":"targetIdentifier","value":" Cluster-1"}]}"#,
        );
        assert!(!is_same_target(&candidate, &k8s("cluster-1"), "cluster-1"));
        assert!(!is_same_target(&candidate, &k8s("Cluster-1"), "Cluster-1"));
    }

    #[test]
    fn malformed_neighbours_do_not_hide_a_match() {
        let listing: Vec<serde_json::Value> = serde_json::from_str(
            r#"[
                {"category":7,"type":"Kubernetes","inputFields":[]},
                {"category":"Custom","type":"Kubernetes","inputFields":[{"name":5,"value":"x"}]},
                "not-a-target",
                {"category":"Custom","type":"Kubernetes","inputFields":[{"name":"targetIdentifier","value":"cluster-1"}]}
            ]"#,
        )
        .unwrap();
        let listed: Vec<ListedTarget> = listing.into_iter().filter_map(ListedTarget::from_value).collect();
        assert_eq!(listed.len(), 3);
        let target = k8s("cluster-1");
        assert!(listed.iter().any(|c| is_same_target(c, &target, "cluster-1")));
    }

    #[test]
    fn numeric_identifier_never_matches_its_string_form() {
        let candidate = listed(
            r#"{"category":"Custom","type":"Kubernetes","inputFields":[{"name":"targetIdentifier","value":42}]}"#,
        );
        assert!(!is_same_target(&candidate, &k8s("42"), "42"));
    }
}
