//! Fluent builder for a single HTTP call.
//!
//! # Design
//! Each step consumes and returns the `Request`. Errors found while
//! assembling it are recorded instead of returned: the first one wins, every
//! later step leaves the request untouched, and `execute` reports it without
//! touching the network. This keeps call sites a single chain ending in
//! `execute()?`.

use std::collections::BTreeMap;

use tracing::debug;
use ureq::Agent;
use url::form_urlencoded;
use url::Url;

use crate::error::{ConstructionError, TurboError};
use crate::http::{self, BasicAuthentication, HttpMethod, HttpResponse};
use crate::types::ResourceType;

#[derive(Debug, Clone)]
pub struct Request {
    agent: Agent,
    verb: HttpMethod,
    base_url: Url,
    path_prefix: String,
    // Sorted by key so the rendered query string is stable.
    params: BTreeMap<String, Vec<String>>,
    headers: Vec<(String, String)>,
    basic_auth: Option<BasicAuthentication>,
    resource: Option<ResourceType>,
    resource_name: Option<String>,
    data: Vec<u8>,
    err: Option<ConstructionError>,
}

impl Request {
    /// `api_path` gets a leading `/` if it lacks one.
    pub fn new(agent: Agent, verb: HttpMethod, base_url: Url, api_path: &str) -> Self {
        let path_prefix = if !api_path.is_empty() && !api_path.starts_with('/') {
            format!("/{api_path}")
        } else {
            api_path.to_string()
        };
        Self {
            agent,
            verb,
            base_url,
            path_prefix,
            params: BTreeMap::new(),
            headers: Vec::new(),
            basic_auth: None,
            resource: None,
            resource_name: None,
            data: Vec::new(),
            err: None,
        }
    }

    pub fn basic_authentication(mut self, auth: Option<BasicAuthentication>) -> Self {
        if self.err.is_none() {
            self.basic_auth = auth;
        }
        self
    }

    /// Set the kind of resource the request addresses. May be set once.
    pub fn resource(mut self, resource: ResourceType) -> Self {
        if self.err.is_some() {
            return self;
        }
        match self.resource {
            Some(current) => self.err = Some(ConstructionError::ResourceAlreadySet(current.to_string())),
            None => self.resource = Some(resource),
        }
        self
    }

    /// Set the resource name path segment. May be set once and must not be empty.
    pub fn name(mut self, resource_name: &str) -> Self {
        if self.err.is_some() {
            return self;
        }
        if let Some(current) = &self.resource_name {
            self.err = Some(ConstructionError::NameAlreadySet(current.clone()));
            return self;
        }
        if resource_name.is_empty() {
            self.err = Some(ConstructionError::EmptyName);
            return self;
        }
        self.resource_name = Some(resource_name.to_string());
        self
    }

    /// Add a query parameter. Repeated keys accumulate values.
    pub fn param(mut self, key: &str, value: &str) -> Self {
        if self.err.is_none() {
            self.params
                .entry(key.to_string())
                .or_default()
                .push(value.to_string());
        }
        self
    }

    /// Set a header, replacing any earlier value for the same name.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.err.is_none() {
            self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
            self.headers.push((name.to_string(), value.to_string()));
        }
        self
    }

    pub fn data(mut self, data: Vec<u8>) -> Self {
        if self.err.is_none() {
            self.data = data;
        }
        self
    }

    pub fn verb(&self) -> HttpMethod {
        self.verb
    }

    pub fn error(&self) -> Option<&ConstructionError> {
        self.err.as_ref()
    }

    pub fn resource_type(&self) -> Option<ResourceType> {
        self.resource
    }

    pub fn resource_name(&self) -> Option<&str> {
        self.resource_name.as_deref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The URL the request would be sent to.
    pub fn url(&self) -> Url {
        let resource = self.resource.map(|r| r.as_str().to_lowercase());
        let segments = [
            Some(self.path_prefix.as_str()),
            resource.as_deref(),
            self.resource_name.as_deref(),
        ];

        let mut url = self.base_url.clone();
        url.set_path(&join_path(segments.into_iter().flatten()));
        if self.params.is_empty() {
            url.set_query(None);
        } else {
            let mut query = form_urlencoded::Serializer::new(String::new());
            for (key, values) in &self.params {
                for value in values {
                    query.append_pair(key, value);
                }
            }
            url.set_query(Some(&query.finish()));
        }
        url
    }

    /// Send the request and read the full response.
    ///
    /// A pending construction error is returned without any network call.
    /// Non-2xx statuses are returned as data; callers decide what they mean.
    pub fn execute(self) -> Result<HttpResponse, TurboError> {
        if let Some(err) = self.err {
            return Err(err.into());
        }
        let url = self.url();
        let mut headers = self.headers;
        if let Some(auth) = &self.basic_auth {
            headers.retain(|(k, _)| !k.eq_ignore_ascii_case("authorization"));
            headers.push(("Authorization".to_string(), auth.header_value()));
        }
        debug!(method = %self.verb, url = %url, "sending request");
        http::execute(&self.agent, self.verb, url.as_str(), &headers, &self.data)
    }
}

/// Join path segments with single slashes, dropping empty pieces.
fn join_path<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let mut path = String::new();
    for piece in segments.flat_map(|s| s.split('/')).filter(|p| !p.is_empty()) {
        path.push('/');
        path.push_str(piece);
    }
    path
}
