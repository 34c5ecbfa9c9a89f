//! Transport, authentication and response normalization.
//!
//! # Design
//! A single `ureq::Agent` is built per service client. Agents never turn a
//! non-2xx status into an error: status interpretation belongs to the
//! operation that issued the request, which converts it into a
//! `ResponseError` when it is not what the operation expects.
//!
//! When the server address is `https`, the agent is built with certificate
//! verification disabled. This is a reduced-trust mode for servers that
//! present self-signed certificates, chosen by whoever configures the
//! address. It is not a safe default for untrusted networks.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;
use ureq::http::header::SET_COOKIE;
use ureq::tls::TlsConfig;
use ureq::typestate::WithBody;
use ureq::{Agent, RequestBuilder};
use url::Url;

use crate::error::TurboError;

/// Largest response body read into memory. Target listings on big
/// installations run well past `ureq`'s 10 MB default.
pub const MAX_RESPONSE_BODY_BYTES: u64 = 1024 * 1024 * 1024;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Username/password pair, used either per request or to log in.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuthentication {
    username: String,
    password: String,
}

impl BasicAuthentication {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

// Keep the password out of logs.
impl fmt::Debug for BasicAuthentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthentication")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A cookie captured from a `Set-Cookie` response header.
#[derive(Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    /// Parse the leading `name=value` pair of a `Set-Cookie` header.
    /// Attributes after the first `;` are ignored.
    pub fn parse(header: &str) -> Option<Self> {
        let pair = header.split(';').next()?.trim();
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            value: value.trim().trim_matches('"').to_string(),
        })
    }

    /// Value for a request `Cookie` header.
    pub fn header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("value", &"***")
            .finish()
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Status code and reason phrase, e.g. `400 Bad Request`.
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub cookies: HashMap<String, Cookie>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// First header called `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Build the agent used for every request against `server`.
pub fn new_agent(server: &Url, timeout: Option<Duration>) -> Agent {
    let mut config = Agent::config_builder().http_status_as_error(false);
    if let Some(timeout) = timeout {
        config = config.timeout_global(Some(timeout));
    }
    if server.scheme() == "https" {
        debug!(server = %server, "certificate verification disabled for https server");
        config = config.tls_config(TlsConfig::builder().disable_verification(true).build());
    }
    config.build().new_agent()
}

/// Issue one request and read the whole response.
///
/// The response body is owned by the returned `ureq` response and released
/// when it drops, on every path out of this function.
pub(crate) fn execute(
    agent: &Agent,
    method: HttpMethod,
    url: &str,
    headers: &[(String, String)],
    body: &[u8],
) -> Result<HttpResponse, TurboError> {
    let mut response = match method {
        HttpMethod::Get => with_headers(agent.get(url), headers).call(),
        HttpMethod::Delete => with_headers(agent.delete(url), headers).call(),
        HttpMethod::Post => send(with_headers(agent.post(url), headers), body),
        HttpMethod::Put => send(with_headers(agent.put(url), headers), body),
    }?;

    let status = response.status();
    let status_line = match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    };
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();
    let cookies = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(Cookie::parse)
        .map(|c| (c.name.clone(), c))
        .collect();
    let body = response
        .body_mut()
        .with_config()
        .limit(MAX_RESPONSE_BODY_BYTES)
        .read_to_vec()
        .map_err(TurboError::Body)?;

    debug!(status = %status_line, bytes = body.len(), "response received");
    Ok(HttpResponse {
        status: status.as_u16(),
        status_line,
        headers,
        cookies,
        body,
    })
}

fn with_headers<B>(mut request: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

fn send(
    request: RequestBuilder<WithBody>,
    body: &[u8],
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    if body.is_empty() {
        request.send_empty()
    } else {
        request.send(body)
    }
}
