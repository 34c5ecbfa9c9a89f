//! Error types for the management server client.
//!
//! # Design
//! Errors fall into five groups: configuration problems caught before any
//! network call, request construction errors accumulated by the builder,
//! transport failures from the HTTP layer, non-2xx responses (`ResponseError`,
//! enriched with the server's `message` when one parses), and domain outcomes
//! such as a duplicate target or a probe that never registered.

use thiserror::Error;

use crate::client::ServiceKey;
use crate::http::HttpResponse;
use crate::types::ApiErrorDto;

/// Errors returned by every client operation.
#[derive(Error, Debug)]
pub enum TurboError {
    #[error("invalid server address: {0}")]
    InvalidAddress(#[from] url::ParseError),

    #[error("basic authentication is not set")]
    MissingCredentials,

    #[error("unknown service key: {0}")]
    UnknownService(String),

    #[error("no client is configured for service {0}")]
    ServiceNotConfigured(ServiceKey),

    /// The request was rejected by the builder; nothing was sent.
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Transport(#[from] ureq::Error),

    #[error("failed to read response body: {0}")]
    Body(#[source] ureq::Error),

    /// The server answered with an unexpected status.
    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error("target {0} exists")]
    TargetExists(String),

    #[error("probe of type {probe_type} and category {category} is not registered")]
    ProbeNotFound { probe_type: String, category: String },

    #[error("serialization failed: {0}")]
    SerializationError(#[source] serde_json::Error),

    #[error("deserialization failed: {0}")]
    DeserializationError(#[source] serde_json::Error),
}

/// Problems detected while assembling a `Request`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("resource has already been set to {0}, cannot be changed")]
    ResourceAlreadySet(String),

    #[error("resource name has already been set to {0}, cannot be changed")]
    NameAlreadySet(String),

    #[error("resource name cannot be empty")]
    EmptyName,
}

/// A non-2xx response, rendered as
/// `unsuccessful <operation> response: <status>.` with the server's message
/// appended as a trailing sentence when one was supplied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsuccessful {operation} response: {status}.{}", trailing_sentence(.message))]
pub struct ResponseError {
    pub operation: String,
    pub status: String,
    pub message: Option<String>,
}

fn trailing_sentence(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(" {m}."),
        None => String::new(),
    }
}

/// Build a `ResponseError` for `operation`, picking up `message` from
/// `content` only when it parses as an error object with a non-empty message.
pub fn build_response_error(operation: &str, status: &str, content: &[u8]) -> ResponseError {
    let message = serde_json::from_slice::<ApiErrorDto>(content)
        .ok()
        .and_then(|dto| dto.message)
        .filter(|m| !m.is_empty());
    ResponseError {
        operation: operation.to_string(),
        status: status.to_string(),
        message,
    }
}

/// Pass a 200 response through; turn anything else into a `ResponseError`
/// labelled with `operation`.
pub(crate) fn check_status(response: HttpResponse, operation: &str) -> Result<HttpResponse, TurboError> {
    if response.status == 200 {
        return Ok(response);
    }
    Err(build_response_error(operation, &response.status_line, &response.body).into())
}
