//! Blocking client for a management server's REST API.
//!
//! # Overview
//! Logs in, discovers and registers monitored targets, and resolves probe
//! identifiers on the topology processor. Every call is a synchronous HTTP
//! round-trip on the caller's thread.
//!
//! # Design
//! - `Request` is a fluent builder that records the first construction
//!   error and reports it from `execute()` without sending anything.
//! - `RestClient` binds a base URL, service path and credential, and hands
//!   out requests.
//! - `ApiClient` and `TpClient` implement the operations of the two backend
//!   services; `TurboClient` routes an operation to one of them by
//!   `ServiceKey`.
//! - Non-200 responses become `ResponseError`s whose text includes the
//!   server's message when it sends one.

pub mod api_client;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod rest;
pub mod tp_client;
pub mod types;

pub use api_client::ApiClient;
pub use client::{ServiceClient, ServiceKey, TurboClient};
pub use config::{Config, ConfigBuilder, ProbeRetry};
pub use error::{build_response_error, ConstructionError, ResponseError, TurboError};
pub use http::{BasicAuthentication, Cookie, HttpMethod, HttpResponse};
pub use request::Request;
pub use rest::RestClient;
pub use tp_client::{extract_communication_binding_channel, TpClient};
pub use types::{InputField, ProbeId, ResourceType, Target};
