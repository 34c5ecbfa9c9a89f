//! In-memory fake of the management server's API and topology-processor
//! services.
//!
//! The API service lives under `/vmturbo/rest` and the topology processor
//! at the root. Like the real server, target creation does not reject
//! duplicates. The state records how many creations and probe lookups were
//! served so tests can assert on side effects.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const API_PREFIX: &str = "/vmturbo/rest";
pub const SESSION_COOKIE: &str = "JSESSIONID";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default)]
    pub uuid: String,
    pub category: String,
    #[serde(rename = "type")]
    pub target_type: String,
    #[serde(default)]
    pub input_fields: Vec<InputField>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputField {
    pub name: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub group_properties: Vec<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Probe {
    pub id: i64,
    #[serde(rename = "type")]
    pub probe_type: String,
    pub category: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TpTarget {
    pub probe_id: i64,
    pub input_fields: Vec<TpInputField>,
    #[serde(default)]
    pub communication_binding_channel: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TpInputField {
    pub name: String,
    pub value: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default)]
pub struct ServerState {
    pub username: String,
    pub password: String,
    pub sessions: HashSet<String>,
    pub logins: usize,
    pub targets: Vec<Target>,
    pub target_creations: usize,
    pub discoveries: Vec<String>,
    pub external_targets: Vec<HashMap<String, String>>,
    pub probes: Vec<Probe>,
    pub probe_lookups: usize,
    /// Probe lookups answered with an empty registry before probes show up.
    pub probes_hidden_for: usize,
    pub tp_targets: Vec<TpTarget>,
    pub tp_discoveries: Vec<String>,
    /// Listing entries served verbatim after `targets`, whatever their shape.
    pub raw_listing: Vec<serde_json::Value>,
    /// Answer logins with 200 but no session cookie.
    pub withhold_session_cookie: bool,
}

impl ServerState {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.targets.push(target);
        self
    }

    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn hide_probes_for(mut self, lookups: usize) -> Self {
        self.probes_hidden_for = lookups;
        self
    }

    pub fn with_raw_listing_entry(mut self, entry: serde_json::Value) -> Self {
        self.raw_listing.push(entry);
        self
    }

    pub fn without_session_cookie(mut self) -> Self {
        self.withhold_session_cookie = true;
        self
    }

    fn basic_auth_ok(&self, headers: &HeaderMap) -> bool {
        let Some(encoded) = header_str(headers, header::AUTHORIZATION.as_str())
            .and_then(|v| v.strip_prefix("Basic "))
        else {
            return false;
        };
        let expected = format!("{}:{}", self.username, self.password);
        STANDARD
            .decode(encoded)
            .map(|decoded| decoded == expected.as_bytes())
            .unwrap_or(false)
    }

    fn session_ok(&self, headers: &HeaderMap) -> bool {
        header_str(headers, header::COOKIE.as_str())
            .into_iter()
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .any(|(name, value)| name == SESSION_COOKIE && self.sessions.contains(value))
    }
}

pub type Db = Arc<RwLock<ServerState>>;

pub fn new_db(state: ServerState) -> Db {
    Arc::new(RwLock::new(state))
}

pub fn app(db: Db) -> Router {
    let api = Router::new()
        .route("/login", post(login))
        .route("/targets", get(list_targets).post(create_target))
        .route("/targets/{uuid}", post(discover_target))
        .route("/externaltargets", post(create_external_target));
    Router::new()
        .nest(API_PREFIX, api)
        .route("/probe", get(list_probes))
        .route("/target", post(create_tp_target))
        .route("/target/{id}", post(discover_tp_target))
        .with_state(db)
}

pub async fn run(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app(db)).await
}

/// Serve `db` on a random local port from a background thread and return
/// the bound address.
pub fn spawn(db: Db) -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = TcpListener::from_std(std_listener).unwrap();
            run(listener, db).await
        })
        .unwrap();
    });
    addr
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

async fn login(State(db): State<Db>, Form(form): Form<LoginForm>) -> Response {
    let mut state = db.write().await;
    if form.username != state.username || form.password != state.password {
        return error(StatusCode::UNAUTHORIZED, "Invalid username or password");
    }
    state.logins += 1;
    if state.withhold_session_cookie {
        return Json(json!({ "username": form.username })).into_response();
    }
    let session = Uuid::new_v4().to_string();
    state.sessions.insert(session.clone());
    let cookie = format!("{SESSION_COOKIE}={session}; Path=/; HttpOnly");
    (
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "username": form.username })),
    )
        .into_response()
}

async fn list_targets(State(db): State<Db>, headers: HeaderMap) -> Response {
    let state = db.read().await;
    if !state.basic_auth_ok(&headers) && !state.session_ok(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Authentication required");
    }
    let mut listing: Vec<serde_json::Value> = state.targets.iter().map(|t| json!(t)).collect();
    listing.extend(state.raw_listing.iter().cloned());
    Json(listing).into_response()
}

async fn create_target(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(mut target): Json<Target>,
) -> Response {
    let mut state = db.write().await;
    if !state.session_ok(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Session required");
    }
    if target.input_fields.is_empty() {
        return error(StatusCode::BAD_REQUEST, "bad input");
    }
    target.uuid = Uuid::new_v4().to_string();
    state.target_creations += 1;
    state.targets.push(target.clone());
    Json(target).into_response()
}

async fn discover_target(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> Response {
    let mut state = db.write().await;
    if !state.basic_auth_ok(&headers) && !state.session_ok(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Authentication required");
    }
    let Some(target) = state.targets.iter().find(|t| t.uuid == uuid).cloned() else {
        return error(StatusCode::NOT_FOUND, &format!("No target with uuid {uuid}"));
    };
    state.discoveries.push(uuid);
    Json(target).into_response()
}

async fn create_external_target(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut state = db.write().await;
    if !state.basic_auth_ok(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Authentication required");
    }
    if params.get("type").map_or(true, String::is_empty) {
        return error(StatusCode::BAD_REQUEST, "Target type is required");
    }
    state.external_targets.push(params);
    StatusCode::OK.into_response()
}

async fn list_probes(State(db): State<Db>) -> Json<serde_json::Value> {
    let mut state = db.write().await;
    state.probe_lookups += 1;
    if state.probe_lookups <= state.probes_hidden_for {
        return Json(json!({ "probes": [] }));
    }
    Json(json!({ "probes": state.probes }))
}

async fn create_tp_target(State(db): State<Db>, Json(target): Json<TpTarget>) -> Response {
    let mut state = db.write().await;
    if !state.probes.iter().any(|p| p.id == target.probe_id) {
        return error(StatusCode::BAD_REQUEST, &format!("Unknown probe {}", target.probe_id));
    }
    state.tp_targets.push(target);
    let id = state.tp_targets.len();
    Json(json!({ "targetId": id })).into_response()
}

async fn discover_tp_target(State(db): State<Db>, Path(id): Path<String>) -> StatusCode {
    db.write().await.tp_discoveries.push(id);
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn state() -> ServerState {
        ServerState::new("administrator", "secret")
    }

    #[test]
    fn target_deserializes_from_client_payload() {
        let target: Target = serde_json::from_str(
            r#"{"category":"Custom","type":"Kubernetes","inputFields":[{"name":"targetIdentifier","value":"k1","groupProperties":[]}]}"#,
        )
        .unwrap();
        assert!(target.uuid.is_empty());
        assert_eq!(target.target_type, "Kubernetes");
        assert_eq!(target.input_fields[0].value, "k1");
    }

    #[test]
    fn basic_auth_checks_both_parts() {
        let mut headers = HeaderMap::new();
        let good = format!("Basic {}", STANDARD.encode("administrator:secret"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&good).unwrap());
        assert!(state().basic_auth_ok(&headers));

        let bad = format!("Basic {}", STANDARD.encode("administrator:wrong"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&bad).unwrap());
        assert!(!state().basic_auth_ok(&headers));
    }

    #[test]
    fn session_requires_issued_cookie() {
        let mut state = state();
        state.sessions.insert("abc".to_string());
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("other=1; JSESSIONID=abc"));
        assert!(state.session_ok(&headers));
        headers.insert(header::COOKIE, HeaderValue::from_static("JSESSIONID=zzz"));
        assert!(!state.session_ok(&headers));
    }
}
