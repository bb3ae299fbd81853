//! In-process fake of the contents API, enough of it to drive the versioned
//! write pipeline: sha-checked PUTs, conditional DELETEs, injectable
//! conflicts and failures, and a timestamped log of every call.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
    pub reference: Option<String>,
    pub authorization: Option<String>,
    pub body: Value,
    pub at: Instant,
}

#[derive(Debug, Clone)]
struct StoredFile {
    sha: String,
    content: String,
}

#[derive(Default)]
struct FakeState {
    files: HashMap<String, StoredFile>,
    calls: Vec<Call>,
    forced_conflicts: usize,
    put_failure: Option<StatusCode>,
    next_sha: u64,
}

impl FakeState {
    fn mint_sha(&mut self) -> String {
        self.next_sha += 1;
        format!("sha{}", self.next_sha)
    }

    fn record(&mut self, method: &'static str, path: &str, headers: &HeaderMap, body: Value) {
        self.record_with_ref(method, path, None, headers, body);
    }

    fn record_with_ref(
        &mut self,
        method: &'static str,
        path: &str,
        reference: Option<String>,
        headers: &HeaderMap,
        body: Value,
    ) {
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.calls.push(Call {
            method,
            path: path.to_string(),
            reference,
            authorization,
            body,
            at: Instant::now(),
        });
    }
}

type Shared = Arc<Mutex<FakeState>>;

pub struct FakeGithub {
    addr: SocketAddr,
    state: Shared,
}

impl FakeGithub {
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = Router::new()
            .route(
                "/repos/:owner/:repo/contents/*path",
                get(get_contents).put(put_contents).delete(delete_contents),
            )
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stores `content` as if committed by someone else; returns its sha.
    pub fn seed(&self, path: &str, content: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let sha = state.mint_sha();
        state.files.insert(
            path.to_string(),
            StoredFile {
                sha: sha.clone(),
                content: content.to_string(),
            },
        );
        sha
    }

    /// The next `count` PUTs answer 409, each after a concurrent commit
    /// bumps the target's sha.
    pub fn force_conflicts(&self, count: usize) {
        self.state.lock().unwrap().forced_conflicts = count;
    }

    pub fn fail_puts_with(&self, status: StatusCode) {
        self.state.lock().unwrap().put_failure = Some(status);
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(path)
            .map(|file| file.content.clone())
    }

    pub fn sha(&self, path: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(path)
            .map(|file| file.sha.clone())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_of(&self, method: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method)
            .collect()
    }
}

fn wrap_base64(content: &str) -> String {
    let encoded = general_purpose::STANDARD.encode(content);
    let mut wrapped = String::new();
    for chunk in encoded.as_bytes().chunks(60) {
        wrapped.push_str(std::str::from_utf8(chunk).unwrap());
        wrapped.push('\n');
    }
    wrapped
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

async fn get_contents(
    State(state): State<Shared>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock().unwrap();
    state.record_with_ref("GET", &path, query.get("ref").cloned(), &headers, Value::Null);

    match state.files.get(&path) {
        Some(file) => Json(json!({
            "type": "file",
            "path": path,
            "sha": file.sha,
            "encoding": "base64",
            "content": wrap_base64(&file.content),
        }))
        .into_response(),
        None => message(StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn put_contents(
    State(state): State<Shared>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.record("PUT", &path, &headers, body.clone());

    if let Some(status) = state.put_failure {
        return message(status, "Server Error");
    }

    if state.forced_conflicts > 0 {
        state.forced_conflicts -= 1;
        let sha = state.mint_sha();
        if let Some(file) = state.files.get_mut(&path) {
            file.sha = sha;
        }
        return message(StatusCode::CONFLICT, "is at a different sha");
    }

    let sent_sha = body["sha"].as_str();
    let current_sha = state.files.get(&path).map(|file| file.sha.clone());
    match (current_sha.as_deref(), sent_sha) {
        (Some(_), None) => {
            return message(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Invalid request. \"sha\" wasn't supplied.",
            )
        }
        (Some(current), Some(sent)) if current != sent => {
            return message(StatusCode::CONFLICT, "is at a different sha")
        }
        (None, Some(_)) => return message(StatusCode::CONFLICT, "sha does not match"),
        _ => {}
    }

    let decoded = general_purpose::STANDARD
        .decode(body["content"].as_str().unwrap_or_default())
        .unwrap();
    let content = String::from_utf8(decoded).unwrap();
    let sha = state.mint_sha();
    let created = current_sha.is_none();
    state.files.insert(
        path.clone(),
        StoredFile {
            sha: sha.clone(),
            content,
        },
    );

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (
        status,
        Json(json!({
            "content": { "path": path, "sha": sha },
            "commit": { "message": body["message"] },
        })),
    )
        .into_response()
}

async fn delete_contents(
    State(state): State<Shared>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.record("DELETE", &path, &headers, body.clone());

    let Some(current) = state.files.get(&path).map(|file| file.sha.clone()) else {
        return message(StatusCode::NOT_FOUND, "Not Found");
    };
    if body["sha"].as_str() != Some(current.as_str()) {
        return message(StatusCode::CONFLICT, "is at a different sha");
    }

    state.files.remove(&path);
    Json(json!({
        "content": null,
        "commit": { "message": body["message"] },
    }))
    .into_response()
}
