//! In-memory transport with scripted answers, for tests of screens and
//! commands that sit on top of [`PortalClient`](crate::api::PortalClient).

use crate::api::{ApiRequest, ApiResponse, Method, Transport};
use crate::error::TransportError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

type Key = (Method, String);
type Reply = Result<ApiResponse, TransportError>;

#[derive(Default)]
struct Script {
    replies: HashMap<Key, VecDeque<Reply>>,
    requests: Vec<ApiRequest>,
    csrf: Option<String>,
}

/// Answers are keyed by method and path (query ignored), so concurrent
/// fetches do not depend on request order. Queued answers are consumed in
/// order; the last one keeps answering.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_csrf(self, token: &str) -> Self {
        self.lock().csrf = Some(token.to_string());
        self
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        // A panicking test poisons the lock; the data is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, method: Method, path: &str, reply: Reply) {
        self.lock()
            .replies
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    pub fn respond_json(&self, method: Method, path: &str, status: u16, body: serde_json::Value) {
        let body = if body.is_null() {
            Vec::new()
        } else {
            body.to_string().into_bytes()
        };
        self.push(method, path, Ok(ApiResponse { status, body }));
    }

    pub fn respond_raw(&self, method: Method, path: &str, status: u16, body: &[u8]) {
        self.push(
            method,
            path,
            Ok(ApiResponse {
                status,
                body: body.to_vec(),
            }),
        );
    }

    pub fn fail(&self, method: Method, path: &str, error: TransportError) {
        self.push(method, path, Err(error));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests_to(method, path).len()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut script = self.lock();
        let key = (request.method, request.path.clone());
        script.requests.push(request);
        let Some(queue) = script.replies.get_mut(&key) else {
            return Err(TransportError::Network(format!(
                "no scripted reply for {} {}",
                key.0.as_str(),
                key.1
            )));
        };
        let reply = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        reply.unwrap_or_else(|| Err(TransportError::Network("empty script".into())))
    }

    fn csrf_token(&self) -> Option<String> {
        self.lock().csrf.clone()
    }
}
