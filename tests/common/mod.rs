//! 测试公共模块
//! 提供脚本化的 transport 替身和客户端构造辅助

#![allow(dead_code)]

use async_trait::async_trait;
use lojack_client::{ClientConfig, LoJackClient, LoJackError, Result, Transport};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One request as the transport saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub params: Option<Vec<(String, String)>>,
    pub body: Option<Value>,
    pub headers: Option<Vec<(String, String)>>,
}

impl RecordedRequest {
    /// Value of a header, if the request carried it.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Value of a query parameter, if the request carried it.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .as_ref()?
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Scripted transport: responses are served in push order and every
/// request is recorded for assertions.
#[derive(Default)]
pub struct StubTransport {
    responses: Mutex<VecDeque<Result<Value>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, value: Value) {
        self.responses.lock().unwrap().push_back(Ok(value));
    }

    pub fn push_err(&self, err: LoJackError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn request(
        &self,
        method: &str,
        path: &str,
        params: Option<Vec<(String, String)>>,
        body: Option<Value>,
        headers: Option<Vec<(String, String)>>,
    ) -> Result<Value> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: method.to_string(),
            path: path.to_string(),
            params,
            body,
            headers,
        });

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(LoJackError::connection(format!(
                    "no scripted response for {method} {path}"
                )))
            })
    }
}

/// A client wired to stub transports, with default test credentials.
pub fn stub_client() -> (LoJackClient, Arc<StubTransport>, Arc<StubTransport>) {
    stub_client_with(ClientConfig::with_credentials("user@example.com", "hunter2"))
}

pub fn stub_client_with(
    config: ClientConfig,
) -> (LoJackClient, Arc<StubTransport>, Arc<StubTransport>) {
    let identity = Arc::new(StubTransport::new());
    let services = Arc::new(StubTransport::new());
    let client = LoJackClient::with_transports(config, identity.clone(), services.clone());
    (client, identity, services)
}

/// A login response with a long-lived token.
pub fn login_response() -> Value {
    json!({
        "token": "test-token",
        "refresh_token": "test-refresh",
        "user_id": "user-42",
        "expiresIn": 3600,
    })
}
