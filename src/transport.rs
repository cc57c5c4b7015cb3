//! HTTP transport for the LoJack API
//!
//! Turns raw HTTP outcomes into classified errors so that upper layers
//! never inspect status codes themselves: 401 maps to `Authentication`,
//! 403 to `Authorization`, any other non-2xx to `Api` carrying the
//! status and raw body, and socket-level failures to `Connection` /
//! `Timeout`.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::error::{LoJackError, Result};

/// 响应体在错误消息中保留的最大长度
const BODY_SNIPPET_LIMIT: usize = 512;

/// Abstract request operation consumed by the auth manager and client.
///
/// The indirection exists so tests can substitute a scripted transport;
/// production code always goes through [`HttpTransport`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one HTTP request and return the parsed JSON body.
    ///
    /// Non-JSON bodies are returned as a JSON string value.
    async fn request(
        &self,
        method: &str,
        path: &str,
        params: Option<Vec<(String, String)>>,
        body: Option<Value>,
        headers: Option<Vec<(String, String)>>,
    ) -> Result<Value>;
}

/// reqwest-backed transport bound to one base URL.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        // 提前校验 base URL，错误在构造期暴露而不是首个请求
        url::Url::parse(base_url)
            .map_err(|e| LoJackError::config(format!("invalid base URL '{base_url}': {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoJackError::connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: &str,
        path: &str,
        params: Option<Vec<(String, String)>>,
        body: Option<Value>,
        headers: Option<Vec<(String, String)>>,
    ) -> Result<Value> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| LoJackError::invalid_parameter("method", format!("unknown HTTP method '{method}'")))?;
        let url = self.url_for(path);

        debug!(%method, %url, "Issuing API request");

        let mut builder = self.client.request(method, &url);
        if let Some(params) = &params {
            builder = builder.query(params);
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }
        if let Some(headers) = &headers {
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LoJackError::timeout(format!("request to {url} timed out: {e}"))
            } else {
                LoJackError::connection(format!("request to {url} failed: {e}"))
            }
        })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let text = response.text().await.map_err(|e| {
            LoJackError::connection(format!("failed to read response from {url}: {e}"))
        })?;

        if !status.is_success() {
            return Err(classify_status(status, &text));
        }

        if content_type.contains("application/json") {
            serde_json::from_str(&text).map_err(|e| LoJackError::Api {
                status: status.as_u16(),
                message: format!("invalid JSON in response: {e}"),
                body: Some(snippet(&text)),
            })
        } else {
            Ok(Value::String(text))
        }
    }
}

/// Map a non-2xx response to the error taxonomy.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> LoJackError {
    let reason = status.canonical_reason().unwrap_or("unknown status");
    match status.as_u16() {
        401 => LoJackError::authentication(describe(reason, body)),
        403 => LoJackError::Authorization(describe(reason, body)),
        _ => LoJackError::Api {
            status: status.as_u16(),
            message: describe(reason, body),
            body: Some(snippet(body)),
        },
    }
}

fn describe(reason: &str, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        reason.to_string()
    } else {
        format!("{reason}: {}", snippet(body))
    }
}

fn snippet(body: &str) -> String {
    if body.len() <= BODY_SNIPPET_LIMIT {
        body.to_string()
    } else {
        // 按字符边界截断，避免切断多字节字符
        let mut end = BODY_SNIPPET_LIMIT;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body[..end].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_401_as_authentication() {
        let err = classify_status(StatusCode::UNAUTHORIZED, "token expired");
        assert!(err.is_authentication());
        assert!(err.to_string().contains("token expired"));
    }

    #[test]
    fn test_classify_403_as_authorization() {
        let err = classify_status(StatusCode::FORBIDDEN, "");
        assert!(matches!(err, LoJackError::Authorization(_)));
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn test_classify_other_status_as_api_error() {
        let err = classify_status(StatusCode::NOT_FOUND, "{\"error\":\"no such asset\"}");
        match err {
            LoJackError::Api { status, body, .. } => {
                assert_eq!(status, 404);
                assert_eq!(body.as_deref(), Some("{\"error\":\"no such asset\"}"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }

        let err = classify_status(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_body_snippet_is_bounded() {
        let long_body = "x".repeat(10_000);
        let err = classify_status(StatusCode::BAD_GATEWAY, &long_body);
        match err {
            LoJackError::Api { body, .. } => {
                assert_eq!(body.map(|b| b.len()), Some(BODY_SNIPPET_LIMIT));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_url_join_normalizes_slashes() {
        let transport =
            HttpTransport::new("https://services.example.com/v0/rest/", Duration::from_secs(5))
                .expect("valid base URL");
        assert_eq!(
            transport.url_for("/assets/a-1/events"),
            "https://services.example.com/v0/rest/assets/a-1/events"
        );
        assert_eq!(
            transport.url_for("assets"),
            "https://services.example.com/v0/rest/assets"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = HttpTransport::new("not a url", Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, LoJackError::Config(_)));
    }
}
