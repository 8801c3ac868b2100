use std::collections::BTreeMap;

pub use reqwest::Method;

/// An outbound call before it hits the wire.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base url, e.g. `/partners/status`.
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<serde_json::Value>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: BTreeMap::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn with_json<T: serde::Serialize>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether this request was already resent after a token refresh.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub fn mark_retried(&mut self) {
        self.retried = true;
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// `Value::Null` for an empty body.
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.status == 401
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("malformed response body: {0}")]
    Body(String),
    #[error("transport error: {0}")]
    Other(String),
}

/// Raw dispatch of a request; no credentials, no retries.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}
