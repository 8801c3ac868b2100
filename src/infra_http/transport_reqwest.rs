use crate::domain_port::*;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// [`HttpTransport`] over a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn transport_err(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else if e.is_decode() || e.is_body() {
        TransportError::Body(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path))
            .header("accept", "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(transport_err)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(transport_err)?;

        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(body) => body,
                // error pages from proxies are often plain text
                Err(_) if !(200..300).contains(&status) => {
                    serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }
                Err(e) => return Err(TransportError::Body(e.to_string())),
            }
        };

        Ok(ApiResponse::new(status, body))
    }
}
