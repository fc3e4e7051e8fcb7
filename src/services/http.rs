/// Outbound HTTP collaborator
///
/// Webhook nodes describe a request as data; this contract performs it and
/// returns status, headers and body. The reqwest implementation enforces a
/// hard per-request timeout so a stuck endpoint cannot hang a run.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Request to perform
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

/// Response as seen by the workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    /// Parsed JSON when the body is JSON, otherwise the raw text
    pub body: Value,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// HTTP collaborator backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Build a client whose default timeout is `timeout_ms`
    pub fn new(timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        tracing::debug!("🌍 HTTP Request: {} {}", request.method, request.url);

        let mut request_builder = match request.method.to_uppercase().as_str() {
            "GET" => self.client.get(&request.url),
            "POST" => self.client.post(&request.url),
            "PUT" => self.client.put(&request.url),
            "DELETE" => self.client.delete(&request.url),
            "PATCH" => self.client.patch(&request.url),
            _ => return Err(anyhow!("Unsupported HTTP method: {}", request.method)),
        };
        request_builder = request_builder.timeout(request.timeout);

        for (key, value) in &request.headers {
            request_builder = request_builder.header(key, value);
        }

        // Objects and arrays go out as JSON, strings as plain text
        match &request.body {
            Some(body @ (Value::Object(_) | Value::Array(_))) => {
                request_builder = request_builder.json(body);
            }
            Some(Value::String(text)) => {
                request_builder = request_builder
                    .header("Content-Type", "text/plain")
                    .body(text.clone());
            }
            Some(Value::Null) | None => {}
            Some(other) => {
                request_builder = request_builder.json(other);
            }
        }

        let response = request_builder
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        let status = response.status();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let response_text = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body: {}", e))?;
        let body = serde_json::from_str::<Value>(&response_text)
            .unwrap_or(Value::String(response_text));

        tracing::debug!("📡 Response status: {} for {} {}", status, request.method, request.url);

        Ok(HttpResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}
