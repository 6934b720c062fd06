use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::principal::AuthResult;
use crate::config::ApiConfig;
use crate::error::{SessionError, SessionResult};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

/// Backend identity API. Produces the `AuthResult` the lifecycle controller consumes;
/// it never retries.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn login(&self, req: &LoginRequest) -> SessionResult<AuthResult>;
    async fn register(&self, req: &RegisterRequest) -> SessionResult<AuthResult>;
}

/// JSON-over-HTTP provider for the CRISP REST backend.
pub struct HttpAuthProvider {
    client: reqwest::Client,
    api: ApiConfig,
}

impl HttpAuthProvider {
    pub fn new(api: ApiConfig) -> SessionResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs.max(1)))
            .build()
            .map_err(|e| SessionError::config(format!("http client: {}", e)))?;
        Ok(Self { client, api })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> SessionResult<AuthResult> {
        let url = self.url(path);
        debug!(target: "crisp::api", "POST {}", url);
        let resp = self.client.post(&url).json(body).send().await
            .map_err(|e| SessionError::backend(None, format!("could not reach server: {}", e)))?;
        let status = resp.status();
        let val: Value = resp.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let msg = error_message(&val).unwrap_or_else(|| format!("request failed: HTTP {}", status.as_u16()));
            return Err(SessionError::backend(Some(status.as_u16()), msg));
        }
        if val.get("success").and_then(|v| v.as_bool()) == Some(false) {
            let msg = error_message(&val).unwrap_or_else(|| "request was rejected".to_string());
            return Err(SessionError::backend(Some(status.as_u16()), msg));
        }
        Ok(AuthResult::from_response(&val))
    }
}

// Human readable error text from the usual REST error shapes
fn error_message(val: &Value) -> Option<String> {
    for key in ["message", "detail", "error"] {
        if let Some(s) = val.get(key).and_then(|v| v.as_str()) {
            if !s.is_empty() { return Some(s.to_string()); }
        }
    }
    val.get("non_field_errors")
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn login(&self, req: &LoginRequest) -> SessionResult<AuthResult> {
        let res = self.post(&self.api.login_path, req).await?;
        info!(target: "crisp::api", user = %req.username, "login accepted by backend");
        Ok(res)
    }

    async fn register(&self, req: &RegisterRequest) -> SessionResult<AuthResult> {
        let res = self.post(&self.api.register_path, req).await?;
        info!(target: "crisp::api", user = %req.username, "registration accepted by backend");
        Ok(res)
    }
}
