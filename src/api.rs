use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::ApiError;

pub const DEFAULT_HOST: &str = "https://www.barrage.io";
pub const HOST_ENV: &str = "BARRAGE_HOST";

/// Per-invocation settings, built once and threaded into everything that
/// talks to the service.
#[derive(Debug, Clone)]
pub struct Context {
    pub host: String,
    pub user: String,
    pub api_key: String,
}

impl Context {
    /// Host resolution order: explicit flag, `BARRAGE_HOST`, default.
    pub fn new(host: Option<String>, user: String, api_key: String) -> Self {
        let host = host
            .or_else(|| std::env::var(HOST_ENV).ok())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        Self {
            host,
            user,
            api_key,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ScreenshotResponse {
    #[serde(default)]
    screenshot: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Wire seam between the job lifecycle and the remote service. One
/// implementation speaks HTTP; tests script their own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, plan: &Value) -> Result<QueueResponse, ApiError>;
    async fn job_status(&self, job_id: &str) -> Result<StatusResponse, ApiError>;
    async fn abort_job(&self, job_id: &str) -> Result<(), ApiError>;
    async fn login(&self) -> Result<LoginResponse, ApiError>;
    async fn screenshot(&self, job_id: &str) -> Result<Vec<u8>, ApiError>;
}

/// reqwest-backed transport speaking the service's JSON API.
pub struct HttpTransport {
    base: Url,
    user: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(ctx: &Context) -> Result<Self, ApiError> {
        Ok(Self {
            base: Url::parse(&ctx.host)?,
            user: ctx.user.clone(),
            api_key: ctx.api_key.clone(),
            client: reqwest::Client::new(),
        })
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let url = self.base.join(path)?;
        Ok(self
            .client
            .request(method, url)
            .header("X-API-User", &self.user)
            .header("X-API-Key", &self.api_key)
            .header("X-API-Client", "cli"))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .request(reqwest::Method::GET, path)?
            .send()
            .await?
            .json::<T>()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, plan: &Value) -> Result<QueueResponse, ApiError> {
        let response = self
            .request(reqwest::Method::POST, "/api/1/curl/execute")?
            .json(plan)
            .send()
            .await?
            .json()
            .await?;
        Ok(response)
    }

    async fn job_status(&self, job_id: &str) -> Result<StatusResponse, ApiError> {
        self.get_json(&format!("/api/1/jobs/{job_id}/status")).await
    }

    async fn abort_job(&self, job_id: &str) -> Result<(), ApiError> {
        // response body intentionally ignored
        self.request(reqwest::Method::POST, &format!("/api/1/jobs/{job_id}/abort"))?
            .send()
            .await?;
        Ok(())
    }

    async fn login(&self) -> Result<LoginResponse, ApiError> {
        self.get_json("/api/1/login").await
    }

    async fn screenshot(&self, job_id: &str) -> Result<Vec<u8>, ApiError> {
        let response: ScreenshotResponse = self
            .get_json(&format!("/api/1/jobs/{job_id}/screenshot"))
            .await?;
        if let Some(error) = response.error {
            return Err(ApiError::Protocol(error));
        }
        let encoded = response
            .screenshot
            .ok_or_else(|| ApiError::Protocol("screenshot payload missing".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|err| ApiError::Protocol(format!("screenshot is not base64: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_prefers_explicit_host() {
        let ctx = Context::new(
            Some("https://staging.example.com".to_string()),
            "me@example.com".to_string(),
            "key".to_string(),
        );
        assert_eq!(ctx.host, "https://staging.example.com");
    }

    #[test]
    fn test_status_response_tolerates_sparse_payloads() {
        let response: StatusResponse = serde_json::from_str(r#"{"status":"queued"}"#).unwrap();
        assert_eq!(response.status.as_deref(), Some("queued"));
        assert!(response.result.is_none());
        assert!(response.error.is_none());
    }

    #[test]
    fn test_queue_response_with_error() {
        let response: QueueResponse =
            serde_json::from_str(r#"{"error":"validation","reason":"bad plan"}"#).unwrap();
        assert_eq!(response.error.as_deref(), Some("validation"));
        assert!(response.job_id.is_none());
    }
}
