use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use plateplan_core::error::GenerationError;
use plateplan_core::request::{GenerationRequest, SwapRequest};
use plateplan_core::transport::PlanTransport;

const GENERATE_PATH: &str = "generateMealPlan";
const SWAP_PATH: &str = "swapMeal";

/// Calls the hosted generation functions over HTTPS.
pub struct HttpPlanTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpPlanTransport {
    pub fn new(base_url: &str, token: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("plateplan-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// POST `body` as JSON and hand back the raw response text.
    ///
    /// Error statuses that still carry a body are returned as-is so the
    /// decoder can surface the server's own `error` message.
    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<String, GenerationError> {
        let url = format!("{}/{path}", self.base_url);
        let mut req = self.client.post(&url).json(body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        tracing::debug!(%url, %status, bytes = text.len(), "generation response");
        if status.is_success() || !text.trim().is_empty() {
            Ok(text)
        } else {
            Err(GenerationError::Transport(format!("HTTP {status} from {url}")))
        }
    }
}

#[async_trait]
impl PlanTransport for HttpPlanTransport {
    async fn request_plan(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.post(GENERATE_PATH, request).await
    }

    async fn request_swap(&self, request: &SwapRequest) -> Result<String, GenerationError> {
        self.post(SWAP_PATH, request).await
    }
}
