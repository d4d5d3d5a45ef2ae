use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use plateplan_core::catalog::{CatalogPage, CatalogRecipe, CatalogSource};
use plateplan_core::error::CatalogError;

/// Read-only client for the hosted recipe catalog.
///
/// `GET {base}/recipes?limit&after` pages by document id;
/// `GET {base}/recipes/search` takes either `prefix` or `q`.
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpCatalogClient {
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

    async fn get_page(&self, path: &str, query: &[(&str, String)]) -> Result<CatalogPage, CatalogError> {
        let url = format!("{}/{path}", self.base_url);
        let mut req = self.client.get(&url).query(query);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CatalogError::Transport(format!("HTTP {status} from {url}")));
        }
        let text = resp
            .text()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogClient {
    async fn fetch_page(&self, after: Option<&str>, limit: usize) -> Result<CatalogPage, CatalogError> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }
        self.get_page("recipes", &query).await
    }

    async fn search_prefix(&self, query: &str, limit: usize) -> Result<Vec<CatalogRecipe>, CatalogError> {
        let params = [("prefix", query.to_string()), ("limit", limit.to_string())];
        Ok(self.get_page("recipes/search", &params).await?.recipes)
    }

    async fn search_scan(&self, query: &str, limit: usize) -> Result<Vec<CatalogRecipe>, CatalogError> {
        let params = [("q", query.to_string()), ("limit", limit.to_string())];
        Ok(self.get_page("recipes/search", &params).await?.recipes)
    }
}
