use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::news::{NewsItem, NewsProvider};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Finnhub market news endpoint.
pub struct FinnhubProvider {
    base_url: String,
    api_key: String,
}

impl FinnhubProvider {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        FinnhubProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl NewsProvider for FinnhubProvider {
    #[instrument(name = "FinnhubNewsFetch", skip(self))]
    async fn general_news(&self, category: &str, min_id: i64) -> Result<Vec<NewsItem>> {
        let endpoint = format!("{}/news", self.base_url);
        let url = reqwest::Url::parse_with_params(
            &endpoint,
            &[
                ("category", category.to_string()),
                ("minId", min_id.to_string()),
                ("token", self.api_key.clone()),
            ],
        )
        .map_err(|e| anyhow!("Invalid news endpoint {}: {}", endpoint, e))?;
        debug!("Requesting news from {}", endpoint);

        let client = reqwest::Client::builder()
            .user_agent("cryptodash/0.1")
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for news category: {}", e, category))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for news category: {}",
                response.status(),
                category
            ));
        }

        let text = response.text().await?;
        let items: Vec<NewsItem> = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse news response for {}: {}", category, e))?;
        debug!(count = items.len(), "Received news items");
        Ok(items)
    }
}
