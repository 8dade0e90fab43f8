//! News ingestion: fetch the news feed once and archive it as a dated
//! JSON document in object storage.
use crate::core::config::{AppConfig, NewsConfig};
use crate::core::news::{NewsItem, NewsProvider};
use crate::core::storage::ObjectStore;
use crate::providers::finnhub::FinnhubProvider;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Invocation metadata supplied by whatever triggers the handler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvocationContext {
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl IngestResponse {
    fn ok(body: String) -> Self {
        IngestResponse {
            status_code: 200,
            body,
        }
    }

    fn error(body: String) -> Self {
        IngestResponse {
            status_code: 500,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Object key for a given day's news, e.g. `crypto_news__20240131.json`.
pub fn object_key(date: NaiveDate) -> String {
    format!("crypto_news__{}.json", date.format("%Y%m%d"))
}

type ProviderFactory = dyn Fn(&str) -> Box<dyn NewsProvider> + Send + Sync;

pub struct IngestHandler {
    news: NewsConfig,
    bucket: String,
    api_key: Option<String>,
    store: Arc<dyn ObjectStore>,
    provider_factory: Box<ProviderFactory>,
}

impl IngestHandler {
    /// Builds a handler that talks to the configured news API.
    pub fn new(config: &AppConfig, api_key: Option<String>, store: Arc<dyn ObjectStore>) -> Self {
        let base_url = config.news.base_url.clone();
        Self::with_provider(
            config,
            api_key,
            store,
            Box::new(move |key: &str| -> Box<dyn NewsProvider> {
                Box::new(FinnhubProvider::new(&base_url, key))
            }),
        )
    }

    /// Reads the API key from the environment variable named in config.
    pub fn from_env(config: &AppConfig, store: Arc<dyn ObjectStore>) -> Self {
        let api_key = std::env::var(&config.news.api_key_env).ok();
        Self::new(config, api_key, store)
    }

    pub fn with_provider(
        config: &AppConfig,
        api_key: Option<String>,
        store: Arc<dyn ObjectStore>,
        provider_factory: Box<ProviderFactory>,
    ) -> Self {
        IngestHandler {
            news: config.news.clone(),
            bucket: config.storage.bucket.clone(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            store,
            provider_factory,
        }
    }

    pub async fn handle(&self, event: &Value, context: &InvocationContext) -> IngestResponse {
        self.handle_on(event, context, Local::now().date_naive())
            .await
    }

    /// Same as [`handle`](Self::handle) with the archive date fixed.
    #[instrument(name = "IngestNews", skip(self, event), fields(request_id = %context.request_id))]
    pub async fn handle_on(
        &self,
        event: &Value,
        context: &InvocationContext,
        date: NaiveDate,
    ) -> IngestResponse {
        info!(?event, "Ingestion invoked");

        let Some(api_key) = self.api_key.as_deref() else {
            error!("{} is not set", self.news.api_key_env);
            return IngestResponse::error(format!(
                "API key not set. Please set the {} environment variable.",
                self.news.api_key_env
            ));
        };

        let provider = (self.provider_factory)(api_key);
        let news = match provider.general_news(&self.news.category, 0).await {
            Ok(news) => news,
            Err(e) => {
                error!("News fetch failed: {:#}", e);
                return IngestResponse::error(format!("Error fetching news: {e:#}"));
            }
        };

        let body = match serde_json::to_vec(&news) {
            Ok(body) => body,
            Err(e) => return IngestResponse::error(format!("Error serializing news: {e}")),
        };

        let key = object_key(date);
        match self.store.put_object(&self.bucket, &key, body).await {
            Ok(()) => {
                let newest_id = news.iter().filter_map(NewsItem::id).max();
                info!(
                    items = news.len(),
                    ?newest_id,
                    "Saved news to {}/{}",
                    self.bucket,
                    key
                );
                IngestResponse::ok(format!(
                    "News data saved to bucket '{}' as '{}'",
                    self.bucket, key
                ))
            }
            Err(e) => {
                error!("Storage write failed: {:#}", e);
                IngestResponse::error(format!("Error saving to storage: {e:#}"))
            }
        }
    }
}
