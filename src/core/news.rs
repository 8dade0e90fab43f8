//! News abstractions

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single item of the news feed, held as the object the feed returned.
/// Fields are neither added nor dropped, and nulls are kept, so the
/// archived document matches the feed exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NewsItem(Map<String, Value>);

impl NewsItem {
    pub fn id(&self) -> Option<i64> {
        self.0.get("id").and_then(Value::as_i64)
    }

    pub fn headline(&self) -> Option<&str> {
        self.0.get("headline").and_then(Value::as_str)
    }

    pub fn source(&self) -> Option<&str> {
        self.0.get("source").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }
}

impl From<Map<String, Value>> for NewsItem {
    fn from(fields: Map<String, Value>) -> Self {
        NewsItem(fields)
    }
}

/// A headline row as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    pub source: String,
    pub headline: String,
    pub url: String,
}

#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// Fetches the general news feed for `category`, newest first.
    async fn general_news(&self, category: &str, min_id: i64) -> Result<Vec<NewsItem>>;
}
