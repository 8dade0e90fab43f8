use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::core::config::WarehouseConfig;
use crate::core::warehouse::{Binding, Row, Warehouse};

const RESPONSE_MARGIN_SECS: u64 = 10;

/// Warehouse backed by the Snowflake SQL REST API.
pub struct SnowflakeWarehouse {
    base_url: String,
    config: WarehouseConfig,
    token: Option<String>,
}

impl SnowflakeWarehouse {
    pub fn new(config: &WarehouseConfig, token: Option<String>) -> Self {
        SnowflakeWarehouse {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config: config.clone(),
            token,
        }
    }

    /// Reads the bearer token from the environment variable named in config.
    pub fn from_env(config: &WarehouseConfig) -> Self {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.is_empty());
        if token.is_none() {
            warn!(
                "{} is not set, warehouse requests will be unauthenticated",
                config.token_env
            );
        }
        Self::new(config, token)
    }
}

#[derive(Serialize, Debug)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    database: &'a str,
    schema: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    bindings: BTreeMap<String, BindValue>,
}

#[derive(Serialize, Debug)]
struct BindValue {
    #[serde(rename = "type")]
    kind: &'static str,
    value: String,
}

impl From<&Binding> for BindValue {
    fn from(binding: &Binding) -> Self {
        match binding {
            Binding::Fixed(n) => BindValue {
                kind: "FIXED",
                value: n.to_string(),
            },
            Binding::Text(s) => BindValue {
                kind: "TEXT",
                value: s.clone(),
            },
        }
    }
}

#[derive(Deserialize, Debug)]
struct StatementResponse {
    #[serde(rename = "resultSetMetaData")]
    result_set_meta_data: ResultSetMetaData,
    #[serde(rename = "statementHandle")]
    statement_handle: Option<String>,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

#[derive(Deserialize, Debug)]
struct ResultSetMetaData {
    #[serde(rename = "rowType")]
    row_type: Vec<ColumnType>,
    #[serde(rename = "partitionInfo", default)]
    partition_info: Vec<Value>,
}

#[derive(Deserialize, Debug)]
struct ColumnType {
    name: String,
}

/// Body of a follow-up request for partitions after the first.
#[derive(Deserialize, Debug)]
struct PartitionResponse {
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

impl SnowflakeWarehouse {
    fn client(&self) -> Result<reqwest::Client> {
        // The statement timeout is enforced server side; leave room for the response
        let timeout = Duration::from_secs(
            self.config
                .timeout_secs
                .saturating_add(RESPONSE_MARGIN_SECS),
        );
        Ok(reqwest::Client::builder()
            .user_agent("cryptodash/0.1")
            .timeout(timeout)
            .build()?)
    }

    fn authorize(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request = request.header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
            if let Some(token_type) = &self.config.token_type {
                request = request.header("X-Snowflake-Authorization-Token-Type", token_type);
            }
        }
        request
    }

    async fn fetch_partition(
        &self,
        client: &reqwest::Client,
        handle: &str,
        partition: usize,
    ) -> Result<Vec<Vec<Value>>> {
        let url = format!(
            "{}/api/v2/statements/{}?partition={}",
            self.base_url, handle, partition
        );
        debug!("Fetching result partition from {}", url);
        let response = self
            .authorize(client.get(&url))
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for warehouse URL: {}", e, url))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(anyhow!(
                "Warehouse returned HTTP {} for result partition {}",
                status,
                partition
            ));
        }
        let text = response.text().await?;
        let parsed: PartitionResponse = serde_json::from_str(&text).map_err(|e| {
            anyhow!("Failed to parse warehouse partition {}: {}", partition, e)
        })?;
        Ok(parsed.data)
    }
}

#[async_trait]
impl Warehouse for SnowflakeWarehouse {
    #[instrument(name = "SnowflakeQuery", skip(self, bindings), fields(bindings = bindings.len()))]
    async fn query(&self, statement: &str, bindings: &[Binding]) -> Result<Vec<Row>> {
        let url = format!("{}/api/v2/statements", self.base_url);
        let body = StatementRequest {
            statement,
            timeout: self.config.timeout_secs,
            database: &self.config.database,
            schema: &self.config.schema,
            warehouse: self.config.warehouse.as_deref(),
            role: self.config.role.as_deref(),
            bindings: bindings
                .iter()
                .enumerate()
                .map(|(i, b)| ((i + 1).to_string(), BindValue::from(b)))
                .collect(),
        };
        debug!("Submitting statement to {}", url);

        let client = self.client()?;
        let response = self
            .authorize(client.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for warehouse URL: {}", e, url))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(anyhow!("Warehouse returned HTTP {} for statement", status));
        }

        let text = response.text().await?;
        let parsed: StatementResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse warehouse response: {}", e))?;

        let mut data = parsed.data;
        let partitions = parsed.result_set_meta_data.partition_info.len();
        if partitions > 1 {
            let handle = parsed.statement_handle.as_deref().ok_or_else(|| {
                anyhow!("Result has {} partitions but no statement handle", partitions)
            })?;
            for partition in 1..partitions {
                data.extend(self.fetch_partition(&client, handle, partition).await?);
            }
        }

        let columns: Vec<String> = parsed
            .result_set_meta_data
            .row_type
            .into_iter()
            .map(|c| c.name)
            .collect();
        let rows: Vec<Row> = data
            .into_iter()
            .map(|values| Row::new(columns.iter().zip(values)))
            .collect();
        debug!(rows = rows.len(), partitions, "Statement returned");
        Ok(rows)
    }
}
