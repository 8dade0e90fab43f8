use super::ui;
use crate::core::config::AppConfig;
use crate::core::storage::ObjectStore;
use crate::ingest::{IngestHandler, IngestResponse, InvocationContext};
use anyhow::{Result, bail};
use serde_json::json;
use std::sync::Arc;

/// Runs one ingestion against the local object store and prints the outcome.
pub async fn run(config: &AppConfig, store: Arc<dyn ObjectStore>) -> Result<IngestResponse> {
    let handler = IngestHandler::from_env(config, store);
    let context = InvocationContext {
        request_id: format!("cli-{}", chrono::Utc::now().timestamp_millis()),
    };

    let pb = ui::new_progress_bar(1, true);
    pb.set_message("Fetching news...");
    let response = handler.handle(&json!({}), &context).await;
    pb.finish_and_clear();

    if !response.is_success() {
        bail!("Ingestion failed ({}): {}", response.status_code, response.body);
    }
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(response)
}
