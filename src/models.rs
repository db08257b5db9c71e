use anyhow::{Context, Result};

use crate::config::RuntimeConfig;
use crate::openai::{ModelInfo, OpenAiClient};

/// Model ids sorted for stable output.
pub fn sorted_model_ids(models: &[ModelInfo]) -> Vec<&str> {
    let mut ids = models
        .iter()
        .map(|model| model.id.as_str())
        .collect::<Vec<_>>();
    ids.sort_unstable();
    ids.dedup();
    ids
}

pub async fn run_list_models(cfg: &RuntimeConfig) -> Result<()> {
    tracing::debug!("list-models command called");
    let api_key = cfg.require_api_key()?;
    let client = OpenAiClient::new(api_key, cfg.base_url.as_str());
    let models = client
        .list_models()
        .await
        .context("failed to list models")?;
    for id in sorted_model_ids(&models) {
        println!("{id}");
    }
    Ok(())
}
