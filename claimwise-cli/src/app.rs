//! Assembles a [`ClaimPipeline`] from configuration.

use std::sync::Arc;
use std::time::Duration;

use claimwise::chat::SharedChatProvider;
use claimwise::claim::{
    ClaimDomainGuardrail, CostEstimator, ImageAnalyst, RepairShopFinder, VisionDamageTool,
    WebSearchTool,
};
use claimwise::docgen::DocGenTarget;
use claimwise::llms::{OpenAI, OpenAIConfig};
use claimwise::pipeline::{ClaimPipeline, Orchestrator};
use claimwise::storage::{BoxClient, LocalStore};
use tracing::info;

use crate::config::{ClaimwiseConfig, ConfigError, StorageBackend};
use crate::error::Result;

/// Build the model provider.
fn provider(config: &ClaimwiseConfig) -> Result<SharedChatProvider> {
    let api_key = config
        .openai
        .api_key
        .clone()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ConfigError::MissingField("openai.api_key (or OPENAI_API_KEY)".into()))?;

    let mut openai = OpenAIConfig::new(api_key)
        .with_model(&config.models.specialist)
        .with_timeout(Duration::from_secs(config.openai.timeout_secs));
    if let Some(url) = &config.openai.base_url {
        openai = openai.with_base_url(url);
    }

    info!(base_url = %openai.base_url, "Using OpenAI backend");
    Ok(Arc::new(OpenAI::new(openai)?))
}

/// Build the guardrail and the three specialists.
///
/// # Errors
///
/// Fails when no API key is configured or an HTTP client cannot be built.
pub fn orchestrator(config: &ClaimwiseConfig) -> Result<Orchestrator> {
    let provider = provider(config)?;
    let models = &config.models;
    let steps = config.pipeline.max_steps;

    let guardrail =
        ClaimDomainGuardrail::new(Arc::clone(&provider), &models.guardrail).into_guardrail();
    let vision = VisionDamageTool::new(Arc::clone(&provider), &models.vision)
        .with_detail(models.image_detail);
    let search = WebSearchTool::new(Duration::from_secs(config.pipeline.search_timeout_secs))?
        .with_max_results(config.pipeline.shop_results);

    Ok(Orchestrator::new(
        guardrail,
        ImageAnalyst::new(Arc::clone(&provider), &models.specialist, vision).max_steps(steps),
        CostEstimator::new(Arc::clone(&provider), &models.specialist).max_steps(steps),
        RepairShopFinder::new(provider, &models.specialist, search).max_steps(steps),
    ))
}

/// Build the pipeline with the configured storage backend.
///
/// Document generation is attached only when it is enabled in the config
/// and `docgen` is set.
///
/// # Errors
///
/// Fails when a required credential is missing or a client cannot be built.
pub fn pipeline(config: &ClaimwiseConfig, docgen: bool) -> Result<ClaimPipeline> {
    let orchestrator = orchestrator(config)?;

    let pipeline = match config.storage.backend {
        StorageBackend::Local => {
            let store = Arc::new(LocalStore::new(config.storage.root.clone()));
            info!(root = %store.root().display(), "Using local storage");
            ClaimPipeline::new(orchestrator, Arc::<LocalStore>::clone(&store), store)
        }
        StorageBackend::Box => {
            let section = &config.storage.box_api;
            let token = section
                .token
                .clone()
                .filter(|token| !token.is_empty())
                .ok_or_else(|| {
                    ConfigError::MissingField("storage.box.token (or BOX_DEVELOPER_TOKEN)".into())
                })?;
            let mut client = BoxClient::new(token, Duration::from_secs(section.timeout_secs))?;
            if let Some(url) = &section.base_url {
                client = client.with_base_url(url)?;
            }
            info!(base_url = %client.base_url(), "Using Box storage");
            let client = Arc::new(client);

            let pipeline = ClaimPipeline::new(
                orchestrator,
                Arc::<BoxClient>::clone(&client),
                Arc::<BoxClient>::clone(&client),
            );
            if docgen && config.docgen.enabled {
                let target = DocGenTarget {
                    template_id: config.docgen.template_id.clone(),
                    folder_id: config.docgen.folder_id.clone(),
                    output_format: config.docgen.output_format,
                };
                pipeline.with_document_generator(client, target)
            } else {
                pipeline
            }
        }
    };

    Ok(pipeline.with_concurrency(config.pipeline.concurrency))
}
