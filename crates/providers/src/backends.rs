//! Backend selection: builds the retrieval and completion collaborators
//! named in the configuration.
//!
//! When both collaborators run on Cortex they share one SQL API client.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gamewizard_config::AppConfig;
use gamewizard_core::error::Error;
use gamewizard_core::knowledge::KnowledgeStore;
use gamewizard_core::provider::CompletionProvider;
use tracing::info;

use crate::cortex::{CortexCompletionProvider, CortexKnowledgeStore};
use crate::in_memory::InMemoryKnowledgeStore;
use crate::openai_compat::OpenAiCompatProvider;
use crate::sql_api::SqlApiClient;

/// The two external collaborators of a question-answer turn.
#[derive(Clone)]
pub struct Backends {
    pub knowledge: Arc<dyn KnowledgeStore>,
    pub completion: Arc<dyn CompletionProvider>,
}

/// Build both collaborators from configuration.
pub fn build_from_config(config: &AppConfig) -> Result<Backends, Error> {
    let needs_sql_api =
        config.retrieval.backend == "cortex" || config.completion.provider == "cortex";

    let sql_api = if needs_sql_api {
        let client = SqlApiClient::from_config(&config.backend).map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        Some(Arc::new(client))
    } else {
        None
    };

    let knowledge: Arc<dyn KnowledgeStore> = match (config.retrieval.backend.as_str(), &sql_api) {
        ("cortex", Some(client)) => Arc::new(CortexKnowledgeStore::new(
            client.clone(),
            &config.retrieval.table,
            &config.retrieval.embedding_model,
        )),
        ("file", _) => {
            let file = config.retrieval.knowledge_file.as_deref().ok_or_else(|| Error::Config {
                message: "retrieval.knowledge_file is not set".into(),
            })?;
            // Relative paths were already resolved against the config file's directory.
            let store = InMemoryKnowledgeStore::from_file(Path::new(file))?;
            Arc::new(store)
        }
        (other, _) => {
            return Err(Error::Config {
                message: format!("unknown retrieval backend: {other}"),
            });
        }
    };

    let completion: Arc<dyn CompletionProvider> =
        match (config.completion.provider.as_str(), &sql_api) {
            ("cortex", Some(client)) => Arc::new(CortexCompletionProvider::new(client.clone())),
            ("openai", _) => Arc::new(openai_provider(config)?),
            (other, _) => {
                return Err(Error::Config {
                    message: format!("unknown completion provider: {other}"),
                });
            }
        };

    info!(
        knowledge = knowledge.name(),
        completion = completion.name(),
        "Backends ready"
    );

    Ok(Backends {
        knowledge,
        completion,
    })
}

fn openai_provider(config: &AppConfig) -> Result<OpenAiCompatProvider, Error> {
    let base_url = config
        .completion
        .api_url
        .clone()
        .unwrap_or_else(|| "https://api.openai.com/v1".into());
    let api_key = config.completion.api_key.clone().unwrap_or_default();
    let timeout = Duration::from_secs(config.completion.timeout_secs);

    Ok(OpenAiCompatProvider::new("openai", base_url, api_key, timeout)?
        .with_temperature(config.completion.temperature))
}
