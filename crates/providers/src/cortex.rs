//! Snowflake Cortex backends.
//!
//! Both collaborators run as SQL statements on the same account:
//! - retrieval embeds the question with `EMBED_TEXT_768` and ranks the chunk
//!   table by `VECTOR_COSINE_SIMILARITY`
//! - completion calls `SNOWFLAKE.CORTEX.COMPLETE(model, prompt)`
//!
//! User text and model names always travel as bindings. Only the table
//! name is interpolated, and config validation restricts it to a plain
//! identifier.

use std::sync::Arc;

use async_trait::async_trait;
use gamewizard_core::error::{ProviderError, RetrievalError};
use gamewizard_core::knowledge::{KnowledgeChunk, KnowledgeStore};
use gamewizard_core::provider::{CompletionProvider, CompletionRequest, CompletionResponse};
use tracing::debug;

use crate::sql_api::{Binding, ResultSet, SqlApiClient};

/// Vector similarity search over a chunk table.
pub struct CortexKnowledgeStore {
    client: Arc<SqlApiClient>,
    table: String,
    embedding_model: String,
}

impl CortexKnowledgeStore {
    pub fn new(
        client: Arc<SqlApiClient>,
        table: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            table: table.into(),
            embedding_model: embedding_model.into(),
        }
    }

    fn statement(&self) -> String {
        format!(
            "WITH results AS (\
             SELECT relative_path, \
             VECTOR_COSINE_SIMILARITY({table}.chunk_vec, SNOWFLAKE.CORTEX.EMBED_TEXT_768(?, ?)) AS similarity, \
             chunk \
             FROM {table} \
             ORDER BY similarity DESC \
             LIMIT ?) \
             SELECT chunk, relative_path, similarity FROM results",
            table = self.table
        )
    }
}

/// Turn the search result rows into chunks, keeping row order.
fn chunks_from_rows(result: &ResultSet) -> Result<Vec<KnowledgeChunk>, RetrievalError> {
    if result.column_index("CHUNK").is_none() {
        return Err(RetrievalError::MalformedResult(
            "search result has no CHUNK column".into(),
        ));
    }

    Ok((0..result.rows.len())
        .map(|row| KnowledgeChunk {
            content: result.value(row, "CHUNK").unwrap_or_default().to_string(),
            source: result
                .value(row, "RELATIVE_PATH")
                .unwrap_or("unknown")
                .to_string(),
            similarity: result
                .value(row, "SIMILARITY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0),
        })
        .collect())
}

#[async_trait]
impl KnowledgeStore for CortexKnowledgeStore {
    fn name(&self) -> &str {
        "cortex"
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<KnowledgeChunk>, RetrievalError> {
        debug!(table = %self.table, top_k, "Cortex similarity search");

        let bindings = [
            Binding::Text(self.embedding_model.clone()),
            Binding::Text(query.to_string()),
            Binding::Fixed(top_k as i64),
        ];
        let result = self.client.execute(&self.statement(), &bindings).await?;
        chunks_from_rows(&result)
    }

    async fn health_check(&self) -> Result<bool, RetrievalError> {
        Ok(self.client.ping().await?)
    }
}

/// Text generation through `SNOWFLAKE.CORTEX.COMPLETE`.
pub struct CortexCompletionProvider {
    client: Arc<SqlApiClient>,
}

impl CortexCompletionProvider {
    pub fn new(client: Arc<SqlApiClient>) -> Self {
        Self { client }
    }
}

const COMPLETE_STATEMENT: &str = "SELECT SNOWFLAKE.CORTEX.COMPLETE(?, ?) AS response";

fn response_from_rows(result: &ResultSet) -> Result<String, ProviderError> {
    result
        .value(0, "RESPONSE")
        .map(str::to_string)
        .ok_or_else(|| ProviderError::MalformedResponse("completion returned no RESPONSE".into()))
}

#[async_trait]
impl CompletionProvider for CortexCompletionProvider {
    fn name(&self) -> &str {
        "cortex"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        debug!(model = %request.model, prompt_len = request.prompt.len(), "Cortex completion");

        let bindings = [
            Binding::Text(request.model.clone()),
            Binding::Text(request.prompt),
        ];
        let result = self.client.execute(COMPLETE_STATEMENT, &bindings).await?;

        Ok(CompletionResponse {
            text: response_from_rows(&result)?,
            model: request.model,
        })
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(self.client.ping().await?)
    }
}
