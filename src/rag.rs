//! Retrieval-augmented query engine.
//!
//! Embeds the query, retrieves top-k chunks scoped to a document, builds a
//! grounded prompt and asks the generative model. Internal failures are
//! logged in full but callers only ever see the opaque
//! [`MessageProcessingError`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::embedder::TextEmbedder;
use crate::errors::{LlmError, MessageProcessingError};
use crate::llm::GenerativeModel;
use crate::vector_store::{RetrievedChunk, VectorStore};

pub const DEFAULT_TOP_K: usize = 5;

const NO_MATCH_ANSWER: &str = "No relevant documents found.";
const FALLBACK_TITLE: &str = "New Conversation";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub text: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
}

pub struct RagEngine {
    embedder: Arc<dyn TextEmbedder>,
    store: Arc<dyn VectorStore>,
    /// Model used for grounded answers.
    model_lg: Arc<dyn GenerativeModel>,
    /// Small model used for best-effort title generation.
    model_sm: Arc<dyn GenerativeModel>,
}

impl RagEngine {
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        store: Arc<dyn VectorStore>,
        model_lg: Arc<dyn GenerativeModel>,
        model_sm: Arc<dyn GenerativeModel>,
    ) -> Self {
        Self {
            embedder,
            store,
            model_lg,
            model_sm,
        }
    }

    /// Answer `query` grounded in chunks of `doc_id` (or the whole index
    /// when unscoped). No retrieved chunks is a normal outcome, answered
    /// without a model call.
    pub async fn generate_augmented_response(
        &self,
        query: &str,
        doc_id: Option<&str>,
        top_k: usize,
    ) -> Result<RagResponse, MessageProcessingError> {
        match self.try_generate(query, doc_id, top_k).await {
            Ok(response) => Ok(response),
            Err(err) => {
                tracing::error!("query engine failure: {}", err);
                Err(MessageProcessingError)
            }
        }
    }

    async fn try_generate(
        &self,
        query: &str,
        doc_id: Option<&str>,
        top_k: usize,
    ) -> anyhow::Result<RagResponse> {
        let query_embedding = self
            .embedder
            .embed(std::slice::from_ref(&query.to_string()))
            .await?;
        let query_embedding = query_embedding
            .first()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for query"))?;

        let results = self.store.query(query_embedding, top_k, doc_id).await?;

        if results.is_empty() {
            return Ok(RagResponse {
                answer: NO_MATCH_ANSWER.to_string(),
                citations: Vec::new(),
            });
        }

        let prompt = build_prompt(query, &results);
        let response = self.model_lg.generate_content(&prompt).await?;
        let answer = response
            .first_text()
            .ok_or(LlmError::EmptyContent)?
            .to_string();

        let citations = results
            .iter()
            .map(|r| Citation {
                text: r.text.clone(),
                source: r.doc_id.clone(),
            })
            .collect();

        Ok(RagResponse { answer, citations })
    }

    /// One small-model call producing a short conversation title.
    /// Best-effort: any failure falls back to a fixed title so conversation
    /// creation is never blocked.
    pub async fn generate_conversation_title(&self, user_query: &str) -> String {
        let prompt = format!(
            "Create a very concise title (5 words or less) for a conversation \
             based on the following user query. The title should capture the \
             essence of the query without being a direct restatement.\n\n\
             User Query: {}\n\n\
             Title:",
            user_query
        );

        match self.model_sm.generate_content(&prompt).await {
            Ok(response) => match response.first_text() {
                Some(title) => title.trim().to_string(),
                None => {
                    tracing::warn!("title generation returned no content, using fallback");
                    FALLBACK_TITLE.to_string()
                }
            },
            Err(err) => {
                tracing::warn!("title generation failed: {}", err);
                FALLBACK_TITLE.to_string()
            }
        }
    }
}

/// Fixed instruction + retrieved context (blank-line separated, in store
/// order) + the original question. Deterministic for a fixed result set.
fn build_prompt(query: &str, results: &[RetrievedChunk]) -> String {
    let context = results
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Answer the question based on the context below:\n\n\
         Context:\n{}\n\n\
         Question: {}\n\n\
         Answer:",
        context, query
    )
}
