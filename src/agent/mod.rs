//! Reasoning agent construction and the tool-use loop
//!
//! An agent is a bound (instructions, tool set, provider) triple. The tool
//! set always contains exactly one retrieval tool wrapping the session's
//! document retriever, and the agent is rebuilt per chat turn from the
//! cached retrieval handle — it carries no state across turns.
//!
//! The think/act/observe iteration itself belongs to the provider; this
//! module only drives the tool-invocation cycle: send the conversation,
//! execute any requested searches, feed observations back, and stop at a
//! final textual answer.

use crate::error::{AnamnesisError, Result};
use crate::index::DocumentRetriever;
use crate::llm::{CompletionRequest, ContentBlock, LlmProvider, Message, ToolSpec};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the single retrieval tool
pub const RETRIEVAL_TOOL_NAME: &str = "search_documents";

/// Upper bound on tool-call/observation cycles in one turn
const MAX_TOOL_ROUNDS: usize = 8;

/// Built-in agent instruction template, used when no prompt file is
/// configured. The fallback policy wording is a behavioral contract: the
/// agent must say when the documents lack the answer before reaching for
/// general knowledge.
const DEFAULT_INSTRUCTIONS: &str = "\
You are a document-grounded assistant operating in a think-act-observe loop.

You have exactly one tool: search_documents, which searches the user's
uploaded documents. For any question that could be answered from those
documents, call search_documents first and ground your answer in the
passages it returns.

If the retrieved passages do not contain the information needed, explicitly
state that the uploaded documents do not contain the answer, and only then
answer from your general knowledge.

The input includes the recent conversation history and long-term memory
about this user. Use them for conversational continuity.

Produce a clear, final textual answer once you have enough information.";

/// Observation returned when retrieval finds nothing
const EMPTY_OBSERVATION: &str = "No matching passages were found in the uploaded documents.";

/// Factory for per-turn agents
pub struct AgentBuilder {
    provider: Arc<dyn LlmProvider>,
    instructions: String,
}

impl AgentBuilder {
    /// Create a builder, loading the instruction template from
    /// `prompt_path` when configured and present, with a built-in fallback
    pub fn new(provider: Arc<dyn LlmProvider>, prompt_path: Option<&Path>) -> Self {
        let instructions = match prompt_path {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(text) if !text.trim().is_empty() => {
                    info!("Agent instructions loaded from: {}", path.display());
                    text.trim().to_string()
                }
                Ok(_) => {
                    warn!(
                        "Prompt file {} is empty. Using default instructions.",
                        path.display()
                    );
                    DEFAULT_INSTRUCTIONS.to_string()
                }
                Err(e) => {
                    warn!(
                        "Prompt file {} not readable ({}). Using default instructions.",
                        path.display(),
                        e
                    );
                    DEFAULT_INSTRUCTIONS.to_string()
                }
            },
            None => DEFAULT_INSTRUCTIONS.to_string(),
        };

        Self {
            provider,
            instructions,
        }
    }

    /// Bind an agent to a session's retrieval handle
    pub fn build(&self, retriever: Arc<DocumentRetriever>) -> Agent {
        Agent {
            provider: Arc::clone(&self.provider),
            instructions: self.instructions.clone(),
            tool: RetrieverTool { retriever },
        }
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }
}

/// The session retriever wrapped as the agent's single tool
pub struct RetrieverTool {
    retriever: Arc<DocumentRetriever>,
}

impl RetrieverTool {
    /// Tool description handed to the model
    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: RETRIEVAL_TOOL_NAME.to_string(),
            description: "Search the user's uploaded documents for passages relevant \
                          to a query. Prefer this tool whenever the question could be \
                          answered from the uploaded documents."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query to run against the documents"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    /// Run a search and render the observation text
    pub async fn invoke(&self, query: &str) -> Result<String> {
        let chunks = self.retriever.search(query).await?;

        if chunks.is_empty() {
            return Ok(EMPTY_OBSERVATION.to_string());
        }

        Ok(chunks
            .iter()
            .map(|chunk| format!("[{}] {}", chunk.source, chunk.text))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n"))
    }
}

/// A bound reasoning agent: stateless across turns
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    instructions: String,
    tool: RetrieverTool,
}

impl Agent {
    /// Run the reasoning loop to a final textual answer
    ///
    /// Tool invocation failures are fed back to the model as observations
    /// (recoverable); provider failures propagate (fatal for the turn).
    pub async fn run(&self, input: &str) -> Result<String> {
        let mut messages = vec![Message::user_text(input)];

        for round in 0..MAX_TOOL_ROUNDS {
            let completion = self
                .provider
                .complete(CompletionRequest {
                    system: self.instructions.clone(),
                    messages: messages.clone(),
                    tools: vec![self.tool.spec()],
                })
                .await?;

            let tool_uses: Vec<(String, String, serde_json::Value)> = completion
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            if tool_uses.is_empty() {
                let answer = completion.text();
                if answer.trim().is_empty() {
                    return Err(AnamnesisError::LlmApi(
                        "Reasoning loop produced an empty answer".to_string(),
                    ));
                }
                debug!("Agent finished after {} tool rounds", round);
                return Ok(answer);
            }

            messages.push(Message::assistant(completion.content.clone()));

            let mut results = Vec::new();
            for (id, name, tool_input) in tool_uses {
                let observation = self.observe(&name, &tool_input).await;
                results.push(ContentBlock::ToolResult {
                    tool_use_id: id,
                    content: observation,
                });
            }
            messages.push(Message::tool_results(results));
        }

        Err(AnamnesisError::LlmApi(format!(
            "Reasoning loop exceeded {} tool rounds without a final answer",
            MAX_TOOL_ROUNDS
        )))
    }

    /// Execute one tool call, turning failures into observations the model
    /// can recover from
    async fn observe(&self, name: &str, input: &serde_json::Value) -> String {
        if name != RETRIEVAL_TOOL_NAME {
            warn!("Agent requested unknown tool: {}", name);
            return format!("Unknown tool: {}", name);
        }

        let query = match input.get("query").and_then(|v| v.as_str()) {
            Some(q) if !q.trim().is_empty() => q,
            _ => {
                return "Tool error: search_documents requires a non-empty 'query' string."
                    .to_string()
            }
        };

        debug!("Agent searching documents: '{}'", query);
        match self.tool.invoke(query).await {
            Ok(observation) => observation,
            Err(e) => {
                warn!("Retrieval tool failed: {}", e);
                format!("Tool error: {}", e)
            }
        }
    }

    /// The bound tool set (always exactly one retrieval tool)
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        vec![self.tool.spec()]
    }
}
