//! Conversation orchestration
//!
//! Runs one chat turn end to end: gather short-term history and long-term
//! memory, compose the reasoning input, invoke the agent, then persist the
//! new turn and memory. The error policy is deliberately asymmetric:
//! everything feeding the reasoning loop's grounding context is strict
//! except the history read (which degrades to a stateless turn), and
//! everything after the answer exists is fire-and-log — a persistence
//! failure must never retroactively fail a delivered answer.

use crate::agent::Agent;
use crate::error::Result;
use crate::memory::SemanticMemory;
use crate::storage::HistoryStore;
use crate::types::{ChatReply, ChatTurn};
use std::sync::Arc;
use tracing::{info, warn};

/// Compose the reasoning-loop input from its three blocks, in fixed order.
///
/// Empty blocks render as empty sections under their headers so the
/// template the reasoning loop sees never changes shape.
pub fn compose_prompt(history: &[ChatTurn], memories: &[String], question: &str) -> String {
    let history_block = history
        .iter()
        .map(|turn| format!("User: {}\nAssistant: {}", turn.user_input, turn.response))
        .collect::<Vec<_>>()
        .join("\n");

    let memory_block = memories
        .iter()
        .map(|memory| format!("- {}", memory))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Short-Term Conversation History:\n{}\n\n\
         Long-Term Semantic Memory:\n{}\n\n\
         User Query:\n{}",
        history_block, memory_block, question
    )
}

/// Per-turn conversation state machine
pub struct ConversationOrchestrator {
    history: Arc<dyn HistoryStore>,
    memory: Arc<SemanticMemory>,
    history_limit: usize,
}

impl ConversationOrchestrator {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        memory: Arc<SemanticMemory>,
        history_limit: usize,
    ) -> Self {
        Self {
            history,
            memory,
            history_limit,
        }
    }

    /// Run one chat turn
    ///
    /// History-store read failures degrade to empty history; memory-store
    /// and reasoning failures are fatal for the turn. Once the answer
    /// exists, turn and memory persistence are best-effort.
    pub async fn respond(
        &self,
        agent: &Agent,
        session_id: &str,
        question: &str,
    ) -> Result<ChatReply> {
        info!("Chat turn started | session_id={}", session_id);

        // GATHER_CONTEXT: lenient history, strict memory
        let history = match self.history.recent(session_id, self.history_limit).await {
            Ok(turns) => turns,
            Err(e) => {
                warn!(
                    "History fetch failed for session {}; continuing with empty history: {}",
                    session_id, e
                );
                Vec::new()
            }
        };

        let memories = self.memory.retrieve(session_id, question).await?;

        // BUILD_PROMPT + REASON
        let prompt = compose_prompt(&history, &memories, question);
        let answer = agent.run(&prompt).await?;

        // PERSIST_TURN: best-effort relative to answer delivery
        if let Err(e) = self.history.append(session_id, question, &answer).await {
            warn!(
                "Failed to persist chat turn for session {}: {}",
                session_id, e
            );
        }

        // PERSIST_MEMORY: same policy
        if let Err(e) = self.memory.store(session_id, question).await {
            warn!(
                "Failed to persist memory for session {}: {}",
                session_id, e
            );
        }

        info!("Chat turn completed | session_id={}", session_id);

        Ok(ChatReply {
            session_id: session_id.to_string(),
            question: question.to_string(),
            response: answer,
        })
    }
}
