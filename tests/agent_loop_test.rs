//! Agent reasoning-loop behavior: tool-call/observation cycles over a real
//! indexed document set, driven by scripted providers.

mod common;

use anamnesis::agent::{AgentBuilder, RETRIEVAL_TOOL_NAME};
use anamnesis::embeddings::EmbeddingService;
use anamnesis::index::IndexBuilder;
use anamnesis::llm::{Completion, ContentBlock, LlmProvider};
use anamnesis::types::LoadedDocument;
use common::{temp_vector_store, text_completion, tool_use_completion, HashEmbedder, ScriptedProvider};
use std::sync::Arc;

const DIM: usize = 32;

async fn build_agent(
    provider: Arc<ScriptedProvider>,
    doc_text: &str,
) -> (anamnesis::Agent, tempfile::TempDir) {
    let embedder: Arc<dyn EmbeddingService> = Arc::new(HashEmbedder::new(DIM));
    let (vectors, temp) = temp_vector_store(DIM).await;

    let indexer = IndexBuilder::new(Arc::clone(&embedder), vectors, 1000, 150, 5);
    let retriever = indexer
        .build_retriever(
            &[LoadedDocument {
                text: doc_text.to_string(),
                source: "manual.txt".to_string(),
            }],
            "agent-session",
        )
        .await
        .unwrap()
        .unwrap();

    let agent = AgentBuilder::new(provider as Arc<dyn LlmProvider>, None).build(Arc::new(retriever));
    (agent, temp)
}

#[tokio::test]
async fn tool_round_feeds_observation_back() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_use_completion("toolu_1", "alpha setting"),
        text_completion("Grounded answer about alpha."),
    ]));
    let requests = Arc::clone(&provider.requests);

    let (agent, _temp) = build_agent(provider, "the alpha setting controls the flux").await;

    let answer = agent.run("What is the alpha setting?").await.unwrap();
    assert_eq!(answer, "Grounded answer about alpha.");

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 2);

    // Every request advertises exactly the one retrieval tool
    for request in requests.iter() {
        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.tools[0].name, RETRIEVAL_TOOL_NAME);
    }

    // Second request carries the assistant's tool call and the observation
    let second = &requests[1];
    assert_eq!(second.messages.len(), 3);
    assert_eq!(second.messages[1].role, "assistant");

    let observation = match &second.messages[2].content[0] {
        ContentBlock::ToolResult {
            tool_use_id,
            content,
        } => {
            assert_eq!(tool_use_id, "toolu_1");
            content.clone()
        }
        other => panic!("expected tool result, got {:?}", other),
    };
    assert!(observation.contains("alpha setting controls the flux"));
    assert!(observation.contains("[manual.txt]"));
}

#[tokio::test]
async fn unanswerable_question_falls_back_with_notice() {
    // The scripted model follows the mandated policy: search first, then
    // say the documents lack the answer before using general knowledge.
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_use_completion("toolu_1", "zzz"),
        text_completion(
            "The uploaded documents do not contain this information. \
             In general, zzz refers to sleep.",
        ),
    ]));

    // Document shares no words with the query
    let (agent, _temp) = build_agent(provider, "alpha beta gamma").await;

    let answer = agent.run("what is zzz?").await.unwrap();

    // The fallback notice leads the answer, general knowledge follows
    let notice = answer.find("do not contain").unwrap();
    let fallback = answer.find("In general").unwrap();
    assert!(notice < fallback);
}

#[tokio::test]
async fn unknown_tool_and_bad_input_are_recoverable() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Completion {
            content: vec![
                ContentBlock::ToolUse {
                    id: "toolu_1".to_string(),
                    name: "launch_rockets".to_string(),
                    input: serde_json::json!({}),
                },
                ContentBlock::ToolUse {
                    id: "toolu_2".to_string(),
                    name: RETRIEVAL_TOOL_NAME.to_string(),
                    input: serde_json::json!({ "wrong": "shape" }),
                },
            ],
            stop_reason: Some("tool_use".to_string()),
        },
        text_completion("Recovered."),
    ]));
    let requests = Arc::clone(&provider.requests);

    let (agent, _temp) = build_agent(provider, "alpha").await;

    // Neither bad tool call kills the turn; both get error observations
    let answer = agent.run("q").await.unwrap();
    assert_eq!(answer, "Recovered.");

    let requests = requests.lock().unwrap();
    let results = &requests[1].messages[2].content;
    assert_eq!(results.len(), 2);

    match &results[0] {
        ContentBlock::ToolResult { content, .. } => assert!(content.contains("Unknown tool")),
        other => panic!("expected tool result, got {:?}", other),
    }
    match &results[1] {
        ContentBlock::ToolResult { content, .. } => assert!(content.contains("Tool error")),
        other => panic!("expected tool result, got {:?}", other),
    }
}

#[tokio::test]
async fn runaway_tool_loop_is_bounded() {
    // The model keeps asking for the tool and never answers
    let script: Vec<Completion> = (0..20)
        .map(|i| tool_use_completion(&format!("toolu_{}", i), "alpha"))
        .collect();
    let provider = Arc::new(ScriptedProvider::new(script));

    let (agent, _temp) = build_agent(provider, "alpha").await;

    let result = agent.run("q").await;
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("tool rounds"));
}
