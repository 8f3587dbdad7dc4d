//! The conversation engine: a bounded tool-calling loop and a simpler
//! RAG chain without tools.
//!
//! A turn runs at most one round of tool execution. The model either
//! answers directly, or requests tool calls; requested tools are executed
//! synchronously in order, their results fed back as a synthetic user
//! turn, and the model is invoked exactly once more (without tools) for
//! the final answer. Memory is updated only after the turn succeeds, so a
//! failed turn leaves the session history untouched and retryable.

use anyhow::Result;
use std::sync::Arc;

use crate::config::{MemoryConfig, OllamaConfig};
use crate::llm::{ChatMessage, ChatModel, Role};
use crate::memory::{ConversationMemory, SessionStore};
use crate::prompt;
use crate::retriever::Retriever;
use crate::tools::{ToolRegistry, ToolRuntime};

/// Tool-calling conversation engine over the volume library.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    retriever: Retriever,
    registry: ToolRegistry,
    runtime: ToolRuntime,
    sessions: SessionStore,
    temperature: f32,
}

impl Agent {
    pub fn new(
        model: Arc<dyn ChatModel>,
        retriever: Retriever,
        ollama: &OllamaConfig,
        memory: &MemoryConfig,
    ) -> Self {
        let runtime = ToolRuntime::new(retriever.clone(), model.clone(), ollama.clone());
        Self {
            model,
            retriever,
            registry: ToolRegistry::with_builtins(),
            runtime,
            sessions: SessionStore::new(memory.clone()),
            temperature: ollama.temperature,
        }
    }

    /// Process one user turn and return the final answer.
    pub async fn chat(&mut self, session_id: &str, message: &str) -> Result<String> {
        let messages = {
            let memory = self.sessions.create_or_get(session_id);
            prompt::assemble_messages(prompt::AGENT_SYSTEM_PROMPT, memory, message)
        };

        let specs = self.registry.specs();
        let response = self
            .model
            .complete(&messages, &specs, self.temperature)
            .await?;

        let answer = if response.tool_calls.is_empty() {
            response.text
        } else {
            let mut tool_results = Vec::new();
            for call in &response.tool_calls {
                // A name the registry doesn't know is skipped silently;
                // the model is never told the tool was unavailable.
                if !self.registry.contains(&call.name) {
                    continue;
                }
                let result = self.runtime.invoke(&call.name, &call.arguments).await?;
                tool_results.push(format!("[{}]: {}", call.name, result));
            }

            let followup = prompt::tool_results_followup(&tool_results.join("\n\n"));
            let mut messages = messages;
            messages.push(ChatMessage::assistant(response.text));
            messages.push(ChatMessage::user(followup));

            // Final completion carries no tools: one tool round per turn.
            let final_response = self.model.complete(&messages, &[], self.temperature).await?;
            final_response.text
        };

        let memory = self.sessions.create_or_get(session_id);
        memory.append(Role::User, message);
        memory.append(Role::Assistant, answer.clone());

        Ok(answer)
    }

    /// Ask a question, optionally prefixed with a retrieved context block.
    pub async fn ask(&mut self, session_id: &str, question: &str, use_rag: bool) -> Result<String> {
        if use_rag {
            let context = self
                .retriever
                .retrieve_with_context(question, self.retriever.default_k())
                .await?;
            let enhanced = format!("Context:\n{}\n\nQuestion: {}", context, question);
            self.chat(session_id, &enhanced).await
        } else {
            self.chat(session_id, question).await
        }
    }

    pub fn clear_history(&mut self, session_id: &str) {
        self.sessions.clear(session_id);
    }

    pub fn clear_all_sessions(&mut self) {
        self.sessions.clear_all();
    }

    /// Retained turn count for a session.
    pub fn history_len(&mut self, session_id: &str) -> usize {
        self.sessions.create_or_get(session_id).len()
    }
}

/// RAG chain without tool complexity: retrieve, assemble a flat prompt,
/// complete once.
pub struct SimpleRag {
    model: Arc<dyn ChatModel>,
    retriever: Retriever,
    memory: ConversationMemory,
    temperature: f32,
}

impl SimpleRag {
    pub fn new(
        model: Arc<dyn ChatModel>,
        retriever: Retriever,
        ollama: &OllamaConfig,
        memory: &MemoryConfig,
    ) -> Self {
        Self {
            model,
            retriever,
            memory: ConversationMemory::new(memory.clone()),
            temperature: ollama.temperature,
        }
    }

    /// Answer a question grounded in retrieved context.
    pub async fn query(&mut self, question: &str) -> Result<String> {
        let context = self
            .retriever
            .retrieve_with_context(question, self.retriever.default_k())
            .await?;

        let prompt_text =
            prompt::assemble_flat(prompt::RAG_SYSTEM_PROMPT, &context, &self.memory, question);

        let response = self
            .model
            .complete(&[ChatMessage::user(prompt_text)], &[], self.temperature)
            .await?;

        self.memory.append(Role::User, question);
        self.memory.append(Role::Assistant, response.text.clone());

        Ok(response.text)
    }

    pub fn clear_history(&mut self) {
        self.memory.clear();
    }
}
